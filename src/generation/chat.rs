//! OpenAI-compatible chat completions client (Groq by default)

use super::{CompletionRequest, TextGenerator};
use crate::error::{Result, TwinError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Chat client configuration
#[derive(Debug)]
pub struct ChatClientConfig {
    pub api_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub timeout: Duration,
    pub retry_attempts: usize,
    pub retry_backoff: Duration,
}

pub struct ChatCompletionClient {
    http: Client,
    endpoint: String,
    config: ChatClientConfig,
}

impl ChatCompletionClient {
    pub fn new(config: ChatClientConfig) -> Result<Self> {
        if config.api_key.expose_secret().is_empty() {
            return Err(TwinError::Configuration("Generator API key is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TwinError::Internal(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.api_url.trim_end_matches('/')),
            config,
        })
    }

    /// Exponential backoff: base, 2x base, 4x base, ...
    fn calculate_backoff(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let multiplier = 2_u32.saturating_pow(exponent);
        self.config.retry_backoff.saturating_mul(multiplier)
    }

    async fn call_once(&self, body: &ChatCompletionRequest<'_>) -> std::result::Result<String, CallError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CallError::Terminal(TwinError::Timeout(self.config.timeout, "generation"))
                } else {
                    CallError::Transient(TwinError::Generation(e.to_string()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = TwinError::Generation(format!("HTTP {}: {}", status, text));
            return Err(if is_retryable(status) {
                CallError::Transient(err)
            } else {
                CallError::Terminal(err)
            });
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            CallError::Terminal(TwinError::Generation(format!("Failed to parse response: {}", e)))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CallError::Terminal(TwinError::Generation("No choices in response".to_string())))
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;

            match self.call_once(&body).await {
                Ok(text) => {
                    debug!("Completion succeeded on attempt {}", attempt);
                    return Ok(text);
                }
                Err(CallError::Terminal(e)) => return Err(e),
                Err(CallError::Transient(e)) => {
                    if attempt > self.config.retry_attempts {
                        warn!("Completion failed after {} attempts: {}", attempt, e);
                        return Err(e);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        "Completion attempt {} failed: {}, retrying in {:?}",
                        attempt, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

enum CallError {
    Transient(TwinError),
    Terminal(TwinError),
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}
