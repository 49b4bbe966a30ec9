//! Language model generation
//!
//! `TextGenerator` is the provider capability (prompt in, text out).
//! `GeneratorAdapter` pins a persona and sampling profile on top of it.

pub mod chat;

pub use chat::{ChatClientConfig, ChatCompletionClient};

use crate::error::{Result, TwinError};
use crate::metrics::METRICS;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Single-turn generation request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
}

/// Prompt-in, text-out model capability
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Persona and sampling settings for one call site
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationProfile {
    pub name: &'static str,
    pub persona: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
}

impl GenerationProfile {
    /// First-person twin used by the HTTP query surface
    pub fn digital_twin() -> Self {
        Self {
            name: "digital_twin",
            persona: "You are an AI digital twin. Answer questions as if you are the person, \
                      speaking in first person about your background, skills, and experience.",
            temperature: 0.7,
            max_tokens: 500,
            top_p: None,
        }
    }

    /// Context-grounded assistant used by the command surface
    pub fn assistant() -> Self {
        Self {
            name: "assistant",
            persona: "You are a helpful assistant that answers questions based on the provided context.",
            temperature: 0.7,
            max_tokens: 1024,
            top_p: Some(1.0),
        }
    }
}

/// Generator with a fixed persona, sampling profile and call timeout
pub struct GeneratorAdapter {
    generator: Option<Arc<dyn TextGenerator>>,
    profile: GenerationProfile,
    timeout: Duration,
}

impl GeneratorAdapter {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        profile: GenerationProfile,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            profile,
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Generate an answer for a composed prompt, trimmed of surrounding whitespace
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let generator = self.generator.as_ref().ok_or_else(|| {
            TwinError::GeneratorUnavailable("Generator client not initialized".to_string())
        })?;

        let request = CompletionRequest {
            system: self.profile.persona.to_string(),
            prompt: prompt.to_string(),
            temperature: self.profile.temperature,
            max_tokens: self.profile.max_tokens,
            top_p: self.profile.top_p,
        };

        debug!(
            "Generating with {} (profile={}, max_tokens={})",
            generator.model(),
            self.profile.name,
            self.profile.max_tokens
        );

        let timer = METRICS
            .generation_duration
            .with_label_values(&[self.profile.name])
            .start_timer();
        let outcome = tokio::time::timeout(self.timeout, generator.complete(&request)).await;
        timer.observe_duration();

        match outcome {
            Ok(text) => Ok(text?.trim().to_string()),
            Err(_) => Err(TwinError::Timeout(self.timeout, "generation")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGenerator;

    #[tokio::test]
    async fn test_generate_applies_profile_and_trims() {
        let fake = Arc::new(FakeGenerator::replying("  I build distributed systems.\n"));
        let adapter = GeneratorAdapter::new(
            Some(fake.clone()),
            GenerationProfile::digital_twin(),
            Duration::from_secs(5),
        );

        let answer = adapter.generate("prompt").await.unwrap();
        assert_eq!(answer, "I build distributed systems.");

        let request = fake.last_request().unwrap();
        assert!(request.system.contains("digital twin"));
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, 500);
        assert_eq!(request.prompt, "prompt");
    }

    #[tokio::test]
    async fn test_assistant_profile_limits() {
        let fake = Arc::new(FakeGenerator::replying("ok"));
        let adapter = GeneratorAdapter::new(
            Some(fake.clone()),
            GenerationProfile::assistant(),
            Duration::from_secs(5),
        );

        adapter.generate("prompt").await.unwrap();
        let request = fake.last_request().unwrap();
        assert!(request.system.starts_with("You are a helpful assistant"));
        assert_eq!(request.max_tokens, 1024);
    }

    #[tokio::test]
    async fn test_missing_generator_is_unavailable() {
        let adapter = GeneratorAdapter::new(None, GenerationProfile::digital_twin(), Duration::from_secs(5));
        assert!(!adapter.is_configured());

        let err = adapter.generate("prompt").await.unwrap_err();
        assert!(matches!(err, TwinError::GeneratorUnavailable(_)));
    }

    #[tokio::test]
    async fn test_slow_generator_times_out() {
        let fake = Arc::new(FakeGenerator::replying("late").with_delay(Duration::from_millis(200)));
        let adapter = GeneratorAdapter::new(
            Some(fake),
            GenerationProfile::digital_twin(),
            Duration::from_millis(20),
        );

        let err = adapter.generate("prompt").await.unwrap_err();
        assert!(matches!(err, TwinError::Timeout(_, "generation")));
        assert!(err.is_unavailable());
    }
}
