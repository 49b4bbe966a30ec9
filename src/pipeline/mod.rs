//! Query pipeline: retrieve, short-circuit or compose, generate
//!
//! `START -> RETRIEVE -> (EMPTY_SHORT_CIRCUIT | COMPOSE -> GENERATE) -> DONE`

pub mod prompt;

pub use prompt::{build_context, PromptTemplate};

use crate::error::{Result, TwinError};
use crate::generation::{GenerationProfile, GeneratorAdapter};
use crate::metrics::METRICS;
use crate::retrieval::{RetrievalResult, Retriever};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Incoming question; a missing `top_k` falls back to the configured default
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Retrieved fact cited in a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub content: String,
    pub score: f32,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
}

impl From<&RetrievalResult> for Source {
    fn from(result: &RetrievalResult) -> Self {
        Self {
            title: result.chunk.title.clone(),
            content: result.chunk.content.clone(),
            score: result.score,
            kind: result.chunk.kind.clone(),
            category: result.chunk.category.clone(),
        }
    }
}

/// Answer plus every retrieved fact, in retrieval order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Fixed answers used when retrieval yields nothing usable
#[derive(Debug, Clone, PartialEq)]
pub struct CannedAnswers {
    pub no_results: &'static str,
    pub unextractable: &'static str,
}

impl Default for CannedAnswers {
    fn default() -> Self {
        Self {
            no_results: "I don't have specific information about that topic.",
            unextractable: "I found some information but couldn't extract details.",
        }
    }
}

/// Named pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineProfile {
    pub generation: GenerationProfile,
    pub template: PromptTemplate,
    pub canned: CannedAnswers,
}

impl PipelineProfile {
    /// HTTP query surface: first-person twin
    pub fn digital_twin() -> Self {
        Self {
            generation: GenerationProfile::digital_twin(),
            template: PromptTemplate::FirstPerson,
            canned: CannedAnswers::default(),
        }
    }

    /// Command surface: context-grounded assistant
    pub fn assistant() -> Self {
        Self {
            generation: GenerationProfile::assistant(),
            template: PromptTemplate::ContextQuestion,
            canned: CannedAnswers::default(),
        }
    }
}

/// Retriever -> prompt composer -> generator
pub struct QueryPipeline {
    retriever: Arc<dyn Retriever>,
    generator: GeneratorAdapter,
    template: PromptTemplate,
    canned: CannedAnswers,
    retrieval_timeout: Duration,
}

impl QueryPipeline {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: GeneratorAdapter,
        profile: &PipelineProfile,
        retrieval_timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            generator,
            template: profile.template,
            canned: profile.canned.clone(),
            retrieval_timeout,
        }
    }

    pub fn retriever_backend(&self) -> &'static str {
        self.retriever.backend()
    }

    /// Answer a question from retrieved facts
    pub async fn answer(&self, question: &str, top_k: usize) -> Result<QueryResponse> {
        if question.trim().is_empty() {
            return Err(TwinError::InvalidRequest("Question cannot be empty".to_string()));
        }

        let start = Instant::now();
        let results = self.retrieve(question, top_k).await?;
        let sources: Vec<Source> = results.iter().map(Source::from).collect();

        if results.is_empty() {
            METRICS.record_canned("no_results");
            info!("No facts found for question, returning canned answer");
            return Ok(QueryResponse {
                answer: self.canned.no_results.to_string(),
                sources,
            });
        }

        if !results.iter().any(|r| r.chunk.has_content()) {
            METRICS.record_canned("unextractable");
            info!("{} facts found but none has content", results.len());
            return Ok(QueryResponse {
                answer: self.canned.unextractable.to_string(),
                sources,
            });
        }

        let prompt = self.template.build(question, &results);
        debug!("Composed prompt: {} chars from {} facts", prompt.len(), results.len());

        let answer = self.generator.generate(&prompt).await?;

        info!(
            "Answered with {} sources via {} in {:?}",
            sources.len(),
            self.retriever.backend(),
            start.elapsed()
        );

        Ok(QueryResponse { answer, sources })
    }

    async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        let timer = METRICS
            .retrieval_duration
            .with_label_values(&[self.retriever.backend()])
            .start_timer();
        let outcome = tokio::time::timeout(
            self.retrieval_timeout,
            self.retriever.search(question, top_k),
        )
        .await;
        timer.observe_duration();

        match outcome {
            Ok(results) => results,
            Err(_) => Err(TwinError::Timeout(self.retrieval_timeout, "retrieval")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{FactChunk, FactStore, MemoryFactStore};
    use crate::retrieval::KeywordRetriever;
    use crate::testing::{FakeGenerator, FakeRetriever};

    fn pipeline(
        retriever: Arc<dyn Retriever>,
        generator: Option<Arc<FakeGenerator>>,
        profile: PipelineProfile,
    ) -> QueryPipeline {
        let generator = GeneratorAdapter::new(
            generator.map(|g| g as Arc<dyn crate::generation::TextGenerator>),
            profile.generation.clone(),
            Duration::from_secs(5),
        );
        QueryPipeline::new(retriever, generator, &profile, Duration::from_secs(5))
    }

    fn skills_store() -> Arc<dyn FactStore> {
        Arc::new(MemoryFactStore::with_chunks(vec![FactChunk::new(
            "c1",
            "Skills",
            "Python and distributed systems",
        )
        .with_kind("skill")]))
    }

    #[tokio::test]
    async fn test_keyword_end_to_end() {
        let fake = Arc::new(FakeGenerator::replying("I work with Python."));
        let pipeline = pipeline(
            Arc::new(KeywordRetriever::new(skills_store())),
            Some(fake.clone()),
            PipelineProfile::digital_twin(),
        );

        let response = pipeline.answer("skills", 1).await.unwrap();

        assert_eq!(response.answer, "I work with Python.");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].title, "Skills");
        assert_eq!(response.sources[0].score, 1.0);
        assert_eq!(response.sources[0].kind, "skill");

        let prompt = fake.last_request().unwrap().prompt;
        assert!(prompt.contains("Skills: Python and distributed systems"));
    }

    #[tokio::test]
    async fn test_no_results_never_calls_generator() {
        let fake = Arc::new(FakeGenerator::replying("unused"));
        let pipeline = pipeline(
            Arc::new(KeywordRetriever::new(skills_store())),
            Some(fake.clone()),
            PipelineProfile::digital_twin(),
        );

        let response = pipeline.answer("kubernetes", 3).await.unwrap();

        assert_eq!(response.answer, "I don't have specific information about that topic.");
        assert!(response.sources.is_empty());
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_empty_content_is_unextractable() {
        let fake = Arc::new(FakeGenerator::replying("unused"));
        let retriever = FakeRetriever::returning(vec![
            RetrievalResult { chunk: FactChunk::new("a", "Blank", ""), score: 0.8 },
            RetrievalResult { chunk: FactChunk::new("b", "Also blank", ""), score: 0.6 },
        ]);
        let pipeline = pipeline(Arc::new(retriever), Some(fake.clone()), PipelineProfile::digital_twin());

        let response = pipeline.answer("anything", 3).await.unwrap();

        assert_eq!(response.answer, "I found some information but couldn't extract details.");
        assert_eq!(response.sources.len(), 2);
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_content_still_reaches_generator() {
        let fake = Arc::new(FakeGenerator::replying("answer"));
        let retriever = FakeRetriever::returning(vec![RetrievalResult {
            chunk: FactChunk::new("a", "Spacer", " "),
            score: 0.8,
        }]);
        let pipeline = pipeline(Arc::new(retriever), Some(fake.clone()), PipelineProfile::digital_twin());

        let response = pipeline.answer("anything", 3).await.unwrap();

        assert_eq!(response.answer, "answer");
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_sources_include_empty_content_results() {
        let fake = Arc::new(FakeGenerator::replying("answer"));
        let retriever = FakeRetriever::returning(vec![
            RetrievalResult { chunk: FactChunk::new("a", "Skills", "Rust"), score: 0.9 },
            RetrievalResult { chunk: FactChunk::new("b", "Blank", ""), score: 0.7 },
            RetrievalResult { chunk: FactChunk::new("c", "Education", "BSc"), score: 0.5 },
        ]);
        let pipeline = pipeline(Arc::new(retriever), Some(fake.clone()), PipelineProfile::digital_twin());

        let response = pipeline.answer("background", 3).await.unwrap();

        let titles: Vec<_> = response.sources.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Skills", "Blank", "Education"]);

        let prompt = fake.last_request().unwrap().prompt;
        assert!(prompt.contains("Skills: Rust\n\nEducation: BSc"));
        assert!(!prompt.contains("Blank"));
    }

    #[tokio::test]
    async fn test_retrieval_error_propagates() {
        let fake = Arc::new(FakeGenerator::replying("unused"));
        let retriever = FakeRetriever::failing("index offline");
        let pipeline = pipeline(Arc::new(retriever), Some(fake.clone()), PipelineProfile::digital_twin());

        let err = pipeline.answer("skills", 3).await.unwrap_err();
        assert!(matches!(err, TwinError::Retrieval(_)));
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_generator_is_hard_failure() {
        let pipeline = pipeline(
            Arc::new(KeywordRetriever::new(skills_store())),
            None,
            PipelineProfile::digital_twin(),
        );

        let err = pipeline.answer("skills", 3).await.unwrap_err();
        assert!(matches!(err, TwinError::GeneratorUnavailable(_)));
    }

    #[tokio::test]
    async fn test_slow_retrieval_times_out() {
        let retriever = FakeRetriever::returning(vec![]).with_delay(Duration::from_millis(200));
        let generator = GeneratorAdapter::new(None, GenerationProfile::digital_twin(), Duration::from_secs(1));
        let pipeline = QueryPipeline::new(
            Arc::new(retriever),
            generator,
            &PipelineProfile::digital_twin(),
            Duration::from_millis(20),
        );

        let err = pipeline.answer("skills", 3).await.unwrap_err();
        assert!(matches!(err, TwinError::Timeout(_, "retrieval")));
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let pipeline = pipeline(
            Arc::new(KeywordRetriever::new(skills_store())),
            None,
            PipelineProfile::digital_twin(),
        );
        assert!(matches!(
            pipeline.answer("   ", 3).await,
            Err(TwinError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_assistant_profile_uses_context_template() {
        let fake = Arc::new(FakeGenerator::replying("answer"));
        let pipeline = pipeline(
            Arc::new(KeywordRetriever::new(skills_store())),
            Some(fake.clone()),
            PipelineProfile::assistant(),
        );

        pipeline.answer("python", 3).await.unwrap();
        let request = fake.last_request().unwrap();
        assert!(request.prompt.starts_with("Context: Skills: Python and distributed systems"));
        assert_eq!(request.max_tokens, 1024);
    }
}
