//! Grounded prompt composition

use crate::retrieval::RetrievalResult;

/// Prompt layout for a pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    /// Framed as the subject describing their own background
    FirstPerson,
    /// Plain context / question / answer layout
    ContextQuestion,
}

/// `title: content` lines of content-bearing results, in result order
pub fn build_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .filter(|r| r.chunk.has_content())
        .map(|r| format!("{}: {}", r.chunk.title, r.chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl PromptTemplate {
    /// Build the generation prompt for a question
    pub fn build(&self, question: &str, results: &[RetrievalResult]) -> String {
        let context = build_context(results);
        match self {
            PromptTemplate::FirstPerson => format!(
                "Based on the following information about yourself, answer the question.\n\
                 Speak in first person as if you are describing your own background.\n\n\
                 Your Information:\n{}\n\n\
                 Question: {}\n\n\
                 Provide a helpful, professional response:",
                context, question
            ),
            PromptTemplate::ContextQuestion => {
                format!("Context: {}\n\nQuestion: {}\n\nAnswer:", context, question)
            }
        }
    }
}
