//! Prescription extractors: LLM-driven, rule-based, and their ensemble.
//!
//! All three expose the same capability, turning a normalized transcript
//! into a `Prescription`, behind the `Extractor` trait. The ensemble is
//! just another implementation that composes the other two.

pub mod ensemble;
pub mod llm;
pub mod parser;
pub mod postprocess;
pub mod prompt;
pub mod rules;
pub mod types;

pub use ensemble::merge_prescriptions;
pub use llm::{ChatCompletionsClient, LlmClient, LlmError, LlmExtractor, MockLlmClient};
pub use postprocess::PostProcessor;
pub use rules::RuleExtractor;
pub use types::{
    dedup_key, push_unique, ExtractionMethod, Medicine, Prescription, RecommendedTest,
};

use thiserror::Error;

use crate::pipeline::language::LanguageDecision;

#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Every configured LLM model failed and the rule extractor produced
    /// an empty shell.
    #[error("all extractors failed: {0}")]
    AllExtractorsFailed(String),

    /// Every configured LLM model failed.
    #[error("all LLM models failed, last error: {0}")]
    AllModelsFailed(String),

    #[error("LLM extraction disabled by configuration")]
    LlmDisabled,
}

impl ExtractionError {
    pub fn retriable(&self) -> bool {
        matches!(
            self,
            ExtractionError::AllModelsFailed(_) | ExtractionError::AllExtractorsFailed(_)
        )
    }
}

/// A producer of prescriptions from normalized transcripts.
pub trait Extractor {
    fn extract(
        &self,
        transcript: &str,
        language: &LanguageDecision,
    ) -> Result<Prescription, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_failures_are_retriable() {
        assert!(ExtractionError::AllModelsFailed("timeout".into()).retriable());
        assert!(!ExtractionError::LlmDisabled.retriable());
    }
}
