//! The staged extraction pipeline and its error taxonomy.

pub mod cleaner;
pub mod language;
pub mod normalize;
pub mod processor;
pub mod router;
pub mod thanglish;

pub use cleaner::TranscriptCleaner;
pub use language::{Language, LanguageDecision, LanguageDetector};
pub use normalize::TermNormalizer;
pub use processor::{CancelToken, PipelineOptions, PipelineOutcome, PrescriptionPipeline};
pub use router::{RouteConfig, RouteDecision, Router};

use serde::Serialize;
use thiserror::Error;

use crate::asr::TranscriptionError;
use crate::extraction::ExtractionError;
use crate::knowledge::KnowledgeError;

/// Pipeline stages, in execution order. Used for cancellation reporting
/// and failure attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcription,
    Cleaning,
    LanguageDetection,
    ThanglishNormalization,
    TermNormalization,
    Routing,
    Extraction,
    PostProcessing,
    Validation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Transcription => "transcription",
            Stage::Cleaning => "cleaning",
            Stage::LanguageDetection => "language_detection",
            Stage::ThanglishNormalization => "thanglish_normalization",
            Stage::TermNormalization => "term_normalization",
            Stage::Routing => "routing",
            Stage::Extraction => "extraction",
            Stage::PostProcessing => "post_processing",
            Stage::Validation => "validation",
        };
        f.write_str(name)
    }
}

/// Unrecoverable pipeline failures. Recoverable conditions (per-tier ASR
/// failures, transient LLM errors) are handled inside their stage and only
/// show up in metrics.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("pipeline cancelled at {0}")]
    Cancelled(Stage),

    #[error("deadline exceeded at {stage}")]
    DeadlineExceeded { stage: Stage },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The caller-facing failure object: stable kind, stage, and a retriable bit.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub kind: String,
    pub stage: Stage,
    pub message: String,
    pub retriable: bool,
}

impl PipelineError {
    pub fn report(&self) -> FailureReport {
        match self {
            PipelineError::Configuration(msg) => FailureReport {
                kind: "configuration".into(),
                stage: Stage::Transcription,
                message: msg.clone(),
                retriable: false,
            },
            PipelineError::Knowledge(e) => FailureReport {
                kind: "configuration".into(),
                stage: Stage::Transcription,
                message: e.to_string(),
                retriable: false,
            },
            PipelineError::Transcription(e) => FailureReport {
                kind: "transcription".into(),
                stage: Stage::Transcription,
                message: e.to_string(),
                retriable: e.retriable(),
            },
            PipelineError::Extraction(e) => FailureReport {
                kind: "extraction".into(),
                stage: Stage::Extraction,
                message: e.to_string(),
                retriable: e.retriable(),
            },
            PipelineError::Cancelled(stage) => FailureReport {
                kind: "cancelled".into(),
                stage: *stage,
                message: format!("cancelled at {stage}"),
                retriable: true,
            },
            PipelineError::DeadlineExceeded { stage } => FailureReport {
                kind: "timeout".into(),
                stage: *stage,
                message: format!("deadline exceeded at {stage}"),
                retriable: true,
            },
            PipelineError::Io(e) => FailureReport {
                kind: "io".into(),
                stage: Stage::Transcription,
                message: e.to_string(),
                retriable: true,
            },
        }
    }
}
