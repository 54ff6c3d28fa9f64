//! medscribe: multilingual medical consultation audio → structured,
//! validated prescription records.
//!
//! The core is a staged pipeline: tiered ASR transcription → transcript
//! cleaning → language detection → Thanglish normalization → dosage/term
//! normalization → adaptive routing → {LLM | ensemble | rule} extraction
//! → semantic post-processing → validation, with per-invocation metrics
//! and graceful degradation at every stage. External collaborators (ASR,
//! LLM, persistence, UIs) sit behind traits and rendezvous files.

pub mod asr;
pub mod config;
pub mod extraction;
pub mod handoff;
pub mod knowledge;
pub mod metrics;
pub mod pipeline;
pub mod validation;

pub use asr::{AudioInput, TranscriptionResult};
pub use extraction::{ExtractionMethod, Medicine, Prescription, RecommendedTest};
pub use pipeline::{
    CancelToken, Language, PipelineError, PipelineOptions, PipelineOutcome, PrescriptionPipeline,
};
pub use validation::ValidationReport;

use std::sync::Once;

/// Initialize structured logging once, honoring `RUST_LOG`.
/// Safe to call repeatedly; later calls are no-ops.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    });
}
