//! Tiered automatic speech recognition.
//!
//! Three escalating tiers with quality gates between them; the
//! high-capacity tier is lazily allocated and shared across invocations.

pub mod client;
pub mod tiers;
pub mod types;

pub use client::{AsrClient, AsrRequest, AsrResponse, MockAsrClient, WhisperApiClient};
pub use tiers::TieredTranscriber;
pub use types::{AudioInput, AudioSource, Segment, TranscriptionResult};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscriptionError {
    /// Every tier was attempted and none produced text.
    #[error("no transcription tier produced any text")]
    AllTiersFailed,

    #[error("audio file not found: {0}")]
    AudioNotFound(String),

    #[error("ASR request timed out")]
    Timeout,

    #[error("ASR network error: {0}")]
    Network(String),

    #[error("ASR endpoint returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse ASR response: {0}")]
    ResponseParsing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscriptionError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn retriable(&self) -> bool {
        matches!(
            self,
            TranscriptionError::Timeout
                | TranscriptionError::Network(_)
                | TranscriptionError::Api { status: 429, .. }
                | TranscriptionError::Api { status: 500..=599, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_server_errors_are_retriable() {
        assert!(TranscriptionError::Timeout.retriable());
        assert!(TranscriptionError::Api { status: 503, body: String::new() }.retriable());
        assert!(TranscriptionError::Api { status: 429, body: String::new() }.retriable());
    }

    #[test]
    fn bad_requests_are_not_retriable() {
        assert!(!TranscriptionError::Api { status: 400, body: String::new() }.retriable());
        assert!(!TranscriptionError::AudioNotFound("x.wav".into()).retriable());
        assert!(!TranscriptionError::AllTiersFailed.retriable());
    }
}
