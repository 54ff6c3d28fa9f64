//! Audio input and transcription result types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The audio to process: a local file or an in-memory buffer with a MIME hint.
#[derive(Debug, Clone)]
pub enum AudioSource {
    Path(PathBuf),
    Bytes { data: Vec<u8>, mime: String },
}

/// One pipeline invocation's input.
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub source: AudioSource,
    /// Caller-supplied language hint; skips acoustic probing when present.
    pub hint_language: Option<String>,
}

impl AudioInput {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: AudioSource::Path(path.into()),
            hint_language: None,
        }
    }

    pub fn from_bytes(data: Vec<u8>, mime: &str) -> Self {
        Self {
            source: AudioSource::Bytes {
                data,
                mime: mime.to_string(),
            },
            hint_language: None,
        }
    }

    pub fn with_hint(mut self, language: &str) -> Self {
        self.hint_language = Some(language.to_string());
        self
    }

    /// A loggable reference for metrics: the path, or a byte-length tag.
    pub fn reference(&self) -> String {
        match &self.source {
            AudioSource::Path(p) => p.display().to_string(),
            AudioSource::Bytes { data, mime } => format!("<{} bytes, {mime}>", data.len()),
        }
    }
}

/// A timestamped ASR segment, kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start: f32,
    pub end: f32,
    pub text: String,
}

/// Output of the tiered transcription policy. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    /// ISO code the ASR reported for the audio.
    pub whisper_language: String,
    /// 1–3 for the tier that produced the text; −1 when the high-capacity
    /// tier could not be allocated and a lower-tier result was returned.
    pub transcription_tier: i8,
    pub confidence: f32,
    pub no_speech_prob: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<Segment>>,
}
