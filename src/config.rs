//! Environment-driven configuration.
//!
//! Credentials for the ASR and LLM collaborators come from the
//! environment; paths default under the user's data directory. Missing
//! credentials are a `ConfigurationError` at startup, not a mid-pipeline
//! surprise.

use std::path::PathBuf;

use crate::pipeline::PipelineError;

pub const APP_NAME: &str = "medscribe";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default LLM model preference order, best first.
const DEFAULT_LLM_MODELS: &[&str] = &[
    "openai/gpt-oss-120b",
    "meta-llama/llama-4-scout-17b-16e-instruct",
];

#[derive(Debug, Clone)]
pub struct Settings {
    pub asr_api_key: String,
    pub asr_base_url: String,
    pub asr_base_model: String,
    pub asr_high_model: String,
    pub asr_timeout_secs: u64,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_models: Vec<String>,
    pub llm_timeout_secs: u64,
    /// Optional knowledge-base override directory.
    pub kb_dir: Option<PathBuf>,
    pub metrics_path: PathBuf,
    pub handoff_path: PathBuf,
}

/// Data directory: `~/.local/share/medscribe` (or platform equivalent).
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

impl Settings {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable lookup, for tests.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, PipelineError> {
        let asr_api_key = get("MEDSCRIBE_ASR_API_KEY")
            .or_else(|| get("OPENAI_API_KEY"))
            .ok_or_else(|| {
                PipelineError::Configuration(
                    "MEDSCRIBE_ASR_API_KEY (or OPENAI_API_KEY) not set".into(),
                )
            })?;
        let llm_api_key = get("MEDSCRIBE_LLM_API_KEY")
            .or_else(|| get("GROQ_API_KEY"))
            .ok_or_else(|| {
                PipelineError::Configuration(
                    "MEDSCRIBE_LLM_API_KEY (or GROQ_API_KEY) not set".into(),
                )
            })?;

        let llm_models = get("MEDSCRIBE_LLM_MODELS")
            .map(|raw| {
                raw.split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|models| !models.is_empty())
            .unwrap_or_else(|| DEFAULT_LLM_MODELS.iter().map(|m| m.to_string()).collect());

        let data = get("MEDSCRIBE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(data_dir);

        Ok(Self {
            asr_api_key,
            asr_base_url: get("MEDSCRIBE_ASR_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".into()),
            asr_base_model: get("MEDSCRIBE_ASR_BASE_MODEL").unwrap_or_else(|| "whisper-base".into()),
            asr_high_model: get("MEDSCRIBE_ASR_HIGH_MODEL")
                .unwrap_or_else(|| "whisper-medium".into()),
            asr_timeout_secs: parse_secs(get("MEDSCRIBE_ASR_TIMEOUT_SECS"), 60),
            llm_api_key,
            llm_base_url: get("MEDSCRIBE_LLM_BASE_URL")
                .unwrap_or_else(|| "https://api.groq.com/openai/v1".into()),
            llm_models,
            llm_timeout_secs: parse_secs(get("MEDSCRIBE_LLM_TIMEOUT_SECS"), 30),
            kb_dir: get("MEDSCRIBE_KB_DIR").map(PathBuf::from),
            metrics_path: get("MEDSCRIBE_METRICS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data.join("metrics.ndjson")),
            handoff_path: get("MEDSCRIBE_HANDOFF_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data.join("latest_prescription.json")),
        })
    }
}

fn parse_secs(value: Option<String>, default: u64) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}
