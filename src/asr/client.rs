//! ASR collaborator clients.
//!
//! `AsrClient` is the seam the tiered policy speaks through; the HTTP
//! implementation talks to a Whisper-compatible transcription endpoint.
//! The core always requests transcription, never translation.

use std::sync::Mutex;

use serde::Deserialize;

use super::types::{AudioInput, AudioSource, Segment};
use super::TranscriptionError;

/// One transcription attempt's parameters.
#[derive(Debug, Clone)]
pub struct AsrRequest<'a> {
    pub audio: &'a AudioInput,
    /// ASR model identifier for this tier.
    pub model: &'a str,
    /// Optional ISO language hint.
    pub language: Option<&'a str>,
    /// Optional domain-biasing prompt.
    pub prompt: Option<&'a str>,
}

/// What an ASR collaborator returns for one attempt.
#[derive(Debug, Clone)]
pub struct AsrResponse {
    pub text: String,
    pub language: String,
    pub confidence: f32,
    pub no_speech_prob: f32,
    /// Total audio seconds, for the words-per-minute gate.
    pub duration_secs: f32,
    pub segments: Option<Vec<Segment>>,
}

/// ASR collaborator abstraction (allows mocking).
pub trait AsrClient: Send + Sync {
    fn transcribe(&self, request: &AsrRequest<'_>) -> Result<AsrResponse, TranscriptionError>;
}

/// HTTP client for a Whisper-compatible `/audio/transcriptions` endpoint.
pub struct WhisperApiClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl WhisperApiClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build ASR HTTP client");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn audio_part(
        audio: &AudioInput,
    ) -> Result<reqwest::blocking::multipart::Part, TranscriptionError> {
        match &audio.source {
            AudioSource::Path(path) => {
                if !path.exists() {
                    return Err(TranscriptionError::AudioNotFound(path.display().to_string()));
                }
                let data = std::fs::read(path)?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "audio.wav".to_string());
                Ok(reqwest::blocking::multipart::Part::bytes(data).file_name(name))
            }
            AudioSource::Bytes { data, mime } => {
                let part = reqwest::blocking::multipart::Part::bytes(data.clone())
                    .file_name("audio")
                    .mime_str(mime)
                    .map_err(|e| TranscriptionError::Network(e.to_string()))?;
                Ok(part)
            }
        }
    }
}

/// Whisper verbose_json response shape.
#[derive(Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f32>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Deserialize)]
struct VerboseSegment {
    start: f32,
    end: f32,
    text: String,
    #[serde(default)]
    avg_logprob: Option<f32>,
    #[serde(default)]
    no_speech_prob: Option<f32>,
}

impl AsrClient for WhisperApiClient {
    fn transcribe(&self, request: &AsrRequest<'_>) -> Result<AsrResponse, TranscriptionError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let mut form = reqwest::blocking::multipart::Form::new()
            .part("file", Self::audio_part(request.audio)?)
            .text("model", request.model.to_string())
            .text("response_format", "verbose_json")
            .text("temperature", "0");
        if let Some(language) = request.language {
            form = form.text("language", language.to_string());
        }
        if let Some(prompt) = request.prompt {
            form = form.text("prompt", prompt.to_string());
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TranscriptionError::Timeout
                } else {
                    TranscriptionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TranscriptionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: VerboseTranscription = response
            .json()
            .map_err(|e| TranscriptionError::ResponseParsing(e.to_string()))?;

        // Segment-level log-probabilities give a usable confidence estimate;
        // without segments fall back to the model's typical reliability.
        let (confidence, no_speech_prob) = if parsed.segments.is_empty() {
            (0.92, 0.0)
        } else {
            let n = parsed.segments.len() as f32;
            let conf = parsed
                .segments
                .iter()
                .map(|s| s.avg_logprob.map_or(0.92, |lp| lp.exp().clamp(0.0, 1.0)))
                .sum::<f32>()
                / n;
            let nsp = parsed
                .segments
                .iter()
                .map(|s| s.no_speech_prob.unwrap_or(0.0))
                .sum::<f32>()
                / n;
            (conf, nsp)
        };

        let duration_secs = parsed.duration.unwrap_or_else(|| {
            parsed.segments.last().map(|s| s.end).unwrap_or(0.0)
        });

        let segments = if parsed.segments.is_empty() {
            None
        } else {
            Some(
                parsed
                    .segments
                    .into_iter()
                    .map(|s| Segment {
                        start: s.start,
                        end: s.end,
                        text: s.text,
                    })
                    .collect(),
            )
        };

        Ok(AsrResponse {
            text: parsed.text.trim().to_string(),
            language: parsed.language.unwrap_or_default(),
            confidence,
            no_speech_prob,
            duration_secs,
            segments,
        })
    }
}

/// Scripted ASR client for tests: pops one response (or error) per call.
pub struct MockAsrClient {
    script: Mutex<Vec<Result<AsrResponse, TranscriptionError>>>,
    /// Records (model, language hint) for each call, in order.
    pub calls: Mutex<Vec<(String, Option<String>)>>,
}

impl MockAsrClient {
    pub fn new(script: Vec<Result<AsrResponse, TranscriptionError>>) -> Self {
        // Stored reversed so pop() yields calls in script order.
        let mut script = script;
        script.reverse();
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A single successful response replayed for the first call; later calls fail.
    pub fn single(response: AsrResponse) -> Self {
        Self::new(vec![Ok(response)])
    }
}

impl AsrClient for MockAsrClient {
    fn transcribe(&self, request: &AsrRequest<'_>) -> Result<AsrResponse, TranscriptionError> {
        self.calls.lock().unwrap().push((
            request.model.to_string(),
            request.language.map(|s| s.to_string()),
        ));
        self.script
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(Err(TranscriptionError::Network("mock script exhausted".into())))
    }
}

/// Convenience constructor for test responses.
pub fn mock_response(text: &str, language: &str, duration_secs: f32) -> AsrResponse {
    AsrResponse {
        text: text.to_string(),
        language: language.to_string(),
        confidence: 0.92,
        no_speech_prob: 0.05,
        duration_secs,
        segments: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_client_replays_script_in_order() {
        let client = MockAsrClient::new(vec![
            Ok(mock_response("first", "en", 10.0)),
            Ok(mock_response("second", "en", 10.0)),
        ]);
        let input = AudioInput::from_bytes(vec![], "audio/wav");
        let req = AsrRequest {
            audio: &input,
            model: "base",
            language: None,
            prompt: None,
        };
        assert_eq!(client.transcribe(&req).unwrap().text, "first");
        assert_eq!(client.transcribe(&req).unwrap().text, "second");
        assert!(client.transcribe(&req).is_err());
    }

    #[test]
    fn mock_client_records_model_and_hint() {
        let client = MockAsrClient::new(vec![Ok(mock_response("x", "ta", 5.0))]);
        let input = AudioInput::from_bytes(vec![], "audio/wav");
        let req = AsrRequest {
            audio: &input,
            model: "medium",
            language: Some("ta"),
            prompt: None,
        };
        client.transcribe(&req).unwrap();
        let calls = client.calls.lock().unwrap();
        assert_eq!(calls[0], ("medium".to_string(), Some("ta".to_string())));
    }

    #[test]
    fn missing_audio_file_is_reported() {
        let input = AudioInput::from_path("/definitely/not/here.wav");
        let err = WhisperApiClient::audio_part(&input).unwrap_err();
        assert!(matches!(err, TranscriptionError::AudioNotFound(_)));
    }

    #[test]
    fn whisper_client_trims_trailing_slash() {
        let client = WhisperApiClient::new("http://localhost:8000/", "key", 30);
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
