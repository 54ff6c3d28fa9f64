//! The three-tier transcription policy.
//!
//! Tier 1: base model, no language hint. Tier 2: base model with a hint,
//! used when tier 1 heard a confident non-English language but the text
//! failed quality gates. Tier 3: high-capacity model, lazily allocated and
//! shared between concurrent invocations. Escalation stops at the first
//! tier whose output passes all gates; otherwise the highest-tier text
//! wins. Tier −1 marks a degraded result (tier 3 unavailable).

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::knowledge::drugs;

use super::client::{AsrClient, AsrRequest, AsrResponse};
use super::types::{AudioInput, TranscriptionResult};
use super::TranscriptionError;

/// Minimum words-per-minute for a plausible consultation transcript.
const MIN_WPM: f32 = 20.0;

/// Above this no-speech probability the transcript is mostly silence.
const MAX_NO_SPEECH: f32 = 0.60;

/// Tier-1 language confidence needed before its detection seeds tier 2.
const HINT_CONFIDENCE: f32 = 0.5;

type HighCapacityFactory = Box<dyn Fn() -> Option<Arc<dyn AsrClient>> + Send + Sync>;

/// Gate evaluation for one transcription attempt.
#[derive(Debug, Clone, Copy)]
pub struct GateReport {
    pub wpm: f32,
    pub keyword_hit: bool,
    pub no_speech_ok: bool,
}

impl GateReport {
    pub fn passed(&self) -> bool {
        self.wpm >= MIN_WPM && self.keyword_hit && self.no_speech_ok
    }
}

fn evaluate_gates(response: &AsrResponse) -> GateReport {
    let words = response.text.split_whitespace().count() as f32;
    // Unknown duration cannot fail the rate gate.
    let wpm = if response.duration_secs > 0.0 {
        words / (response.duration_secs / 60.0)
    } else {
        f32::INFINITY
    };
    GateReport {
        wpm,
        keyword_hit: drugs::has_medical_keyword(&response.text),
        no_speech_ok: response.no_speech_prob < MAX_NO_SPEECH,
    }
}

/// Domain-biasing ASR prompt per resolved language.
fn prompt_for(language: &str) -> &'static str {
    match language {
        "ta" => "மருத்துவ ஆலோசனை. மருத்துவர் மருந்துகளை பரிந்துரைக்கிறார்.",
        "ar" => "استشارة طبية. الطبيب يوصي بالأدوية.",
        "thanglish" => {
            "Medical consultation. Patient name, diagnosis, medicines with dosages. \
             Tamil-origin words may appear."
        }
        _ => {
            "Medical consultation in English. Doctor prescribing medicines. \
             Include drug names, dosages, frequency, and patient advice."
        }
    }
}

/// Whisper sometimes prefixes output with an echo of the biasing prompt.
/// Repeatedly strip instruction-shaped lead-ins until the text stabilizes.
fn strip_prompt_echo(text: &str) -> String {
    static ECHO: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = ECHO.get_or_init(|| {
        [
            r"(?i)^medical\s+consultation[^.]*\.\s*",
            r"(?i)^doctor\s+prescribing[^.]*\.\s*",
            r"(?i)^include\s+drug\s+names[^.]*\.\s*",
            r"(?i)^patient\s+name,\s+diagnosis[^.]*\.\s*",
            r"(?i)^tamil-origin\s+words[^.]*\.\s*",
            r"(?i)^translate\s+to\s+\w+[.,]?\s*",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("builtin echo pattern"))
        .collect()
    });

    let mut cleaned = text.trim().to_string();
    loop {
        let mut changed = false;
        for pattern in patterns {
            let next = pattern.replace(&cleaned, "").trim().to_string();
            if next != cleaned {
                cleaned = next;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    if cleaned.is_empty() {
        text.trim().to_string()
    } else {
        cleaned
    }
}

/// Tiered transcriber. Holds the base client plus a lazily allocated
/// high-capacity client; the `OnceLock` makes the first caller pay the
/// allocation cost while concurrent callers wait on it.
pub struct TieredTranscriber {
    client: Arc<dyn AsrClient>,
    base_model: String,
    high_model: String,
    high_factory: HighCapacityFactory,
    high: OnceLock<Option<Arc<dyn AsrClient>>>,
}

impl TieredTranscriber {
    pub fn new(client: Arc<dyn AsrClient>, base_model: &str, high_model: &str) -> Self {
        let shared = Arc::clone(&client);
        Self {
            client,
            base_model: base_model.to_string(),
            high_model: high_model.to_string(),
            high_factory: Box::new(move || Some(Arc::clone(&shared))),
            high: OnceLock::new(),
        }
    }

    /// Override how the tier-3 client is allocated. Returning `None`
    /// simulates (or reports) an allocation failure: the transcriber then
    /// degrades to the best lower-tier result with tier = −1.
    pub fn with_high_capacity_factory(mut self, factory: HighCapacityFactory) -> Self {
        self.high_factory = factory;
        self
    }

    fn high_capacity(&self) -> Option<Arc<dyn AsrClient>> {
        self.high.get_or_init(|| (self.high_factory)()).clone()
    }

    /// Run the tiered policy. `max_tier` caps escalation (1..=3).
    pub fn transcribe(
        &self,
        audio: &AudioInput,
        max_tier: u8,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let mut best: Option<(i8, AsrResponse)> = None;

        // ── Tier 1: base model, no hint ──
        let tier1 = self.attempt(&*self.client, audio, &self.base_model, None, 1);
        let mut hint: Option<String> = audio.hint_language.clone();
        if let Some(response) = tier1 {
            let gates = evaluate_gates(&response);
            let arabic = matches!(response.language.as_str(), "ar" | "arabic");
            if gates.passed() && !response.text.is_empty() {
                // Arabic needs no further handling: the attempt was already a
                // native transcription, never a translation.
                return Ok(build_result(1, response));
            }
            if hint.is_none()
                && !response.language.is_empty()
                && response.language != "en"
                && response.confidence >= HINT_CONFIDENCE
            {
                hint = Some(if arabic { "ar".to_string() } else { response.language.clone() });
            }
            if !response.text.is_empty() {
                best = Some((1, response));
            }
        }

        // ── Tier 2: base model with language hint ──
        if max_tier >= 2 {
            if let Some(lang) = hint.as_deref() {
                if let Some(response) =
                    self.attempt(&*self.client, audio, &self.base_model, Some(lang), 2)
                {
                    let gates = evaluate_gates(&response);
                    if gates.passed() && !response.text.is_empty() {
                        return Ok(build_result(2, response));
                    }
                    if !response.text.is_empty() {
                        best = Some((2, response));
                    }
                }
            }
        }

        // ── Tier 3: high-capacity model, lazily allocated ──
        if max_tier >= 3 {
            match self.high_capacity() {
                Some(high) => {
                    if let Some(response) =
                        self.attempt(&*high, audio, &self.high_model, hint.as_deref(), 3)
                    {
                        if !response.text.is_empty() {
                            return Ok(build_result(3, response));
                        }
                    }
                }
                None => {
                    if let Some((tier, response)) = best {
                        tracing::warn!(
                            fallback_tier = tier,
                            "high-capacity tier unavailable, returning degraded result"
                        );
                        return Ok(build_result(-1, response));
                    }
                }
            }
        }

        match best {
            Some((tier, response)) => Ok(build_result(tier, response)),
            None => Err(TranscriptionError::AllTiersFailed),
        }
    }

    fn attempt(
        &self,
        client: &dyn AsrClient,
        audio: &AudioInput,
        model: &str,
        language: Option<&str>,
        tier: i8,
    ) -> Option<AsrResponse> {
        let request = AsrRequest {
            audio,
            model,
            language,
            prompt: Some(prompt_for(language.unwrap_or("en"))),
        };
        match client.transcribe(&request) {
            Ok(mut response) => {
                response.text = strip_prompt_echo(&response.text);
                let gates = evaluate_gates(&response);
                tracing::info!(
                    tier,
                    model,
                    language = language.unwrap_or("auto"),
                    chars = response.text.len(),
                    wpm = gates.wpm,
                    keyword_hit = gates.keyword_hit,
                    no_speech_prob = response.no_speech_prob,
                    passed = gates.passed(),
                    "transcription attempt"
                );
                Some(response)
            }
            Err(e) => {
                tracing::warn!(tier, model, error = %e, "transcription attempt failed");
                None
            }
        }
    }
}

fn build_result(tier: i8, response: AsrResponse) -> TranscriptionResult {
    TranscriptionResult {
        text: response.text,
        whisper_language: response.language,
        transcription_tier: tier,
        confidence: response.confidence,
        no_speech_prob: response.no_speech_prob,
        segments: response.segments,
    }
}
