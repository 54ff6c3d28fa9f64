//! LLM-backed prescription extraction.
//!
//! `LlmClient` is the collaborator seam; the HTTP implementation speaks a
//! chat-completions API with deterministic decoding. The extractor walks a
//! configured model list (first success wins), retries once on unparseable
//! output, backs off on rate limits, and cleans the parsed draft: name
//! deduplication, clinical-term name rejection, fuzzy drug correction with
//! a no-undo guard, and the numeric-token dose gate.

use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::knowledge::{routes, KnowledgeBase, Route};
use crate::pipeline::language::LanguageDecision;

use super::parser::{parse_prescription, RawMedicine, RawPrescription};
use super::prompt::{build_user_prompt, RETRY_REMINDER, SYSTEM_PROMPT};
use super::types::{push_unique, ExtractionMethod, Medicine, Prescription};
use super::{ExtractionError, Extractor};

/// Similarity floor for fuzzy drug-name correction.
const FUZZY_FLOOR: f64 = 0.4;

/// Token budget sized for long prescriptions.
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Typed LLM collaborator failures. Rate limits are retried with backoff;
/// everything else falls through to the next configured model.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
}

/// Chat-completion collaborator abstraction (allows mocking).
pub trait LlmClient: Send + Sync {
    fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionsClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl ChatCompletionsClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build LLM HTTP client");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl LlmClient for ChatCompletionsClient {
    fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0,
            "max_tokens": max_tokens,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000);
            return Err(LlmError::RateLimited { retry_after_ms });
        }
        if status.as_u16() == 404 {
            return Err(LlmError::ModelUnavailable(model.to_string()));
        }
        if status.as_u16() == 400 {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::BadRequest(body));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| LlmError::Network(format!("failed to parse completion: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Api {
                status: 200,
                body: "empty choices".into(),
            })
    }
}

/// Scripted LLM client for tests: pops one result per call.
pub struct MockLlmClient {
    script: Mutex<Vec<Result<String, LlmError>>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        let mut script = script;
        script.reverse();
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(response: &str) -> Self {
        Self::new(vec![Ok(response.to_string()); 8])
    }
}

impl LlmClient for MockLlmClient {
    fn complete(
        &self,
        model: &str,
        _system: &str,
        _user: &str,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(model.to_string());
        self.script
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(Err(LlmError::Network("mock script exhausted".into())))
    }
}

/// The LLM extractor: prompt → model fallback → JSON recovery → cleanup.
pub struct LlmExtractor {
    client: Box<dyn LlmClient>,
    models: Vec<String>,
    kb: Arc<KnowledgeBase>,
    max_tokens: u32,
    backoff_base_ms: u64,
    rate_limit_retries: u32,
}

impl LlmExtractor {
    pub fn new(client: Box<dyn LlmClient>, models: Vec<String>, kb: Arc<KnowledgeBase>) -> Self {
        Self {
            client,
            models,
            kb,
            max_tokens: DEFAULT_MAX_TOKENS,
            backoff_base_ms: 250,
            rate_limit_retries: 2,
        }
    }

    /// Shrink the backoff for tests.
    pub fn with_backoff_base_ms(mut self, ms: u64) -> Self {
        self.backoff_base_ms = ms;
        self
    }

    fn complete_with_backoff(&self, model: &str, user: &str) -> Result<String, LlmError> {
        let mut attempt = 0u32;
        loop {
            match self.client.complete(model, SYSTEM_PROMPT, user, self.max_tokens) {
                Err(LlmError::RateLimited { retry_after_ms }) if attempt < self.rate_limit_retries => {
                    let backoff = retry_after_ms
                        .unwrap_or(self.backoff_base_ms << attempt)
                        .min(4_000);
                    tracing::warn!(model, attempt, backoff_ms = backoff, "rate limited, backing off");
                    std::thread::sleep(std::time::Duration::from_millis(backoff));
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Turn the parsed draft into a cleaned prescription.
    fn finish(&self, raw: RawPrescription, language: &LanguageDecision) -> Prescription {
        let mut p = Prescription::empty(ExtractionMethod::Llm);
        p.language = language.primary;

        p.patient_name = raw
            .patient_name
            .map(|name| self.clean_patient_name(&name))
            .unwrap_or_default();
        p.age = raw.age;
        p.gender = raw.gender;
        for item in raw.complaints {
            push_unique(&mut p.complaints, item.to_lowercase());
        }
        for item in raw.diagnosis {
            push_unique(&mut p.diagnosis, item.to_lowercase());
        }
        for item in raw.tests {
            if let Some(test) = super::rules::tag_test(&item) {
                if !p.tests.iter().any(|t| t.name == test.name) {
                    p.tests.push(test);
                }
            }
        }
        for item in raw.advice {
            push_unique(&mut p.advice, item);
        }
        p.follow_up_days = raw.follow_up_days;

        for raw_med in raw.medicines {
            if let Some(med) = self.clean_medicine(raw_med) {
                if !p.medicines.iter().any(|m| m.name == med.name) {
                    p.medicines.push(med);
                }
            }
        }

        p.confidence = if p.is_empty_shell() { 0.5 } else { 0.85 };
        p
    }

    /// Collapse repeated name tokens and reject clinical-term candidates.
    fn clean_patient_name(&self, name: &str) -> String {
        let mut seen: Vec<String> = Vec::new();
        for token in name.split_whitespace() {
            let lower = token.to_lowercase();
            if self.kb.is_clinical_term(&lower) {
                continue;
            }
            if !seen.iter().any(|s| s.to_lowercase() == lower) {
                seen.push(token.to_string());
            }
        }
        seen.join(" ")
    }

    fn clean_medicine(&self, raw: RawMedicine) -> Option<Medicine> {
        let name = raw.name?.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }

        let stripped = strip_form_suffix(&name);

        // Exact gazetteer hit (generic, alias, brand or transliteration)
        // counts as an already-applied correction: the no-undo guard skips
        // fuzzy matching so a brand-mapped generic cannot be re-mangled.
        let canonical = match self.kb.canonical_name(&stripped) {
            Some(generic) => generic.to_string(),
            None => match self.kb.fuzzy_drug(&stripped, FUZZY_FLOOR) {
                Some((generic, sim)) => {
                    tracing::debug!(from = %stripped, to = %generic, sim, "fuzzy drug correction");
                    generic.to_string()
                }
                None => stripped,
            },
        };

        Some(Medicine {
            name: canonical,
            dose: raw.dose.and_then(|d| normalize_dose(&d)),
            frequency: raw.frequency.unwrap_or_default().to_lowercase(),
            duration: raw.duration.unwrap_or_default().to_lowercase(),
            instruction: raw.instruction.unwrap_or_default().to_lowercase(),
            route: raw
                .route
                .as_deref()
                .and_then(parse_route)
                .unwrap_or_default(),
            side_effects: raw.side_effects,
        })
    }
}

impl Extractor for LlmExtractor {
    fn extract(
        &self,
        transcript: &str,
        language: &LanguageDecision,
    ) -> Result<Prescription, ExtractionError> {
        let user = build_user_prompt(transcript);
        let mut last_error = String::from("no models configured");
        let mut any_response = false;

        for model in &self.models {
            let response = match self.complete_with_backoff(model, &user) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(model, error = %e, "LLM model failed, trying next");
                    last_error = e.to_string();
                    continue;
                }
            };
            any_response = true;

            if let Some(raw) = parse_prescription(&response) {
                tracing::info!(model, "LLM extraction succeeded");
                return Ok(self.finish(raw, language));
            }

            // One retry with an explicit raw-JSON reminder.
            tracing::info!(model, "unparseable LLM response, retrying with reminder");
            let retry_user = format!("{user}\n\n{RETRY_REMINDER}");
            if let Ok(retry) = self.complete_with_backoff(model, &retry_user) {
                if let Some(raw) = parse_prescription(&retry) {
                    return Ok(self.finish(raw, language));
                }
            }
            last_error = format!("model {model} returned unparseable JSON twice");
        }

        if any_response {
            // JSON recovery exhausted on every model: empty shell, marked
            // failed, so the caller can fall back to rules.
            let mut shell = Prescription::empty(ExtractionMethod::Failed);
            shell.language = language.primary;
            Ok(shell)
        } else {
            Err(ExtractionError::AllModelsFailed(last_error))
        }
    }
}

/// Drop a trailing dosage-form word from a drug name ("nitrofurantoin
/// tablet" → "nitrofurantoin").
fn strip_form_suffix(name: &str) -> String {
    let mut result = name.trim().to_string();
    loop {
        let mut stripped = false;
        for &(form, _) in routes::FORM_ROUTES {
            if let Some(prefix) = result.strip_suffix(form) {
                let prefix = prefix.trim_end();
                if !prefix.is_empty() {
                    result = prefix.to_string();
                    stripped = true;
                }
            }
        }
        if !stripped {
            break;
        }
    }
    result
}

/// The dose gate: keep only doses carrying a numeric token, normalized to
/// `N unit` spacing. A dose the model invented ("one pack") becomes `None`.
fn normalize_dose(dose: &str) -> Option<String> {
    static DOSE: OnceLock<Regex> = OnceLock::new();
    let re = DOSE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(mg|ml|mcg|g|iu|units?|drops?|sprays?|puffs?|tablets?|capsules?)?")
            .expect("dose pattern")
    });
    let trimmed = dose.trim();
    if !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let captures = re.captures(trimmed)?;
    let number = captures.get(1)?.as_str();
    let unit = captures
        .get(2)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| "mg".to_string());
    Some(format!("{number} {unit}"))
}

fn parse_route(s: &str) -> Option<Route> {
    match s.trim().to_lowercase().as_str() {
        "oral" => Some(Route::Oral),
        "nasal" => Some(Route::Nasal),
        "topical" => Some(Route::Topical),
        "ophthalmic" => Some(Route::Ophthalmic),
        "otic" => Some(Route::Otic),
        "inhaled" | "inhalation" => Some(Route::Inhaled),
        "parenteral" | "injection" | "iv" | "im" => Some(Route::Parenteral),
        "rectal" => Some(Route::Rectal),
        _ => None,
    }
}
