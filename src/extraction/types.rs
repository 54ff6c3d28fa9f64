//! The prescription schema enforced end-to-end.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::knowledge::{Route, TestKind};
use crate::pipeline::language::Language;

/// Which extractor produced a prescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Llm,
    Rules,
    Ensemble,
    /// Internal marker for an LLM attempt whose response never yielded
    /// parseable JSON. Never appears in a finished prescription.
    Failed,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Llm => "llm",
            ExtractionMethod::Rules => "rules",
            ExtractionMethod::Ensemble => "ensemble",
            ExtractionMethod::Failed => "failed",
        }
    }
}

/// One prescribed medicine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Medicine {
    /// Canonical generic name.
    pub name: String,
    /// Dose with unit, e.g. "500 mg". `None` when no numeric dose was heard.
    pub dose: Option<String>,
    /// Canonical frequency phrase.
    pub frequency: String,
    pub duration: String,
    /// Timing/method, e.g. "after food".
    pub instruction: String,
    pub route: Route,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub side_effects: Vec<String>,
}

/// A recommended investigation, tagged by category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedTest {
    pub name: String,
    pub kind: TestKind,
}

/// The validated output record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    /// May be empty when no name was captured.
    pub patient_name: String,
    /// Free-form because transcripts are imprecise ("about forty").
    pub age: Option<String>,
    pub gender: Option<String>,
    pub complaints: Vec<String>,
    pub diagnosis: Vec<String>,
    pub medicines: Vec<Medicine>,
    pub tests: Vec<RecommendedTest>,
    pub advice: Vec<String>,
    pub follow_up_days: Option<u32>,
    pub language: Language,
    pub confidence: f32,
    pub extraction_method: ExtractionMethod,
    pub transcription_tier: i8,
    /// ISO-8601 production time.
    pub timestamp: String,
    pub warnings: Vec<String>,
}

impl Prescription {
    /// An empty shell: every list empty, every optional absent.
    pub fn empty(method: ExtractionMethod) -> Self {
        Self {
            patient_name: String::new(),
            age: None,
            gender: None,
            complaints: Vec::new(),
            diagnosis: Vec::new(),
            medicines: Vec::new(),
            tests: Vec::new(),
            advice: Vec::new(),
            follow_up_days: None,
            language: Language::En,
            confidence: 0.0,
            extraction_method: method,
            transcription_tier: 1,
            timestamp: Utc::now().to_rfc3339(),
            warnings: Vec::new(),
        }
    }

    /// True when nothing clinically useful was extracted.
    pub fn is_empty_shell(&self) -> bool {
        self.medicines.is_empty()
            && self.diagnosis.is_empty()
            && self.complaints.is_empty()
            && self.tests.is_empty()
            && self.advice.is_empty()
    }

    /// Append a warning once.
    pub fn warn(&mut self, message: String) {
        if !self.warnings.contains(&message) {
            self.warnings.push(message);
        }
    }
}

/// Case-insensitive push that preserves first-seen order and strips
/// leading articles before comparing.
pub fn push_unique(list: &mut Vec<String>, item: String) {
    let key = dedup_key(&item);
    if key.is_empty() {
        return;
    }
    if !list.iter().any(|existing| dedup_key(existing) == key) {
        list.push(item);
    }
}

/// Normalization used for list deduplication: lowercase, articles stripped.
pub fn dedup_key(item: &str) -> String {
    let lower = item.trim().to_lowercase();
    for article in ["a ", "an ", "the "] {
        if let Some(rest) = lower.strip_prefix(article) {
            return rest.trim().to_string();
        }
    }
    lower
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_shell_is_empty() {
        let p = Prescription::empty(ExtractionMethod::Rules);
        assert!(p.is_empty_shell());
        assert!(p.patient_name.is_empty());
        assert!(p.age.is_none());
    }

    #[test]
    fn push_unique_ignores_case_and_articles() {
        let mut list = vec!["the common cold".to_string()];
        push_unique(&mut list, "Common Cold".to_string());
        push_unique(&mut list, "fever".to_string());
        assert_eq!(list, vec!["the common cold", "fever"]);
    }

    #[test]
    fn push_unique_drops_blank_items() {
        let mut list: Vec<String> = Vec::new();
        push_unique(&mut list, "   ".to_string());
        assert!(list.is_empty());
    }

    #[test]
    fn medicine_serializes_null_dose() {
        let med = Medicine {
            name: "paracetamol".into(),
            frequency: "once daily".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&med).unwrap();
        assert!(json["dose"].is_null());
        assert_eq!(json["route"], "oral");
    }

    #[test]
    fn extraction_method_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ExtractionMethod::Ensemble).unwrap(), "\"ensemble\"");
    }

    #[test]
    fn warn_deduplicates() {
        let mut p = Prescription::empty(ExtractionMethod::Llm);
        p.warn("frequency corrected for paracetamol".into());
        p.warn("frequency corrected for paracetamol".into());
        assert_eq!(p.warnings.len(), 1);
    }
}
