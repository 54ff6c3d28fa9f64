//! Diagnosis → anatomical-context rules.
//!
//! A diagnosis like sinusitis is anatomically nasal; if the surrounding
//! sentence talks about a disallowed organ (an ASR or translation artifact,
//! e.g. "pulmonary" next to sinusitis), the post-processor repairs the
//! diagnosis string using these rules.

use serde::{Deserialize, Serialize};

/// Anatomical context for one diagnosis term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnatomyRule {
    /// Diagnosis term this rule applies to (lowercase substring match).
    pub diagnosis: String,
    /// Organ/region adjectives consistent with the diagnosis.
    pub allowed: Vec<String>,
    /// Organ/region adjectives that contradict the diagnosis.
    pub forbidden: Vec<String>,
}

fn rule(diagnosis: &str, allowed: &[&str], forbidden: &[&str]) -> AnatomyRule {
    AnatomyRule {
        diagnosis: diagnosis.to_string(),
        allowed: allowed.iter().map(|s| s.to_string()).collect(),
        forbidden: forbidden.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn builtin_anatomy() -> Vec<AnatomyRule> {
    vec![
        rule(
            "sinusitis",
            &["nasal", "sinus", "paranasal"],
            &["pulmonary", "lung", "cardiac", "gastric"],
        ),
        rule(
            "pharyngitis",
            &["throat", "pharyngeal"],
            &["pulmonary", "gastric", "nasal"],
        ),
        rule(
            "bronchitis",
            &["bronchial", "chest", "pulmonary"],
            &["nasal", "gastric"],
        ),
        rule(
            "otitis",
            &["ear", "otic", "middle ear"],
            &["nasal", "pulmonary", "ophthalmic"],
        ),
        rule(
            "conjunctivitis",
            &["eye", "ocular", "conjunctival"],
            &["nasal", "otic"],
        ),
        rule(
            "gastritis",
            &["gastric", "stomach"],
            &["pulmonary", "nasal", "cardiac"],
        ),
        rule("rhinitis", &["nasal", "allergic"], &["pulmonary", "gastric"]),
    ]
}

impl AnatomyRule {
    /// The preferred replacement adjective for a repaired diagnosis.
    pub fn primary_allowed(&self) -> Option<&str> {
        self.allowed.first().map(|s| s.as_str())
    }

    /// Which forbidden organ term, if any, appears in `text`.
    pub fn forbidden_in(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.forbidden
            .iter()
            .find(|organ| lower.contains(organ.as_str()))
            .map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sinusitis_forbids_pulmonary() {
        let rules = builtin_anatomy();
        let sinus = rules.iter().find(|r| r.diagnosis == "sinusitis").unwrap();
        assert_eq!(sinus.forbidden_in("severe pulmonary sinusitis"), Some("pulmonary"));
        assert_eq!(sinus.primary_allowed(), Some("nasal"));
    }

    #[test]
    fn consistent_context_not_flagged() {
        let rules = builtin_anatomy();
        let sinus = rules.iter().find(|r| r.diagnosis == "sinusitis").unwrap();
        assert!(sinus.forbidden_in("nasal congestion with sinusitis").is_none());
    }
}
