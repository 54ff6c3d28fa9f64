//! Prescription validation: required fields, dose format, duplicates,
//! dangerous combinations. Validation never discards the record; the
//! report is returned alongside it.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;

use crate::extraction::Prescription;
use crate::knowledge::KnowledgeBase;

/// Outcome of validating one prescription.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct Validator {
    kb: Arc<KnowledgeBase>,
}

fn dose_format() -> &'static Regex {
    static DOSE: OnceLock<Regex> = OnceLock::new();
    DOSE.get_or_init(|| {
        Regex::new(r"(?i)^\d+(\.\d+)?\s*(mg|ml|mcg|g|iu|units?|drops?|sprays?|puffs?|tablets?|capsules?)$")
            .expect("dose format pattern")
    })
}

impl Validator {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    pub fn validate(&self, prescription: &Prescription) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if prescription.medicines.is_empty() {
            errors.push("at-least-one-medicine-required".to_string());
        }
        if prescription.diagnosis.is_empty() {
            warnings.push("no diagnosis captured".to_string());
        }
        if prescription.patient_name.is_empty() {
            warnings.push("patient name not captured".to_string());
        }

        let mut seen: Vec<&str> = Vec::new();
        for med in &prescription.medicines {
            if let Some(dose) = &med.dose {
                if !dose_format().is_match(dose.trim()) {
                    errors.push(format!("invalid dose format for {}: '{dose}'", med.name));
                }
            }

            // The merger must have deduplicated; a surviving duplicate is
            // an internal invariant violation, not a data problem.
            if seen.contains(&med.name.as_str()) {
                errors.push(format!("duplicate medicine: {}", med.name));
            } else {
                seen.push(&med.name);
            }
        }

        for (i, first) in prescription.medicines.iter().enumerate() {
            for second in &prescription.medicines[i + 1..] {
                for pair in self.kb.dangerous_pairs() {
                    if pair.matches(&first.name, &second.name) {
                        warnings.push(format!(
                            "dangerous combination {} + {}: {}",
                            pair.first, pair.second, pair.reason
                        ));
                    }
                }
            }
        }

        let valid = errors.is_empty();
        tracing::info!(
            valid,
            errors = errors.len(),
            warnings = warnings.len(),
            "validation complete"
        );
        ValidationReport {
            valid,
            errors,
            warnings,
        }
    }
}
