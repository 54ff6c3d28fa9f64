//! Field-wise merge of the LLM and rule extractors' outputs.
//!
//! Precedence: greeting-pattern names are structurally reliable, so the
//! rule extractor wins `patient_name`; the LLM wins medicines, with any
//! missing field backfilled from the rule record for the same drug; list
//! fields are union-deduplicated preserving LLM insertion order.

use super::types::{
    dedup_key, push_unique, ExtractionMethod, Medicine, Prescription, RecommendedTest,
};

pub fn merge_prescriptions(llm: &Prescription, rule: &Prescription) -> Prescription {
    let mut merged = Prescription::empty(ExtractionMethod::Ensemble);
    merged.language = llm.language;
    merged.transcription_tier = llm.transcription_tier;

    merged.patient_name = if !rule.patient_name.is_empty() {
        rule.patient_name.clone()
    } else {
        llm.patient_name.clone()
    };
    merged.age = llm.age.clone().or_else(|| rule.age.clone());
    merged.gender = llm.gender.clone().or_else(|| rule.gender.clone());

    merged.medicines = merge_medicines(&llm.medicines, &rule.medicines);

    for item in llm.complaints.iter().chain(rule.complaints.iter()) {
        push_unique(&mut merged.complaints, item.clone());
    }
    for item in llm.diagnosis.iter().chain(rule.diagnosis.iter()) {
        push_unique(&mut merged.diagnosis, item.clone());
    }
    merged.tests = merge_tests(&llm.tests, &rule.tests);
    for item in llm.advice.iter().chain(rule.advice.iter()) {
        push_unique(&mut merged.advice, item.clone());
    }

    merged.follow_up_days = llm.follow_up_days.or(rule.follow_up_days);
    merged.confidence = llm.confidence.max(rule.confidence);
    for warning in llm.warnings.iter().chain(rule.warnings.iter()) {
        merged.warn(warning.clone());
    }
    merged
}

/// LLM medicines first; same-drug rule records fill the LLM record's
/// gaps; rule-only drugs are appended.
fn merge_medicines(llm: &[Medicine], rule: &[Medicine]) -> Vec<Medicine> {
    let mut merged: Vec<Medicine> = Vec::with_capacity(llm.len() + rule.len());

    for med in llm {
        let mut combined = med.clone();
        if let Some(counterpart) = rule.iter().find(|r| r.name == med.name) {
            if combined.dose.is_none() {
                combined.dose = counterpart.dose.clone();
            }
            if combined.frequency.is_empty() {
                combined.frequency = counterpart.frequency.clone();
            }
            if combined.duration.is_empty() {
                combined.duration = counterpart.duration.clone();
            }
            if combined.instruction.is_empty() {
                combined.instruction = counterpart.instruction.clone();
            }
        }
        if !merged.iter().any(|m| m.name == combined.name) {
            merged.push(combined);
        }
    }

    for med in rule {
        if !merged.iter().any(|m| m.name == med.name) {
            merged.push(med.clone());
        }
    }

    merged
}

fn merge_tests(llm: &[RecommendedTest], rule: &[RecommendedTest]) -> Vec<RecommendedTest> {
    let mut merged: Vec<RecommendedTest> = Vec::new();
    for test in llm.iter().chain(rule.iter()) {
        if !merged.iter().any(|t| dedup_key(&t.name) == dedup_key(&test.name)) {
            merged.push(test.clone());
        }
    }
    merged
}
