//! Post-extraction semantic repairs, applied in a fixed order:
//! frequency legality, form→route override, organ-context repair,
//! evidence-gated advice, patient-name repair. Running the pass twice on
//! its own output changes nothing.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::knowledge::{frequency, routes, KnowledgeBase};
use crate::pipeline::normalize::AnatomyFlag;

use super::rules::extract_patient_name;
use super::types::Prescription;

/// Advice must be anchored: at least this share of its content words must
/// appear in the cleaned transcript.
const ADVICE_EVIDENCE_RATIO: f32 = 0.70;

pub struct PostProcessor {
    kb: Arc<KnowledgeBase>,
}

impl PostProcessor {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    /// Run every repair. `template_advice` disables the evidence gate for
    /// the explicit doctor-review mode; it is off by default.
    pub fn run(
        &self,
        prescription: &mut Prescription,
        transcript: &str,
        anatomy_flags: &[AnatomyFlag],
        template_advice: bool,
    ) {
        self.repair_frequencies(prescription);
        self.override_routes(prescription);
        self.repair_anatomy(prescription, anatomy_flags);
        if !template_advice {
            self.gate_advice(prescription, transcript);
        }
        self.repair_patient_name(prescription, transcript);
    }

    /// Snap each medicine's frequency onto its drug's allowed set (or the
    /// canonical set when the drug carries no restriction).
    fn repair_frequencies(&self, prescription: &mut Prescription) {
        let mut corrections: Vec<String> = Vec::new();
        for med in &mut prescription.medicines {
            if med.frequency.trim().is_empty() {
                continue;
            }
            let allowed = self.kb.allowed_frequencies(&med.name);
            let legal = if allowed.is_empty() {
                frequency::is_canonical(&med.frequency)
            } else {
                allowed.iter().any(|f| f == med.frequency.trim())
            };
            if legal {
                continue;
            }

            let candidates: Vec<&str> = if allowed.is_empty() {
                frequency::CANONICAL.to_vec()
            } else {
                allowed.iter().map(|s| s.as_str()).collect()
            };
            let nearest = nearest_frequency(&med.frequency, &candidates);
            tracing::info!(
                drug = %med.name,
                from = %med.frequency,
                to = %nearest,
                "frequency corrected"
            );
            med.frequency = nearest.to_string();
            corrections.push(format!("frequency corrected for {}", med.name));
        }
        for warning in corrections {
            prescription.warn(warning);
        }
    }

    /// A form term in the name or instruction decides the route, whatever
    /// the extractor said.
    fn override_routes(&self, prescription: &mut Prescription) {
        for med in &mut prescription.medicines {
            let haystack = format!("{} {}", med.name, med.instruction);
            if let Some((form, route)) = routes::route_for_form(&haystack) {
                if med.route != route {
                    tracing::debug!(
                        drug = %med.name,
                        form,
                        from = %med.route,
                        to = %route,
                        "route overridden by dosage form"
                    );
                    med.route = route;
                }
            }
        }
    }

    /// Replace anatomically disallowed organ adjectives in diagnosis
    /// strings, driven by the normalizer's sentence-scoped flags and the
    /// anatomy table itself.
    fn repair_anatomy(&self, prescription: &mut Prescription, flags: &[AnatomyFlag]) {
        let mut warnings: Vec<String> = Vec::new();

        for diagnosis in &mut prescription.diagnosis {
            let lower = diagnosis.to_lowercase();

            // Direct conflicts inside the diagnosis string.
            for rule in self.kb.anatomy_rules() {
                if !lower.contains(&rule.diagnosis) {
                    continue;
                }
                if let Some(organ) = rule.forbidden_in(&lower) {
                    if let Some(allowed) = rule.primary_allowed() {
                        let repaired = lower.replace(organ, allowed);
                        warnings.push(format!(
                            "anatomy corrected for {}: {organ} -> {allowed}",
                            rule.diagnosis
                        ));
                        *diagnosis = repaired;
                    }
                }
            }

            // Transcript-level conflicts flagged by the normalizer. A
            // warning is only recorded for a replacement actually made; a
            // diagnosis string that is already clean stays silent.
            for flag in flags {
                let lower = diagnosis.to_lowercase();
                if lower.contains(&flag.diagnosis) && lower.contains(&flag.found_organ) {
                    *diagnosis = lower.replace(&flag.found_organ, &flag.allowed_organ);
                    warnings.push(format!(
                        "anatomy corrected for {}: {} -> {}",
                        flag.diagnosis, flag.found_organ, flag.allowed_organ
                    ));
                }
            }
        }

        for warning in warnings {
            prescription.warn(warning);
        }
    }

    /// Drop advice that is not anchored in the transcript: ≥ 70% of its
    /// content words present, and the sentence holding them must carry an
    /// explicit advice indicator.
    fn gate_advice(&self, prescription: &mut Prescription, transcript: &str) {
        let lower_transcript = transcript.to_lowercase();
        let sentences: Vec<String> = lower_transcript
            .split(['.', '!', '?', '؟', ','])
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let mut dropped: Vec<String> = Vec::new();
        prescription.advice.retain(|advice| {
            if advice_is_evidenced(advice, &lower_transcript, &sentences) {
                true
            } else {
                dropped.push(advice.clone());
                false
            }
        });

        for advice in dropped {
            tracing::info!(advice = %advice, "advice dropped, no transcript evidence");
            prescription.warn(format!("advice dropped: {advice}"));
        }
    }

    /// Last-chance greeting-pattern pass when no name survived extraction.
    fn repair_patient_name(&self, prescription: &mut Prescription, transcript: &str) {
        if !prescription.patient_name.is_empty() {
            return;
        }
        let name = extract_patient_name(&self.kb, transcript);
        if !name.is_empty() {
            tracing::debug!(name = %name, "patient name recovered in post-processing");
            prescription.patient_name = name;
        }
    }
}

/// Nearest frequency by shared-token count; commonness breaks ties.
fn nearest_frequency<'a>(current: &str, candidates: &[&'a str]) -> &'a str {
    let current_tokens: Vec<String> = current
        .to_lowercase()
        .split_whitespace()
        .map(String::from)
        .collect();

    let mut best: &'a str = candidates
        .iter()
        .copied()
        .min_by_key(|c| frequency::commonness_rank(c))
        .unwrap_or(frequency::CANONICAL[0]);
    let mut best_overlap = 0usize;
    let mut best_rank = frequency::commonness_rank(best);

    for &candidate in candidates {
        let overlap = candidate
            .split_whitespace()
            .filter(|t| current_tokens.iter().any(|c| c == t))
            .count();
        let rank = frequency::commonness_rank(candidate);
        if overlap > best_overlap || (overlap == best_overlap && overlap > 0 && rank < best_rank) {
            best = candidate;
            best_overlap = overlap;
            best_rank = rank;
        }
    }
    best
}

fn advice_indicator() -> &'static Regex {
    static INDICATOR: OnceLock<Regex> = OnceLock::new();
    INDICATOR.get_or_init(|| {
        Regex::new(r"(?i)\b(rest|avoid|drink|take|follow|wait|continue|complete)\b")
            .expect("advice indicator pattern")
    })
}

fn advice_is_evidenced(advice: &str, transcript: &str, sentences: &[String]) -> bool {
    let content_words: Vec<String> = advice
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3)
        .map(String::from)
        .collect();

    if content_words.is_empty() {
        return true;
    }

    let present: Vec<&String> = content_words
        .iter()
        .filter(|w| transcript.contains(w.as_str()))
        .collect();
    let ratio = present.len() as f32 / content_words.len() as f32;
    if ratio < ADVICE_EVIDENCE_RATIO {
        return false;
    }

    // The sentence carrying the evidence must read like advice.
    sentences.iter().any(|sentence| {
        present.iter().any(|w| sentence.contains(w.as_str())) && advice_indicator().is_match(sentence)
    })
}
