//! Dosage and term normalization.
//!
//! Canonicalizes units and frequency phrasing, standardizes durations,
//! re-asserts brand→generic mapping ahead of any fuzzy matching, and runs
//! the sentence-scoped diagnosis/anatomy pre-check whose findings the
//! post-processor consumes.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::knowledge::{CorrectionKind, KnowledgeBase};

/// A diagnosis whose sentence mentions an anatomically disallowed organ.
#[derive(Debug, Clone)]
pub struct AnatomyFlag {
    pub diagnosis: String,
    pub found_organ: String,
    pub allowed_organ: String,
}

#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub text: String,
    /// Human-readable record of what changed, for metrics and logs.
    pub steps: Vec<String>,
    pub anatomy_flags: Vec<AnatomyFlag>,
}

pub struct TermNormalizer {
    kb: Arc<KnowledgeBase>,
}

/// Unit phrasings → canonical unit.
const UNIT_REWRITES: &[(&str, &str)] = &[
    (r"(?i)\b(\d+(?:\.\d+)?)\s*milli\s*grams?\b", "$1 mg"),
    (r"(?i)\b(\d+(?:\.\d+)?)\s*milligrams?\b", "$1 mg"),
    (r"(?i)\b(\d+(?:\.\d+)?)\s*milli\s*litres?\b", "$1 ml"),
    (r"(?i)\b(\d+(?:\.\d+)?)\s*millilit(?:re|er)s?\b", "$1 ml"),
    (r"(?i)\b(\d+(?:\.\d+)?)\s*micrograms?\b", "$1 mcg"),
    (r"(?i)\b(\d+(?:\.\d+)?)\s*grams?\b", "$1 g"),
    (r"(?i)\b(\d+(?:\.\d+)?)\s*gm\b", "$1 g"),
];

/// Frequency phrasings → canonical phrase. Order matters: longer and more
/// specific phrasings first so their tails never match early.
const FREQUENCY_REWRITES: &[(&str, &str)] = &[
    (r"(?i)\bonce\s+(?:at|in\s+the)\s+night\b", "once at night"),
    (r"(?i)\bonce\s+daily\s+at\s+night\b", "once at night"),
    (r"(?i)\b(?:one|1)\s+time\s+a\s+day\b", "once daily"),
    (r"(?i)\bonce\s+a\s+day\b", "once daily"),
    (r"(?i)\b(?:two|2)\s+times\s+(?:a\s+|per\s+)?day\b", "twice daily"),
    (r"(?i)\btwice\s+a\s+day\b", "twice daily"),
    (r"(?i)\bmorning\s+and\s+(?:night|evening)\b", "twice daily"),
    (r"(?i)\b(?:three|3)\s+times\s+(?:a\s+|per\s+)?(?:day|daily)\b", "3 times a day"),
    (r"(?i)\bthrice\s+(?:a\s+day|daily)?\b", "3 times a day"),
    (r"(?i)\b(?:four|4)\s+times\s+(?:a\s+|per\s+)?(?:day|daily)\b", "4 times a day"),
    (r"(?i)\bevery\s+(\d+)\s+hours?\b", "every $1 hours"),
    (r"(?i)\b(?:as|when|if)\s+needed\b", "as needed"),
    (r"(?i)\bdaily\s+(\d+)\s+murai\b", "$1 times a day"),
    // Arabic frequency phrases, native-script transcription
    (r"مرة\s+في\s+الليل", "once at night"),
    (r"مرتين\s+في\s+اليوم", "twice daily"),
    (r"ثلاث\s+مرات\s+في\s+اليوم", "3 times a day"),
    (r"مرة\s+في\s+اليوم", "once daily"),
];

/// Word-number rewrites feeding the canonical forms above.
const FREQUENCY_POST: &[(&str, &str)] = &[
    (r"(?i)\b1\s+times\s+a\s+day\b", "once daily"),
    (r"(?i)\b2\s+times\s+a\s+day\b", "twice daily"),
];

const DURATION_REWRITES: &[(&str, &str)] = &[
    (r"(?i)\bfor\s+(\d+)\s+days?\b", "for $1 days"),
    (r"(?i)\b(\d+)\s+days?\b", "$1 days"),
    (r"(?i)\b(\d+)\s+weeks?\b", "$1 weeks"),
    (r"(?i)\b(\d+)\s+naal\b", "$1 days"),
    // Arabic durations: "لمدة 10 أيام" = for 10 days
    (r"لمدة\s+(\d+)\s+أيام", "for $1 days"),
];

fn compiled(set: &'static [(&str, &str)], slot: &'static OnceLock<Vec<(Regex, &'static str)>>) -> &'static [(Regex, &'static str)] {
    slot.get_or_init(|| {
        set.iter()
            .map(|(pat, rep)| (Regex::new(pat).expect("builtin rewrite pattern"), *rep))
            .collect()
    })
}

impl TermNormalizer {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    pub fn normalize(&self, text: &str) -> NormalizeOutcome {
        static UNITS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
        static FREQS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
        static POST: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
        static DURATIONS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

        let mut result = text.to_string();
        let mut steps = Vec::new();

        let mut apply = |label: &str, rules: &[(Regex, &'static str)], result: &mut String| {
            let mut count = 0;
            for (pattern, replacement) in rules {
                let found = pattern.find_iter(result).count();
                if found > 0 {
                    *result = pattern.replace_all(result, *replacement).into_owned();
                    count += found;
                }
            }
            if count > 0 {
                steps.push(format!("{label}: {count}"));
            }
        };

        apply("units", compiled(UNIT_REWRITES, &UNITS), &mut result);
        apply("frequency", compiled(FREQUENCY_REWRITES, &FREQS), &mut result);
        apply("frequency", compiled(FREQUENCY_POST, &POST), &mut result);
        apply("duration", compiled(DURATION_REWRITES, &DURATIONS), &mut result);

        // Brand→generic once more, ahead of any fuzzy matching downstream.
        // Idempotent over the cleaner's earlier pass.
        let mut brand_count = 0;
        for correction in self.kb.corrections() {
            if correction.kind != CorrectionKind::Brand {
                continue;
            }
            let found = correction.pattern.find_iter(&result).count();
            if found > 0 {
                result = correction
                    .pattern
                    .replace_all(&result, correction.replacement.as_str())
                    .into_owned();
                brand_count += found;
            }
        }
        if brand_count > 0 {
            steps.push(format!("brand: {brand_count}"));
        }

        let anatomy_flags = self.anatomy_precheck(&result);
        if !steps.is_empty() {
            tracing::info!(steps = ?steps, flags = anatomy_flags.len(), "transcript normalized");
        }

        NormalizeOutcome {
            text: result,
            steps,
            anatomy_flags,
        }
    }

    /// Flag diagnoses whose sentence carries an anatomically disallowed
    /// organ term. Sentence-scoped: a "pulmonary" two sentences away from
    /// "sinusitis" is not a conflict.
    fn anatomy_precheck(&self, text: &str) -> Vec<AnatomyFlag> {
        let mut flags = Vec::new();
        for sentence in text.split(['.', '!', '?', '؟']) {
            let lower = sentence.to_lowercase();
            for rule in self.kb.anatomy_rules() {
                if !lower.contains(&rule.diagnosis) {
                    continue;
                }
                if let Some(organ) = rule.forbidden_in(&lower) {
                    if let Some(allowed) = rule.primary_allowed() {
                        tracing::warn!(
                            diagnosis = %rule.diagnosis,
                            organ,
                            "anatomically inconsistent organ near diagnosis"
                        );
                        flags.push(AnatomyFlag {
                            diagnosis: rule.diagnosis.clone(),
                            found_organ: organ.to_string(),
                            allowed_organ: allowed.to_string(),
                        });
                    }
                }
            }
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> TermNormalizer {
        TermNormalizer::new(Arc::new(KnowledgeBase::builtin()))
    }

    #[test]
    fn milligram_spellings_become_mg() {
        let out = normalizer().normalize("paracetamol 500 milligrams and 250 milli gram");
        assert!(out.text.contains("500 mg"));
        assert!(out.text.contains("250 mg"));
    }

    #[test]
    fn frequency_phrases_canonicalized() {
        let out = normalizer().normalize(
            "take it three times a day, the other twice a day, the last once in the night",
        );
        assert!(out.text.contains("3 times a day"));
        assert!(out.text.contains("twice daily"));
        assert!(out.text.contains("once at night"));
    }

    #[test]
    fn morning_and_night_is_twice_daily() {
        let out = normalizer().normalize("paracetamol 500 mg morning and night, 3 days");
        assert!(out.text.contains("twice daily"));
    }

    #[test]
    fn every_n_hours_preserved() {
        let out = normalizer().normalize("one dose every 8 hours");
        assert!(out.text.contains("every 8 hours"));
    }

    #[test]
    fn thanglish_murai_frequency() {
        let out = normalizer().normalize("marunthu daily 2 murai");
        assert!(out.text.contains("twice daily"));
    }

    #[test]
    fn arabic_frequency_mapped() {
        let out = normalizer().normalize("خذي levocetirizine 5 mg مرة في الليل لمدة 10 أيام");
        assert!(out.text.contains("once at night"));
        assert!(out.text.contains("for 10 days"));
    }

    #[test]
    fn anatomy_precheck_flags_same_sentence_conflict() {
        let out = normalizer().normalize("she has pulmonary sinusitis. take rest.");
        assert_eq!(out.anatomy_flags.len(), 1);
        assert_eq!(out.anatomy_flags[0].found_organ, "pulmonary");
        assert_eq!(out.anatomy_flags[0].allowed_organ, "nasal");
    }

    #[test]
    fn anatomy_precheck_ignores_cross_sentence_mentions() {
        let out = normalizer().normalize("she has sinusitis. pulmonary function is fine.");
        assert!(out.anatomy_flags.is_empty());
    }

    #[test]
    fn normalization_is_idempotent() {
        let n = normalizer();
        let once = n.normalize("take 500 milligrams three times a day for 5 days");
        let twice = n.normalize(&once.text);
        assert_eq!(once.text, twice.text);
    }
}
