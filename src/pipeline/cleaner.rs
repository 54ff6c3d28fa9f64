//! Transcript cleaning: fixes systematic ASR distortions before any
//! downstream stage sees the text.
//!
//! Applies the knowledge base's ordered correction list (phonetic first,
//! then brand→generic, then transliterations), normalizes unit spacing,
//! and collapses consecutive duplicate words. Idempotent: cleaning twice
//! yields the same text as cleaning once.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;

use crate::knowledge::KnowledgeBase;

/// Result of one cleaning pass.
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub text: String,
    /// Number of correction substitutions applied, for metrics.
    pub corrections_applied: usize,
    pub was_modified: bool,
}

pub struct TranscriptCleaner {
    kb: Arc<KnowledgeBase>,
}

impl TranscriptCleaner {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    pub fn clean(&self, text: &str) -> CleanOutcome {
        if text.trim().is_empty() {
            return CleanOutcome {
                text: text.to_string(),
                corrections_applied: 0,
                was_modified: false,
            };
        }

        let original = text;
        let mut cleaned = text.to_lowercase();
        let mut corrections_applied = 0;

        // Ordered corrections; earlier patterns take precedence because
        // their replacements no longer match later, broader patterns.
        for correction in self.kb.corrections() {
            let matches = correction.pattern.find_iter(&cleaned).count();
            if matches > 0 {
                cleaned = correction
                    .pattern
                    .replace_all(&cleaned, correction.replacement.as_str())
                    .into_owned();
                corrections_applied += matches;
                tracing::debug!(
                    kind = ?correction.kind,
                    replacement = %correction.replacement,
                    matches,
                    "transcript correction applied"
                );
            }
        }

        cleaned = normalize_unit_spacing(&cleaned);
        cleaned = collapse_duplicate_words(&cleaned);

        let was_modified = cleaned != original.to_lowercase();
        if was_modified {
            tracing::info!(
                corrections_applied,
                before = original.len(),
                after = cleaned.len(),
                "transcript cleaned"
            );
        }

        CleanOutcome {
            text: cleaned,
            corrections_applied,
            was_modified,
        }
    }
}

/// `500mg` → `500 mg`, `10ml` → `10 ml`, and friends.
fn normalize_unit_spacing(text: &str) -> String {
    static UNIT: OnceLock<Regex> = OnceLock::new();
    let re = UNIT.get_or_init(|| {
        Regex::new(r"(?i)\b(\d+(?:\.\d+)?)(mg|ml|mcg|gm|g|iu)\b").expect("unit spacing pattern")
    });
    re.replace_all(text, "$1 $2").into_owned()
}

/// Remove consecutive duplicate words ("take take the tablet").
fn collapse_duplicate_words(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for word in text.split_whitespace() {
        if out.last().map_or(true, |prev| !prev.eq_ignore_ascii_case(word)) {
            out.push(word);
        }
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> TranscriptCleaner {
        TranscriptCleaner::new(Arc::new(KnowledgeBase::builtin()))
    }

    #[test]
    fn phonetic_distortions_fixed() {
        let outcome = cleaner().clean("You have a throat inflection, likely paragenesis");
        assert!(outcome.text.contains("throat infection"));
        assert!(outcome.text.contains("pharyngitis"));
        assert!(outcome.corrections_applied >= 2);
        assert!(outcome.was_modified);
    }

    #[test]
    fn brand_replaced_by_generic() {
        let outcome = cleaner().clean("stayhappi nitrofurantoin tablet 100 mg twice daily");
        // The brand maps to the generic; duplicate-word collapse then leaves
        // a single generic for the downstream extractors.
        assert!(outcome.text.contains("nitrofurantoin"));
        assert!(!outcome.text.contains("stayhappi"));
        assert_eq!(outcome.text.matches("nitrofurantoin").count(), 1);
    }

    #[test]
    fn unit_spacing_normalized() {
        let outcome = cleaner().clean("take paracetamol 500mg and 10ml syrup");
        assert!(outcome.text.contains("500 mg"));
        assert!(outcome.text.contains("10 ml"));
    }

    #[test]
    fn duplicate_words_collapsed() {
        let outcome = cleaner().clean("take take the the tablet");
        assert_eq!(outcome.text, "take the tablet");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let c = cleaner();
        let first = c.clean("hi rohit rohit, back inflection, erytho mice in 500mg");
        let second = c.clean(&first.text);
        assert_eq!(first.text, second.text);
        assert!(!second.was_modified);
    }

    #[test]
    fn clean_transcript_untouched() {
        let c = cleaner();
        let outcome = c.clean("take erythromycin 500 mg three times a day for 5 days");
        assert!(!outcome.was_modified);
        assert_eq!(outcome.corrections_applied, 0);
    }

    #[test]
    fn empty_input_never_fails() {
        let outcome = cleaner().clean("   ");
        assert!(!outcome.was_modified);
        assert_eq!(outcome.corrections_applied, 0);
    }

    #[test]
    fn arabic_text_passes_through() {
        let text = "مرحباً فاطمة، لديها التهاب الجيوب الأنفية";
        let outcome = cleaner().clean(text);
        assert!(outcome.text.contains("التهاب"));
    }
}
