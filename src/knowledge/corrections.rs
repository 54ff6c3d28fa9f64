//! Ordered transcript corrections for systematic ASR distortions.
//!
//! Three families, applied in order: phonetic confusions, brand→generic
//! substitutions, and transliterated drug tokens. Brand substitution runs
//! before any fuzzy matching downstream so the generic name survives.

use regex::Regex;

/// Why a correction exists. Carried for logging and the no-undo guard in
/// the LLM extractor's fuzzy pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionKind {
    Phonetic,
    Brand,
    Transliteration,
}

/// A single compiled correction. First matching pattern wins for a span;
/// patterns are applied in list order.
#[derive(Debug, Clone)]
pub struct Correction {
    pub pattern: Regex,
    pub replacement: String,
    pub kind: CorrectionKind,
}

impl Correction {
    pub fn new(pattern: &str, replacement: &str, kind: CorrectionKind) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(&format!("(?i){pattern}"))?,
            replacement: replacement.to_string(),
            kind,
        })
    }
}

/// Phonetic ASR confusions observed in real consultation transcripts.
/// Ordered: multi-word distortions before their single-word tails.
pub const PHONETIC_CORRECTIONS: &[(&str, &str)] = &[
    // Infection family
    (r"\bback\s+inflection\b", "bacterial infection"),
    (r"\bbacterial\s+infraction\b", "bacterial infection"),
    (r"\bbacterial\s+fracture\b", "bacterial infection"),
    (r"\bthroat\s+infraction\b", "throat infection"),
    (r"\binflection\b", "infection"),
    (r"\binfraction\b", "infection"),
    // Pharyngitis distortions
    (r"\bfrench\s+dices?\b", "pharyngitis"),
    (r"\bparagenesis\b", "pharyngitis"),
    (r"\bparakinesis\b", "pharyngitis"),
    (r"\bfrangitis\b", "pharyngitis"),
    (r"\bfirennets\b", "pharyngitis"),
    (r"\bpharangitis\b", "pharyngitis"),
    // Drug-name distortions
    (r"\berytho\s+mice\s+in\b", "erythromycin"),
    (r"\bretromyzen\b", "erythromycin"),
    (r"\berythomycin\b", "erythromycin"),
    (r"\bamoxycillin\b", "amoxicillin"),
    (r"\bamoxylin\b", "amoxicillin"),
    (r"\bparacetamole\b", "paracetamol"),
    (r"\basprine\b", "aspirin"),
    (r"\bmetaphormion\b", "metformin"),
    (r"\bmetphormion\b", "metformin"),
    (r"\blevosidazine\b", "levocetirizine"),
    (r"\blevocitirizine\b", "levocetirizine"),
    (r"\bomerazole\b", "omeprazole"),
    (r"\bbento\s+brazul\b", "pantoprazole"),
    (r"\bonden\s+citron\b", "ondansetron"),
    // Phrase artifacts
    (r"\bantibiotic\s+risk\b", "antibiotics"),
    // Tamil phonetic confusions of fever
    (r"\bkayachel\b", "kaichal"),
    (r"\bkaiachel\b", "kaichal"),
    (r"\bkayaichel\b", "kaichal"),
];

/// Compile the static phonetic list. Panics only on a malformed builtin
/// pattern, which is covered by tests.
pub fn compile_phonetic() -> Vec<Correction> {
    PHONETIC_CORRECTIONS
        .iter()
        .map(|(pat, rep)| {
            Correction::new(pat, rep, CorrectionKind::Phonetic)
                .unwrap_or_else(|e| panic!("invalid builtin correction {pat}: {e}"))
        })
        .collect()
}

/// Build a word-boundary correction that maps `term` to `generic`.
/// Used for brand and transliteration entries from the gazetteer.
pub fn term_correction(
    term: &str,
    generic: &str,
    kind: CorrectionKind,
) -> Result<Correction, regex::Error> {
    Correction::new(&format!(r"\b{}\b", regex::escape(term)), generic, kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_patterns_all_compile() {
        let compiled = compile_phonetic();
        assert_eq!(compiled.len(), PHONETIC_CORRECTIONS.len());
    }

    #[test]
    fn inflection_becomes_infection() {
        let corrections = compile_phonetic();
        let mut text = "you have a throat inflection".to_string();
        for c in &corrections {
            text = c.pattern.replace_all(&text, c.replacement.as_str()).into_owned();
        }
        assert_eq!(text, "you have a throat infection");
    }

    #[test]
    fn multi_word_distortion_wins_over_tail() {
        // "back inflection" must become "bacterial infection", not "back infection"
        let corrections = compile_phonetic();
        let mut text = "looks like a back inflection".to_string();
        for c in &corrections {
            text = c.pattern.replace_all(&text, c.replacement.as_str()).into_owned();
        }
        assert_eq!(text, "looks like a bacterial infection");
    }

    #[test]
    fn corrections_are_idempotent() {
        let corrections = compile_phonetic();
        let apply = |input: &str| {
            let mut text = input.to_string();
            for c in &corrections {
                text = c.pattern.replace_all(&text, c.replacement.as_str()).into_owned();
            }
            text
        };
        let once = apply("paragenesis with erytho mice in and asprine");
        let twice = apply(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn term_correction_escapes_regex_metacharacters() {
        let c = term_correction("co-amoxiclav", "amoxicillin-clavulanic acid", CorrectionKind::Brand)
            .unwrap();
        assert!(c.pattern.is_match("take co-amoxiclav today"));
    }
}
