//! Language detection: merges the acoustic hint from the transcriber with
//! lexical evidence from the cleaned text.
//!
//! Script is decisive (Arabic or Tamil codepoints cannot be faked by ASR
//! noise). Otherwise a small cue-token list separates Thanglish from
//! English; the acoustic hint breaks ties and shapes the confidence.

use serde::{Deserialize, Serialize};

/// The language classes the pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ta,
    Thanglish,
    Ar,
    Mixed,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ta => "ta",
            Language::Thanglish => "thanglish",
            Language::Ar => "ar",
            Language::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Some(Language::En),
            "ta" | "tamil" => Some(Language::Ta),
            "thanglish" | "tanglish" => Some(Language::Thanglish),
            "ar" | "arabic" => Some(Language::Ar),
            "mixed" => Some(Language::Mixed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The detector's decision with both contributing signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageDecision {
    pub primary: Language,
    pub confidence: f32,
    /// What the ASR heard, when it reported anything.
    pub acoustic_hint: Option<Language>,
    /// What the text itself looked like.
    pub lexical_hint: Language,
}

impl LanguageDecision {
    /// Whether the Thanglish normalizer should run on this transcript.
    pub fn tamil_leaning(&self) -> bool {
        self.primary == Language::Thanglish
            || (self.primary == Language::Mixed
                && matches!(self.lexical_hint, Language::Thanglish | Language::Ta))
    }
}

/// Romanized-Tamil cue tokens: function words, verb forms, and medical
/// vocabulary that mark Latin-script Tamil. Matched on word boundaries.
const THANGLISH_CUES: &[&str] = &[
    // medical nouns
    "noi", "marunthu", "vali", "kaichal", "kaichel", "sapadu", "mookkadaippu",
    // kinship / person words in consultations
    "peru", "peyar",
    // verbs
    "pannu", "pannalam", "panna", "panren", "eduthukko", "edukkalaam",
    "kudichuko", "irukku", "iruku", "irundha", "varum", "varalam", "aagum",
    // connectors and qualifiers
    "apram", "appram", "adhanala", "konjam", "kammi", "romba", "neraya",
    "naal", "naalu", "udane", "illana", "koodadhu", "rendu", "oru",
    // time of day
    "kaalai", "iravu",
];

/// High-frequency English function words for the "predominantly English"
/// check. Deliberately short: we only need a ratio, not a classifier.
const ENGLISH_CUES: &[&str] = &[
    "the", "you", "have", "has", "is", "are", "take", "with", "your",
    "this", "that", "will", "should", "please", "after", "before",
];

/// Minimum cue tokens before Latin-script text counts as Thanglish.
const MIN_THANGLISH_CUES: usize = 2;

#[derive(Default)]
pub struct LanguageDetector;

impl LanguageDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(
        &self,
        text: &str,
        acoustic_hint: Option<&str>,
        acoustic_confidence: f32,
    ) -> LanguageDecision {
        let acoustic = acoustic_hint.and_then(Language::parse);

        // ── Step 1: script is decisive ──
        let total_chars = text.chars().filter(|c| !c.is_whitespace()).count().max(1);
        let arabic_chars = text.chars().filter(|c| ('\u{0600}'..='\u{06FF}').contains(c)).count();
        let tamil_chars = text.chars().filter(|c| ('\u{0B80}'..='\u{0BFF}').contains(c)).count();

        let arabic_ratio = arabic_chars as f32 / total_chars as f32;
        let tamil_ratio = tamil_chars as f32 / total_chars as f32;

        if arabic_ratio > 0.10 {
            let lexical_conf = (0.6 + arabic_ratio).min(1.0);
            return merged(Language::Ar, lexical_conf, acoustic, acoustic_confidence);
        }
        if tamil_ratio > 0.10 {
            let lexical_conf = (0.6 + tamil_ratio).min(1.0);
            return merged(Language::Ta, lexical_conf, acoustic, acoustic_confidence);
        }

        // ── Step 2: lexical scoring on Latin-script text ──
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let thanglish_hits = words.iter().filter(|w| THANGLISH_CUES.contains(*w)).count();
        let english_hits = words.iter().filter(|w| ENGLISH_CUES.contains(*w)).count();

        let predominantly_english = english_hits >= 3 && english_hits >= thanglish_hits * 2;

        let (lexical, lexical_conf) = if thanglish_hits >= MIN_THANGLISH_CUES && !predominantly_english
        {
            (
                Language::Thanglish,
                (0.6 + thanglish_hits as f32 * 0.05).min(0.95),
            )
        } else {
            // Without positive evidence either way, English is a weak default.
            (Language::En, if predominantly_english { 0.85 } else { 0.55 })
        };

        tracing::debug!(
            thanglish_hits,
            english_hits,
            lexical = %lexical,
            "lexical language scoring"
        );

        merged(lexical, lexical_conf, acoustic, acoustic_confidence)
    }
}

/// Merge lexical and acoustic signals. Confidence is the larger signal,
/// nudged up on agreement and down on disagreement; a low-confidence
/// disagreement becomes `mixed`.
fn merged(
    lexical: Language,
    lexical_conf: f32,
    acoustic: Option<Language>,
    acoustic_conf: f32,
) -> LanguageDecision {
    let base = lexical_conf.max(if acoustic.is_some() { acoustic_conf } else { 0.0 });

    let (primary, confidence) = match acoustic {
        None => (lexical, lexical_conf),
        Some(a) if a == lexical => (lexical, (base + 0.10).min(1.0)),
        // Tamil audio rendered in Latin script IS Thanglish; not a conflict.
        Some(Language::Ta) if lexical == Language::Thanglish => {
            (Language::Thanglish, (base + 0.10).min(1.0))
        }
        Some(a) => {
            if lexical_conf < 0.6 && acoustic_conf < 0.6 {
                (Language::Mixed, base * 0.8)
            } else if acoustic_conf > lexical_conf {
                (a, (acoustic_conf - 0.20).max(0.0))
            } else {
                (lexical, (lexical_conf - 0.20).max(0.0))
            }
        }
    };

    LanguageDecision {
        primary,
        confidence,
        acoustic_hint: acoustic,
        lexical_hint: lexical,
    }
}
