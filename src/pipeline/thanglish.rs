//! Thanglish → Tamil-script normalization.
//!
//! Runs only when the language decision is Thanglish (or Tamil-leaning
//! mixed). A longest-prefix tokenizer walks the word sequence and replaces
//! known romanized forms (multi-word phrases first) with Tamil script.
//! Out-of-vocabulary tokens pass through unchanged, so English medical
//! terms and drug names survive intact. Deterministic by construction.

/// Romanized form → Tamil script. Multi-word keys are matched before
/// their single-word prefixes by the tokenizer.
const THANGLISH_MAP: &[(&str, &str)] = &[
    // phrases
    ("patient peru", "நோயாளி பெயர்"),
    ("sapadu apram", "சாப்பாடு அப்புறம்"),
    // nouns
    ("noi", "நோய்"),
    ("marunthu", "மருந்து"),
    ("vali", "வலி"),
    ("kaichal", "காய்ச்சல்"),
    ("sapadu", "சாப்பாடு"),
    ("kaalai", "காலை"),
    ("iravu", "இரவு"),
    ("peru", "பெயர்"),
    ("peyar", "பெயர்"),
    ("mookkadaippu", "மூக்கடைப்பு"),
    // numbers
    ("oru", "ஒரு"),
    ("rendu", "இரண்டு"),
    ("moonu", "மூன்று"),
    ("naalu", "நான்கு"),
    // verbs
    ("irukku", "இருக்கு"),
    ("iruku", "இருக்கு"),
    ("irundha", "இருந்தா"),
    ("pannu", "பண்ணு"),
    ("panna", "பண்ண"),
    ("eduthukko", "எடுத்துக்கோ"),
    ("kudichuko", "குடிச்சுக்கோ"),
    ("varum", "வரும்"),
    ("aagum", "ஆகும்"),
    // connectors
    ("apram", "அப்புறம்"),
    ("appram", "அப்புறம்"),
    ("konjam", "கொஞ்சம்"),
    ("romba", "ரொம்ப"),
    ("naal", "நாள்"),
    ("udane", "உடனே"),
];

/// Longest multi-word key length, in words.
const MAX_PHRASE_WORDS: usize = 2;

#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub text: String,
    pub replaced_tokens: usize,
}

#[derive(Default)]
pub struct ThanglishNormalizer;

impl ThanglishNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Map romanized Tamil tokens to Tamil script, longest match first.
    pub fn normalize(&self, text: &str) -> NormalizeOutcome {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut out: Vec<String> = Vec::with_capacity(words.len());
        let mut replaced_tokens = 0;

        let mut i = 0;
        while i < words.len() {
            let mut matched = false;
            // Try the longest phrase window first, shrinking to one word.
            for window in (1..=MAX_PHRASE_WORDS.min(words.len() - i)).rev() {
                let candidate = words[i..i + window]
                    .iter()
                    .map(|w| strip_punct(w))
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                if let Some((_, tamil)) =
                    THANGLISH_MAP.iter().find(|(roman, _)| *roman == candidate)
                {
                    // Keep the trailing punctuation of the last word.
                    let trailing = trailing_punct(words[i + window - 1]);
                    out.push(format!("{tamil}{trailing}"));
                    replaced_tokens += window;
                    i += window;
                    matched = true;
                    break;
                }
            }
            if !matched {
                out.push(words[i].to_string());
                i += 1;
            }
        }

        let result = out.join(" ");
        if replaced_tokens > 0 {
            tracing::info!(replaced_tokens, "thanglish tokens normalized to tamil script");
        }
        NormalizeOutcome {
            text: result,
            replaced_tokens,
        }
    }
}

fn strip_punct(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

fn trailing_punct(word: &str) -> &str {
    let trimmed = word.trim_end_matches(|c: char| !c.is_alphanumeric());
    &word[trimmed.len()..]
}
