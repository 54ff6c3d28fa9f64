//! Canonical dosing frequencies.
//!
//! Every frequency phrase in a finished prescription is one of these forms
//! (or an `every N hours` instance). The list is ordered by how commonly the
//! schedule is prescribed; the frequency-legality repair uses that order to
//! break ties.

/// Canonical frequency phrases, most common first.
pub const CANONICAL: &[&str] = &[
    "once daily",
    "twice daily",
    "3 times a day",
    "4 times a day",
    "once at night",
    "as needed",
];

/// True if `phrase` is a canonical frequency, including `every N hours`.
pub fn is_canonical(phrase: &str) -> bool {
    let trimmed = phrase.trim();
    if CANONICAL.contains(&trimmed) {
        return true;
    }
    parse_every_hours(trimmed).is_some()
}

/// Parse an `every N hours` phrase; returns the interval in hours.
pub fn parse_every_hours(phrase: &str) -> Option<u32> {
    let rest = phrase.trim().strip_prefix("every ")?;
    let rest = rest.strip_suffix(" hours").or_else(|| rest.strip_suffix(" hour"))?;
    rest.trim().parse().ok()
}

/// Rank of a frequency by commonness; unknown phrases sort last.
pub fn commonness_rank(phrase: &str) -> usize {
    CANONICAL
        .iter()
        .position(|c| *c == phrase.trim())
        .unwrap_or(CANONICAL.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_phrases_recognized() {
        for phrase in CANONICAL {
            assert!(is_canonical(phrase), "{phrase} should be canonical");
        }
    }

    #[test]
    fn every_n_hours_is_canonical() {
        assert!(is_canonical("every 8 hours"));
        assert!(is_canonical("every 6 hours"));
        assert_eq!(parse_every_hours("every 8 hours"), Some(8));
    }

    #[test]
    fn free_text_is_not_canonical() {
        assert!(!is_canonical("morning and night"));
        assert!(!is_canonical("daily 3 murai"));
        assert!(!is_canonical("every blue moon"));
    }

    #[test]
    fn once_daily_is_most_common() {
        assert!(commonness_rank("once daily") < commonness_rank("once at night"));
        assert_eq!(commonness_rank("not a frequency"), CANONICAL.len());
    }
}
