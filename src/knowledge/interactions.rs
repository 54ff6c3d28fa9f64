//! Dangerous drug combinations. Unordered pairs of canonical generics;
//! a hit is surfaced as a validation warning, never a hard failure.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DangerousPair {
    pub first: String,
    pub second: String,
    pub reason: String,
}

fn pair(first: &str, second: &str, reason: &str) -> DangerousPair {
    DangerousPair {
        first: first.to_string(),
        second: second.to_string(),
        reason: reason.to_string(),
    }
}

pub fn builtin_interactions() -> Vec<DangerousPair> {
    vec![
        pair("aspirin", "ibuprofen", "both are NSAIDs - avoid together"),
        pair("ibuprofen", "diclofenac", "both are NSAIDs - avoid together"),
        pair("metoprolol", "verapamil", "both lower heart rate - high risk"),
        pair("atorvastatin", "simvastatin", "both are statins - avoid together"),
        pair("lisinopril", "potassium", "risk of hyperkalemia - monitor"),
        pair("warfarin", "aspirin", "increased bleeding risk"),
        pair("fluconazole", "cisapride", "risk of QT prolongation"),
    ]
}

impl DangerousPair {
    /// Unordered match against two canonical names.
    pub fn matches(&self, a: &str, b: &str) -> bool {
        (self.first == a && self.second == b) || (self.first == b && self.second == a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_match_is_unordered() {
        let p = pair("aspirin", "ibuprofen", "nsaids");
        assert!(p.matches("aspirin", "ibuprofen"));
        assert!(p.matches("ibuprofen", "aspirin"));
        assert!(!p.matches("aspirin", "paracetamol"));
    }
}
