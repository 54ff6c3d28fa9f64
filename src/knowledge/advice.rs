//! Advice templates: trigger keywords → canonical advice phrasing.
//!
//! Templates canonicalize phrasing only. The post-processor's evidence gate
//! still decides whether an advice item is anchored in the transcript; a
//! trigger match alone never fabricates advice.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceTemplate {
    /// All trigger keywords must appear in the transcript.
    pub triggers: Vec<String>,
    /// Canonical advice string emitted when triggered.
    pub advice: String,
}

fn template(triggers: &[&str], advice: &str) -> AdviceTemplate {
    AdviceTemplate {
        triggers: triggers.iter().map(|s| s.to_string()).collect(),
        advice: advice.to_string(),
    }
}

pub fn builtin_advice() -> Vec<AdviceTemplate> {
    vec![
        template(&["after food"], "take medicine after food"),
        template(&["complete", "course"], "complete the full course of antibiotics"),
        template(&["warm", "fluids"], "drink plenty of warm fluids"),
        template(&["warm", "water"], "drink warm water"),
        template(&["gargle"], "do warm salt water gargles"),
        template(&["avoid", "cold"], "avoid very cold drinks"),
        template(&["avoid", "spicy"], "avoid spicy food"),
        template(&["avoid", "oily"], "avoid oily food"),
        template(&["rest"], "rest and limit physical exertion"),
        template(&["steam"], "take steam inhalation"),
        template(&["follow", "up"], "come for review follow up"),
        template(&["fever", "persist"], "seek attention if fever persists"),
    ]
}

impl AdviceTemplate {
    /// True if every trigger keyword occurs in `text` (already lowercased).
    pub fn triggered_by(&self, lower_text: &str) -> bool {
        self.triggers.iter().all(|t| lower_text.contains(t.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_triggers_required() {
        let t = template(&["avoid", "spicy"], "avoid spicy food");
        assert!(t.triggered_by("please avoid spicy food for a week"));
        assert!(!t.triggered_by("spicy food is tasty"));
    }

    #[test]
    fn builtin_templates_have_triggers() {
        for t in builtin_advice() {
            assert!(!t.triggers.is_empty());
            assert!(!t.advice.is_empty());
        }
    }
}
