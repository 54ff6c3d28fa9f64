//! Adaptive routing between the LLM and rule extractors.
//!
//! Scores the normalized transcript on length, repetition, medical-keyword
//! density and ASR confidence, then picks LLM-only, Ensemble, or
//! Rules-only. Near-empty transcripts short-circuit straight to rules so
//! no extraction budget is wasted on corrupted audio.

use serde::Serialize;

use crate::knowledge::drugs;

/// Which extraction pipeline handles this transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    LlmOnly,
    Ensemble,
    RulesOnly,
}

impl std::fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RouteDecision::LlmOnly => "llm_only",
            RouteDecision::Ensemble => "ensemble",
            RouteDecision::RulesOnly => "rules_only",
        };
        f.write_str(name)
    }
}

/// Per-route execution budget handed to the extraction stage.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RouteConfig {
    pub retry_budget: u32,
    pub timeout_ms: u64,
}

/// Input measurements feeding the decision, kept for metrics.
#[derive(Debug, Clone, Serialize)]
pub struct InputAnalysis {
    pub word_count: usize,
    pub length_score: f32,
    pub unique_sentence_ratio: f32,
    pub keyword_density: f32,
    pub asr_confidence: f32,
    pub keyword_hits: usize,
    /// Weighted composite in [0, 1].
    pub composite: f32,
}

const LLM_THRESHOLD: f32 = 0.75;
const ENSEMBLE_THRESHOLD: f32 = 0.45;

/// Below this many words the audio is treated as corrupted.
const MIN_USABLE_WORDS: usize = 5;

/// Keyword hits at which density saturates.
const DENSITY_SATURATION: f32 = 8.0;

#[derive(Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, transcript: &str, asr_confidence: f32) -> InputAnalysis {
        let word_count = transcript.split_whitespace().count();
        let length_score = match transcript.chars().count() {
            n if n < 50 => 0.0,
            n if n < 150 => 0.3,
            n if n < 400 => 0.6,
            _ => 1.0,
        };

        let sentences: Vec<String> = transcript
            .split(['.', '!', '?', '؟'])
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        let unique_sentence_ratio = if sentences.is_empty() {
            0.0
        } else {
            let unique: std::collections::HashSet<&String> = sentences.iter().collect();
            unique.len() as f32 / sentences.len() as f32
        };

        let keyword_hits = drugs::medical_keyword_hits(transcript);
        let keyword_density = (keyword_hits as f32 / DENSITY_SATURATION).min(1.0);

        let composite = (length_score * 0.25
            + unique_sentence_ratio * 0.35
            + keyword_density * 0.25
            + asr_confidence.clamp(0.0, 1.0) * 0.15)
            .clamp(0.0, 1.0);

        InputAnalysis {
            word_count,
            length_score,
            unique_sentence_ratio,
            keyword_density,
            asr_confidence,
            keyword_hits,
            composite,
        }
    }

    pub fn select(&self, analysis: &InputAnalysis) -> (RouteDecision, RouteConfig) {
        let route = if analysis.word_count < MIN_USABLE_WORDS {
            tracing::warn!(
                words = analysis.word_count,
                "transcript too sparse, routing to rules without extraction budget"
            );
            RouteDecision::RulesOnly
        } else if analysis.composite >= LLM_THRESHOLD {
            RouteDecision::LlmOnly
        } else if analysis.composite >= ENSEMBLE_THRESHOLD && analysis.keyword_hits > 0 {
            RouteDecision::Ensemble
        } else {
            RouteDecision::RulesOnly
        };

        let config = match route {
            RouteDecision::LlmOnly => RouteConfig {
                retry_budget: 2,
                timeout_ms: 30_000,
            },
            RouteDecision::Ensemble => RouteConfig {
                retry_budget: 1,
                timeout_ms: 20_000,
            },
            RouteDecision::RulesOnly => RouteConfig {
                retry_budget: 0,
                timeout_ms: 5_000,
            },
        };

        tracing::info!(
            route = %route,
            composite = analysis.composite,
            words = analysis.word_count,
            keyword_hits = analysis.keyword_hits,
            "route selected"
        );
        (route, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route_for(text: &str, confidence: f32) -> (RouteDecision, InputAnalysis) {
        let router = Router::new();
        let analysis = router.analyze(text, confidence);
        let (route, _) = router.select(&analysis);
        (route, analysis)
    }

    #[test]
    fn rich_transcript_goes_to_llm() {
        let text = "hello john. you have acute pharyngitis caused by a bacterial infection. \
                    take erythromycin 500 mg three times a day for 5 days after food. \
                    drink plenty of warm fluids and avoid cold drinks. \
                    do a cbc test and come back for review after five days. \
                    watch for side effects like nausea. rest your voice as much as possible.";
        let (route, analysis) = route_for(text, 0.92);
        assert!(analysis.composite >= 0.75, "composite was {}", analysis.composite);
        assert_eq!(route, RouteDecision::LlmOnly);
    }

    #[test]
    fn medium_transcript_goes_to_ensemble() {
        let text = "hello john. you have acute pharyngitis. take erythromycin 500 mg \
                    3 times a day for 5 days. drink warm fluids.";
        let (route, analysis) = route_for(text, 0.92);
        assert!(analysis.composite >= ENSEMBLE_THRESHOLD);
        assert!(analysis.keyword_hits > 0);
        assert!(matches!(route, RouteDecision::Ensemble | RouteDecision::LlmOnly));
    }

    #[test]
    fn short_keywordless_transcript_goes_to_rules() {
        let (route, analysis) = route_for("i am not feeling so great", 0.9);
        assert_eq!(analysis.keyword_hits, 0);
        assert_eq!(route, RouteDecision::RulesOnly);
    }

    #[test]
    fn near_empty_transcript_short_circuits() {
        let (route, analysis) = route_for("uh okay", 0.9);
        assert!(analysis.word_count < MIN_USABLE_WORDS);
        assert_eq!(route, RouteDecision::RulesOnly);
    }

    #[test]
    fn repeated_sentences_lower_the_score() {
        let repeated = "take the medicine. take the medicine. take the medicine. take the medicine.";
        let varied = "take the medicine. drink warm fluids. rest well. come back in five days.";
        let router = Router::new();
        let a = router.analyze(repeated, 0.9);
        let b = router.analyze(varied, 0.9);
        assert!(a.unique_sentence_ratio < b.unique_sentence_ratio);
        assert!(a.composite < b.composite);
    }

    #[test]
    fn llm_route_gets_the_largest_budget() {
        let router = Router::new();
        let rich = router.analyze(
            "hello john. you have acute pharyngitis caused by bacterial infection. \
             take erythromycin 500 mg three times a day for 5 days after food. \
             drink plenty of warm fluids. avoid cold drinks. do a cbc test. \
             come for review after 5 days. rest your voice.",
            0.95,
        );
        let (route, config) = router.select(&rich);
        assert_eq!(route, RouteDecision::LlmOnly);
        assert!(config.retry_budget >= 2);
        assert!(config.timeout_ms >= 20_000);
    }

    #[test]
    fn ensemble_requires_a_medical_keyword() {
        // Long, varied, confident, but nothing medical in it.
        let text = "the weather is lovely today. we walked along the beach for an hour. \
                    then we had lunch at the little cafe near the harbour. it was busy. \
                    afterwards we drove home and watched a film together in the evening.";
        let (route, analysis) = route_for(text, 0.95);
        assert_eq!(analysis.keyword_hits, 0);
        assert_eq!(route, RouteDecision::RulesOnly);
    }
}
