//! Pattern and gazetteer extraction: the always-available fallback.
//!
//! Builds its patterns from the knowledge base at construction and never
//! fails; the worst case is an empty prescription. Name patterns cover
//! English greetings, Thanglish "patient peru/peyar" (Latin or Tamil
//! script) and Arabic greetings over the native-script transcription.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;

use crate::knowledge::symptoms::{TermMapping, COMPLAINT_TERMS, DIAGNOSIS_TERMS, TEST_TERMS};
use crate::knowledge::{routes, KnowledgeBase, Route, TestKind};
use crate::pipeline::language::LanguageDecision;

use super::types::{push_unique, ExtractionMethod, Medicine, Prescription, RecommendedTest};
use super::{ExtractionError, Extractor};

/// Words the loose name patterns capture but can never be names. The
/// "patient <word>" pattern has an optional connector, so plain function
/// words land here constantly ("patient has", "patient is going").
const NAME_STOPWORDS: &[&str] = &[
    "today", "tomorrow", "yesterday", "now", "then", "there", "doctor", "sir",
    "madam", "you", "your", "everyone", "all", "the", "a", "is", "has", "have",
    "been", "was", "will", "going", "get", "gets", "came", "come", "complains",
    "complained", "reports", "needs", "should", "must", "may", "can", "here",
];

/// Multilingual patient-name patterns, most structurally specific first.
/// Shared with the post-processor's name repair pass.
fn name_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // "patient peru Karuppan" / "patient peyar Karuppan"
            r"(?i)patient\s+(?:peru|peyar)\s+([\p{L}]+)",
            // Tamil script rendering after Thanglish normalization
            r"நோயாளி\s+பெயர்\s+([\p{L}]+)",
            // "patient named John", "patient is John", "patient John"
            r"(?i)patient\s+(?:named\s+|is\s+|name\s+is\s+)?([a-z]+)",
            // "hello John", "hi Mei"
            r"(?i)\b(?:hi|hello|greetings)[\s,]+([\p{L}]+)",
            // Arabic greeting: "مرحباً فاطمة"
            r"(?:مرحبا|مرحباً|أهلاً|اهلاً)\s+([\p{Arabic}]+)",
            // "name is John"
            r"(?i)\bname\s+is\s+([a-z]+)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("builtin name pattern"))
        .collect()
    })
}

/// Find a patient name via the multilingual greeting patterns, rejecting
/// clinical terms and stopwords. Empty string when nothing matched.
pub fn extract_patient_name(kb: &KnowledgeBase, text: &str) -> String {
    for pattern in name_patterns() {
        for captures in pattern.captures_iter(text) {
            let candidate = captures[1].trim();
            let lower = candidate.to_lowercase();
            if candidate.chars().count() < 2 {
                continue;
            }
            if NAME_STOPWORDS.contains(&lower.as_str()) || kb.is_clinical_term(&lower) {
                continue;
            }
            return capitalize(candidate);
        }
    }
    String::new()
}

pub struct RuleExtractor {
    kb: Arc<KnowledgeBase>,
    drug_pattern: Regex,
}

impl RuleExtractor {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        // All gazetteer names in one alternation, longest first so
        // multi-word names win at a shared prefix.
        let mut names: Vec<String> = Vec::new();
        for drug in kb.drugs() {
            names.push(drug.generic.clone());
            names.extend(drug.aliases.iter().cloned());
            names.extend(drug.brands.iter().cloned());
            names.extend(drug.transliterations.iter().cloned());
        }
        names.sort_by_key(|n| std::cmp::Reverse(n.len()));
        let alternation = names
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|");
        let drug_pattern =
            Regex::new(&format!(r"(?i)\b({alternation})\b")).expect("drug alternation pattern");

        Self { kb, drug_pattern }
    }

    fn extract_by_terms(terms: &[TermMapping], text: &str, limit: usize) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut found: Vec<(&str, u8)> = Vec::new();
        for mapping in terms {
            if lower.contains(mapping.keyword) && !found.iter().any(|(l, _)| *l == mapping.label) {
                found.push((mapping.label, mapping.priority));
            }
        }
        found.sort_by_key(|(_, priority)| *priority);
        found
            .into_iter()
            .take(limit)
            .map(|(label, _)| label.to_string())
            .collect()
    }

    fn extract_medicines(&self, text: &str) -> Vec<Medicine> {
        let mut medicines: Vec<Medicine> = Vec::new();

        for found in self.drug_pattern.find_iter(text) {
            let Some(canonical) = self.kb.canonical_name(found.as_str()) else {
                continue;
            };
            if medicines.iter().any(|m| m.name == canonical) {
                continue;
            }

            // Sliding window after the drug mention: dose, frequency,
            // duration and instruction are all optional, in any order.
            let window: String = text[found.end()..].chars().take(120).collect();
            let full_context: String = {
                let before_start = found.start().saturating_sub(40);
                // Clamp back to a char boundary.
                let mut start = before_start;
                while !text.is_char_boundary(start) {
                    start -= 1;
                }
                text[start..found.end()].chars().chain(window.chars()).collect()
            };

            let medicine = Medicine {
                name: canonical.to_string(),
                dose: find_dose(&window),
                frequency: find_frequency(&window).unwrap_or_default(),
                duration: find_duration(&window).unwrap_or_default(),
                instruction: find_instruction(&window).unwrap_or_default(),
                route: routes::route_for_form(&full_context)
                    .map(|(_, route)| route)
                    .unwrap_or(Route::Oral),
                side_effects: Vec::new(),
            };
            medicines.push(medicine);
        }

        medicines
    }

    fn extract_tests(&self, text: &str) -> Vec<RecommendedTest> {
        let lower = text.to_lowercase();
        let mut tests: Vec<RecommendedTest> = Vec::new();
        for (keyword, canonical, kind) in TEST_TERMS {
            if !lower.contains(keyword) {
                continue;
            }
            // A generic keyword ("x-ray") must not duplicate a more
            // specific hit already recorded ("paranasal sinus x-ray").
            let duplicate = tests
                .iter()
                .any(|t| t.name.contains(canonical) || canonical.contains(t.name.as_str()));
            if !duplicate {
                tests.push(RecommendedTest {
                    name: canonical.to_string(),
                    kind: *kind,
                });
            }
        }
        tests
    }

    fn extract_advice(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut advice = Vec::new();
        for template in self.kb.advice_templates() {
            if template.triggered_by(&lower) {
                push_unique(&mut advice, template.advice.clone());
            }
        }
        advice
    }

    fn extract_follow_up(&self, text: &str) -> Option<u32> {
        static FOLLOW_UP: OnceLock<Regex> = OnceLock::new();
        let re = FOLLOW_UP.get_or_init(|| {
            Regex::new(r"(?i)(?:follow\s*up|review|come\s+back)[^.]*?(\d+)\s+days?")
                .expect("follow-up pattern")
        });
        re.captures(text)?.get(1)?.as_str().parse().ok()
    }
}

impl Extractor for RuleExtractor {
    fn extract(
        &self,
        transcript: &str,
        language: &LanguageDecision,
    ) -> Result<Prescription, ExtractionError> {
        let mut p = Prescription::empty(ExtractionMethod::Rules);
        p.language = language.primary;
        p.patient_name = extract_patient_name(&self.kb, transcript);
        p.complaints = Self::extract_by_terms(COMPLAINT_TERMS, transcript, 5);
        p.diagnosis = Self::extract_by_terms(DIAGNOSIS_TERMS, transcript, 5);
        p.medicines = self.extract_medicines(transcript);
        p.tests = self.extract_tests(transcript);
        p.advice = self.extract_advice(transcript);
        p.follow_up_days = self.extract_follow_up(transcript);
        p.confidence = if p.is_empty_shell() { 0.3 } else { 0.6 };

        tracing::info!(
            medicines = p.medicines.len(),
            diagnoses = p.diagnosis.len(),
            "rule extraction complete"
        );
        Ok(p)
    }
}

/// Classify a test name into lab/imaging/home. Known keywords hit the
/// gazetteer; unknown names fall back to a keyword heuristic.
pub fn tag_test(name: &str) -> Option<RecommendedTest> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    for (keyword, canonical, kind) in TEST_TERMS {
        if lower.contains(keyword) {
            return Some(RecommendedTest {
                name: canonical.to_string(),
                kind: *kind,
            });
        }
    }
    let kind = if ["x-ray", "xray", "scan", "ultrasound", "mri", "imaging"]
        .iter()
        .any(|k| lower.contains(k))
    {
        TestKind::Imaging
    } else if lower.contains("home") || lower.contains("monitor") {
        TestKind::Home
    } else {
        TestKind::Lab
    };
    Some(RecommendedTest {
        name: lower,
        kind,
    })
}

fn find_dose(window: &str) -> Option<String> {
    static DOSE: OnceLock<Regex> = OnceLock::new();
    let re = DOSE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(mg|ml|mcg|g|iu)\b").expect("dose pattern")
    });
    let captures = re.captures(window)?;
    Some(format!(
        "{} {}",
        &captures[1],
        captures[2].to_lowercase()
    ))
}

fn find_frequency(window: &str) -> Option<String> {
    static FREQ: OnceLock<Regex> = OnceLock::new();
    let re = FREQ.get_or_init(|| {
        Regex::new(
            r"(?i)\b(once daily|twice daily|\d+ times a day|once at night|as needed|every \d+ hours)\b",
        )
        .expect("frequency pattern")
    });
    Some(re.find(window)?.as_str().to_lowercase())
}

fn find_duration(window: &str) -> Option<String> {
    static DURATION: OnceLock<Regex> = OnceLock::new();
    let re = DURATION.get_or_init(|| {
        Regex::new(r"(?i)\b(\d+)\s+(days?|weeks?)\b").expect("duration pattern")
    });
    let captures = re.captures(window)?;
    Some(format!("{} {}", &captures[1], captures[2].to_lowercase()))
}

fn find_instruction(window: &str) -> Option<String> {
    static INSTRUCTION: OnceLock<Regex> = OnceLock::new();
    let re = INSTRUCTION.get_or_init(|| {
        Regex::new(r"(?i)\b(after food|before food|with food|at night|before sleep|empty stomach)\b")
            .expect("instruction pattern")
    });
    Some(re.find(window)?.as_str().to_lowercase())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
