//! Medical knowledge base: process-lifetime reference tables.
//!
//! Loaded once at startup and shared read-only across invocations. The
//! drug gazetteer is mandatory; every other table degrades to a no-op when
//! empty. Tables are independent, keyed by canonical strings; lookups are
//! indirect, no object graph.

pub mod advice;
pub mod anatomy;
pub mod corrections;
pub mod drugs;
pub mod frequency;
pub mod interactions;
pub mod routes;
pub mod symptoms;

pub use advice::AdviceTemplate;
pub use anatomy::AnatomyRule;
pub use corrections::{Correction, CorrectionKind};
pub use drugs::DrugEntry;
pub use interactions::DangerousPair;
pub use routes::Route;
pub use symptoms::TestKind;

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("drug gazetteer missing or empty at {0}")]
    MissingGazetteer(String),

    #[error("invalid correction pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("failed to parse knowledge table {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loadable form of a correction (JSON override files).
#[derive(Debug, Clone, Deserialize)]
struct CorrectionSpec {
    pattern: String,
    replacement: String,
}

/// The assembled knowledge base.
#[derive(Debug)]
pub struct KnowledgeBase {
    drugs: Vec<DrugEntry>,
    /// Lowercased generic/alias/brand/transliteration → index into `drugs`.
    name_index: HashMap<String, usize>,
    corrections: Vec<Correction>,
    anatomy: Vec<AnatomyRule>,
    advice: Vec<AdviceTemplate>,
    interactions: Vec<DangerousPair>,
}

impl KnowledgeBase {
    /// Build from the compiled-in tables.
    pub fn builtin() -> Self {
        Self::assemble(
            drugs::builtin_drugs(),
            corrections::compile_phonetic(),
            anatomy::builtin_anatomy(),
            advice::builtin_advice(),
            interactions::builtin_interactions(),
        )
    }

    /// Load from an override directory. `drugs.json` is required; the other
    /// tables fall back to the builtins when absent.
    pub fn from_dir(dir: &Path) -> Result<Self, KnowledgeError> {
        let drugs_path = dir.join("drugs.json");
        if !drugs_path.exists() {
            return Err(KnowledgeError::MissingGazetteer(drugs_path.display().to_string()));
        }
        let drugs: Vec<DrugEntry> = read_table(&drugs_path)?;
        if drugs.is_empty() {
            return Err(KnowledgeError::MissingGazetteer(drugs_path.display().to_string()));
        }

        let mut phonetic = corrections::compile_phonetic();
        let extra_path = dir.join("corrections.json");
        if extra_path.exists() {
            let specs: Vec<CorrectionSpec> = read_table(&extra_path)?;
            for spec in specs {
                let correction =
                    Correction::new(&spec.pattern, &spec.replacement, CorrectionKind::Phonetic)
                        .map_err(|source| KnowledgeError::InvalidPattern {
                            pattern: spec.pattern.clone(),
                            source,
                        })?;
                phonetic.push(correction);
            }
        }

        let anatomy = read_optional(dir.join("anatomy.json"), anatomy::builtin_anatomy)?;
        let advice = read_optional(dir.join("advice.json"), advice::builtin_advice)?;
        let interactions =
            read_optional(dir.join("interactions.json"), interactions::builtin_interactions)?;

        tracing::info!(
            drugs = drugs.len(),
            corrections = phonetic.len(),
            dir = %dir.display(),
            "knowledge base loaded from override directory"
        );
        Ok(Self::assemble(drugs, phonetic, anatomy, advice, interactions))
    }

    fn assemble(
        drugs: Vec<DrugEntry>,
        mut corrections: Vec<Correction>,
        anatomy: Vec<AnatomyRule>,
        advice: Vec<AdviceTemplate>,
        interactions: Vec<DangerousPair>,
    ) -> Self {
        // Brand and transliteration substitutions come from the gazetteer so
        // the tables can never drift apart. Brands before transliterations.
        for drug in &drugs {
            for brand in &drug.brands {
                if let Ok(c) =
                    corrections::term_correction(brand, &drug.generic, CorrectionKind::Brand)
                {
                    corrections.push(c);
                }
            }
            for translit in &drug.transliterations {
                if let Ok(c) = corrections::term_correction(
                    translit,
                    &drug.generic,
                    CorrectionKind::Transliteration,
                ) {
                    corrections.push(c);
                }
            }
        }

        let mut name_index = HashMap::new();
        for (i, drug) in drugs.iter().enumerate() {
            name_index.insert(drug.generic.to_lowercase(), i);
            for name in drug
                .aliases
                .iter()
                .chain(drug.brands.iter())
                .chain(drug.transliterations.iter())
            {
                name_index.entry(name.to_lowercase()).or_insert(i);
            }
        }

        Self {
            drugs,
            name_index,
            corrections,
            anatomy,
            advice,
            interactions,
        }
    }

    // ── Lookups ───────────────────────────────────────────────────────

    pub fn drugs(&self) -> &[DrugEntry] {
        &self.drugs
    }

    /// Resolve any known name (generic, alias, brand, transliteration) to
    /// its gazetteer entry.
    pub fn resolve_drug(&self, name: &str) -> Option<&DrugEntry> {
        self.name_index
            .get(&name.trim().to_lowercase())
            .map(|&i| &self.drugs[i])
    }

    /// Canonical generic for any known name.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.resolve_drug(name).map(|d| d.generic.as_str())
    }

    /// Closest generic by normalized edit similarity, if it clears `floor`.
    pub fn fuzzy_drug(&self, name: &str, floor: f64) -> Option<(&str, f64)> {
        let lower = name.trim().to_lowercase();
        if lower.len() < 3 {
            return None;
        }
        let mut best: Option<(&str, f64)> = None;
        for drug in &self.drugs {
            let sim = similarity(&lower, &drug.generic);
            if sim >= floor && best.map_or(true, |(_, b)| sim > b) {
                best = Some((drug.generic.as_str(), sim));
            }
        }
        best
    }

    /// Allowed frequency set for a canonical generic. Empty slice = any.
    pub fn allowed_frequencies(&self, generic: &str) -> &[String] {
        self.resolve_drug(generic)
            .map(|d| d.allowed_frequencies.as_slice())
            .unwrap_or(&[])
    }

    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }

    pub fn anatomy_rules(&self) -> &[AnatomyRule] {
        &self.anatomy
    }

    pub fn advice_templates(&self) -> &[AdviceTemplate] {
        &self.advice
    }

    pub fn dangerous_pairs(&self) -> &[DangerousPair] {
        &self.interactions
    }

    /// True if `word` is a symptom or drug token, used to reject bogus
    /// patient-name candidates.
    pub fn is_clinical_term(&self, word: &str) -> bool {
        let lower = word.trim().to_lowercase();
        if self.name_index.contains_key(&lower) {
            return true;
        }
        symptoms::COMPLAINT_TERMS
            .iter()
            .any(|t| t.keyword == lower || t.label == lower)
            || symptoms::DIAGNOSIS_TERMS
                .iter()
                .any(|t| t.keyword == lower || t.label == lower)
    }
}

fn read_table<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, KnowledgeError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|source| KnowledgeError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn read_optional<T: serde::de::DeserializeOwned>(
    path: std::path::PathBuf,
    fallback: fn() -> T,
) -> Result<T, KnowledgeError> {
    if path.exists() {
        read_table(&path)
    } else {
        Ok(fallback())
    }
}

/// Normalized edit similarity in [0, 1]: 1.0 is an exact match.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / max_len as f64
}

/// Levenshtein distance over chars, two-row formulation.
pub fn edit_distance(a: &str, b: &str) -> u32 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (m, n) = (a_chars.len(), b_chars.len());
    if m == 0 {
        return n as u32;
    }
    if n == 0 {
        return m as u32;
    }

    let mut prev: Vec<u32> = (0..=n as u32).collect();
    let mut curr = vec![0u32; n + 1];
    for (i, &a_ch) in a_chars.iter().enumerate() {
        curr[0] = (i + 1) as u32;
        for (j, &b_ch) in b_chars.iter().enumerate() {
            let cost = u32::from(a_ch != b_ch);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}
