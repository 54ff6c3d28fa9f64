//! Robust recovery of the LLM's JSON payload.
//!
//! Four levels, tried in order: direct parse, code-fence stripping, first
//! balanced `{...}` (with a trailing-comma repair), then give up; the
//! caller returns an empty shell marked failed. Item-level deserialization
//! is lenient: a malformed medicine is dropped with a warning instead of
//! sinking the whole response.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

/// Medicine as the model returns it, before canonicalization.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawMedicine {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dose: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub side_effects: Vec<String>,
}

/// The whole response as returned, every field optional.
#[derive(Debug, Clone, Default)]
pub struct RawPrescription {
    pub patient_name: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub complaints: Vec<String>,
    pub diagnosis: Vec<String>,
    pub medicines: Vec<RawMedicine>,
    pub tests: Vec<String>,
    pub advice: Vec<String>,
    pub follow_up_days: Option<u32>,
}

/// Recover a JSON object from LLM output. `None` when all levels fail.
pub fn recover_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Level 1: the clean case.
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    // Level 2: strip markdown code fences.
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?is)```(?:json)?\s*(.*?)\s*```").expect("fence pattern")
    });
    if let Some(captures) = fence.captures(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(captures[1].trim()) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    // Level 3: first balanced top-level object, with trailing-comma repair.
    if let Some(candidate) = first_balanced_object(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            if value.is_object() {
                return Some(value);
            }
        }
        let repaired = strip_trailing_commas(&candidate);
        if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    None
}

/// Extract the first `{...}` with balanced braces, respecting strings.
fn first_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            if c != '\\' {
                escaped = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + c.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_trailing_commas(json: &str) -> String {
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    let re = TRAILING.get_or_init(|| Regex::new(r",\s*([}\]])").expect("trailing comma pattern"));
    re.replace_all(json, "$1").into_owned()
}

/// Parse LLM output into a `RawPrescription`. Returns `None` only when no
/// JSON object could be recovered at all.
pub fn parse_prescription(text: &str) -> Option<RawPrescription> {
    let value = recover_json(text)?;
    let obj = value.as_object()?;

    let medicines = lenient_array::<RawMedicine>(obj.get("medicines"), "medicine");

    Some(RawPrescription {
        patient_name: string_field(obj.get("patient_name")),
        age: string_field(obj.get("age")),
        gender: string_field(obj.get("gender")),
        complaints: string_array(obj.get("complaints")),
        diagnosis: string_array(obj.get("diagnosis")),
        medicines,
        tests: string_array(obj.get("tests")),
        advice: string_array(obj.get("advice")),
        follow_up_days: obj.get("follow_up_days").and_then(u32_field),
    })
}

/// Accept strings and numbers; anything else is treated as absent.
fn string_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() && s != "null" => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn u32_field(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| string_field(Some(v)))
                .collect()
        })
        .unwrap_or_default()
}

/// Deserialize an array item by item, dropping whatever fails.
fn lenient_array<T: for<'de> Deserialize<'de>>(value: Option<&Value>, kind: &str) -> Vec<T> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match serde_json::from_value::<T>(item.clone()) {
            Ok(parsed) => out.push(parsed),
            Err(e) => {
                tracing::warn!(kind, index = i, error = %e, "dropped item during lenient parse");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = r#"{"patient_name": "John", "complaints": ["fever"], "diagnosis": ["acute pharyngitis"], "medicines": [{"name": "erythromycin", "dose": "500 mg", "frequency": "3 times a day", "duration": "5 days", "instruction": "after food", "route": "oral"}], "tests": [], "advice": ["drink warm fluids"], "follow_up_days": 5}"#;

    #[test]
    fn level1_direct_parse() {
        let p = parse_prescription(CLEAN).unwrap();
        assert_eq!(p.patient_name.as_deref(), Some("John"));
        assert_eq!(p.medicines.len(), 1);
        assert_eq!(p.follow_up_days, Some(5));
    }

    #[test]
    fn level2_fenced_json() {
        let fenced = format!("Here is the extraction:\n```json\n{CLEAN}\n```\nDone.");
        let p = parse_prescription(&fenced).unwrap();
        assert_eq!(p.diagnosis, vec!["acute pharyngitis"]);
    }

    #[test]
    fn level2_uppercase_fence() {
        let fenced = format!("```JSON\n{CLEAN}\n```");
        assert!(parse_prescription(&fenced).is_some());
    }

    #[test]
    fn level3_prefix_text_and_balanced_braces() {
        let noisy = format!("Sure! The patient record follows. {CLEAN} Hope that helps.");
        let p = parse_prescription(&noisy).unwrap();
        assert_eq!(p.medicines[0].name.as_deref(), Some("erythromycin"));
    }

    #[test]
    fn level3_trailing_comma_repaired() {
        let broken = r#"{"patient_name": "Mei", "complaints": ["fever",], "diagnosis": [], "medicines": [], "tests": [], "advice": [],}"#;
        let p = parse_prescription(broken).unwrap();
        assert_eq!(p.patient_name.as_deref(), Some("Mei"));
        assert_eq!(p.complaints, vec!["fever"]);
    }

    #[test]
    fn level4_unrecoverable_returns_none() {
        assert!(parse_prescription("I could not process this transcript.").is_none());
        assert!(parse_prescription("").is_none());
        assert!(parse_prescription("[1, 2, 3]").is_none());
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scanner() {
        let tricky = r#"note {"patient_name": "A{B}", "medicines": []} trailing"#;
        let p = parse_prescription(tricky).unwrap();
        assert_eq!(p.patient_name.as_deref(), Some("A{B}"));
    }

    #[test]
    fn malformed_medicine_dropped_not_fatal() {
        let mixed = r#"{"medicines": [{"name": "paracetamol"}, "not an object", {"name": "cetirizine"}]}"#;
        let p = parse_prescription(mixed).unwrap();
        assert_eq!(p.medicines.len(), 2);
    }

    #[test]
    fn numeric_age_coerced_to_string() {
        let json = r#"{"age": 42, "medicines": []}"#;
        let p = parse_prescription(json).unwrap();
        assert_eq!(p.age.as_deref(), Some("42"));
    }

    #[test]
    fn follow_up_days_from_string() {
        let json = r#"{"follow_up_days": "7", "medicines": []}"#;
        let p = parse_prescription(json).unwrap();
        assert_eq!(p.follow_up_days, Some(7));
    }

    #[test]
    fn null_strings_treated_as_absent() {
        let json = r#"{"patient_name": null, "age": "null", "medicines": []}"#;
        let p = parse_prescription(json).unwrap();
        assert!(p.patient_name.is_none());
        assert!(p.age.is_none());
    }
}
