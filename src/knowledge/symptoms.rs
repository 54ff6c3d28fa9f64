//! Complaint, diagnosis and test gazetteers used by the rule extractor.

use serde::{Deserialize, Serialize};

/// A keyword-triggered label with a priority (lower = more specific).
/// More specific labels are emitted first.
pub struct TermMapping {
    pub keyword: &'static str,
    pub label: &'static str,
    pub priority: u8,
}

const fn term(keyword: &'static str, label: &'static str, priority: u8) -> TermMapping {
    TermMapping { keyword, label, priority }
}

/// Complaint keywords. Multi-word forms rank above their generic tails.
pub const COMPLAINT_TERMS: &[TermMapping] = &[
    term("difficulty breathing", "difficulty breathing", 1),
    term("difficulty swallowing", "difficulty swallowing", 1),
    term("nasal congestion", "nasal congestion", 1),
    term("throat pain", "throat pain", 2),
    term("headache", "headache", 2),
    term("fever", "fever", 2),
    term("cough", "cough", 2),
    term("vomiting", "vomiting", 2),
    term("diarrhea", "diarrhea", 2),
    term("infection", "infection", 3),
    term("discomfort", "discomfort", 3),
    term("pain", "pain", 4),
    // Tamil-in-Latin-script complaints, already normalized by the cleaner
    term("kaichal", "fever", 2),
    term("vali", "pain", 4),
    term("mookkadaippu", "nasal congestion", 1),
    // Tamil-script complaints (post Thanglish normalization)
    term("காய்ச்சல்", "fever", 2),
    term("வலி", "pain", 4),
    term("மூக்கடைப்பு", "nasal congestion", 1),
    term("இருமல்", "cough", 2),
    // Arabic complaints (native-script transcription)
    term("حمى", "fever", 2),
    term("ألم", "pain", 4),
    term("سعال", "cough", 2),
    term("صداع", "headache", 2),
];

/// Diagnosis keywords, specific conditions before generic ones.
pub const DIAGNOSIS_TERMS: &[TermMapping] = &[
    term("pharyngitis", "acute pharyngitis", 1),
    term("sinusitis", "sinusitis", 1),
    term("bronchitis", "acute bronchitis", 1),
    term("pneumonia", "pneumonia", 1),
    term("otitis", "otitis media", 1),
    term("rhinitis", "allergic rhinitis", 1),
    term("gastritis", "gastritis", 1),
    term("tonsillitis", "tonsillitis", 1),
    term("urinary tract infection", "urinary tract infection", 1),
    term("bacterial throat", "bacterial throat infection", 1),
    term("throat infection", "throat infection", 2),
    term("bacterial infection", "bacterial infection", 2),
    term("viral fever", "viral fever", 2),
    term("asthma", "asthma", 2),
    term("diabetes", "diabetes", 2),
    term("hypertension", "hypertension", 2),
    term("infection", "infection", 3),
    // Arabic: sinusitis appears as التهاب الجيوب الأنفية
    term("التهاب الجيوب", "sinusitis", 1),
    term("التهاب الحلق", "acute pharyngitis", 1),
];

/// Category tag for a recommended test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Lab,
    Imaging,
    Home,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::Lab => "lab",
            TestKind::Imaging => "imaging",
            TestKind::Home => "home",
        }
    }
}

/// Test gazetteer: keyword → (canonical name, category).
pub const TEST_TERMS: &[(&str, &str, TestKind)] = &[
    ("cbc", "complete blood count", TestKind::Lab),
    ("complete blood count", "complete blood count", TestKind::Lab),
    ("crp", "c-reactive protein", TestKind::Lab),
    ("blood sugar", "blood sugar", TestKind::Lab),
    ("blood culture", "blood culture", TestKind::Lab),
    ("nasal swab", "nasal swab culture", TestKind::Lab),
    ("throat swab", "throat swab culture", TestKind::Lab),
    ("urine culture", "urine culture", TestKind::Lab),
    ("x-ray pns", "paranasal sinus x-ray", TestKind::Imaging),
    ("pns x-ray", "paranasal sinus x-ray", TestKind::Imaging),
    ("chest x-ray", "chest x-ray", TestKind::Imaging),
    ("x-ray", "x-ray", TestKind::Imaging),
    ("ct scan", "ct scan", TestKind::Imaging),
    ("ultrasound", "ultrasound", TestKind::Imaging),
    ("temperature monitoring", "temperature monitoring", TestKind::Home),
    ("monitor temperature", "temperature monitoring", TestKind::Home),
    ("blood pressure monitoring", "blood pressure monitoring", TestKind::Home),
];
