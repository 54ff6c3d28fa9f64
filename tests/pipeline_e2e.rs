//! End-to-end pipeline scenarios over mock ASR and LLM collaborators.

use std::sync::Arc;

use medscribe::asr::client::{mock_response, AsrResponse, MockAsrClient};
use medscribe::asr::{AudioInput, TieredTranscriber, TranscriptionError};
use medscribe::extraction::{ExtractionMethod, LlmError, LlmExtractor, MockLlmClient};
use medscribe::knowledge::{KnowledgeBase, Route, TestKind};
use medscribe::pipeline::PipelineError;
use medscribe::{CancelToken, Language, PipelineOptions, PrescriptionPipeline};

fn pipeline(
    asr_script: Vec<Result<AsrResponse, TranscriptionError>>,
    llm_script: Option<Vec<Result<String, LlmError>>>,
) -> PrescriptionPipeline {
    let kb = Arc::new(KnowledgeBase::builtin());
    let transcriber = TieredTranscriber::new(
        Arc::new(MockAsrClient::new(asr_script)),
        "whisper-base",
        "whisper-medium",
    );
    let llm = llm_script.map(|script| {
        LlmExtractor::new(
            Box::new(MockLlmClient::new(script)),
            vec!["mock-model".into()],
            Arc::clone(&kb),
        )
        .with_backoff_base_ms(1)
    });
    PrescriptionPipeline::new(kb, transcriber, llm)
}

fn run(
    p: &PrescriptionPipeline,
    options: &PipelineOptions,
) -> Result<medscribe::PipelineOutcome, PipelineError> {
    p.process(
        &AudioInput::from_bytes(vec![1, 2, 3], "audio/wav"),
        options,
        &CancelToken::new(),
    )
}

// ── Scenario 1: English consultation, ensemble extraction ──

#[test]
fn english_pharyngitis_consultation() {
    let transcript = "Hello John. You have acute pharyngitis. Take erythromycin 500 mg \
                      three times a day for 5 days. Drink warm fluids.";
    // The LLM misspells the name; the greeting pattern must win the merge.
    let llm_json = r#"{"patient_name": "Jhon", "age": null, "gender": null,
        "complaints": ["throat pain"], "diagnosis": ["acute pharyngitis"],
        "medicines": [{"name": "erythromycin", "dose": "500 mg", "frequency": "3 times a day",
                       "duration": "5 days", "instruction": "", "route": "oral"}],
        "tests": [], "advice": ["drink warm fluids"], "follow_up_days": null}"#;

    let p = pipeline(
        vec![Ok(mock_response(transcript, "en", 30.0))],
        Some(vec![Ok(llm_json.into())]),
    );
    let outcome = run(&p, &PipelineOptions::default()).unwrap();
    let rx = &outcome.prescription;

    assert_eq!(rx.patient_name, "John");
    assert_eq!(rx.diagnosis, vec!["acute pharyngitis"]);
    assert_eq!(rx.medicines.len(), 1);
    let med = &rx.medicines[0];
    assert_eq!(med.name, "erythromycin");
    assert_eq!(med.dose.as_deref(), Some("500 mg"));
    assert_eq!(med.frequency, "3 times a day");
    assert_eq!(med.duration, "5 days");
    assert_eq!(med.route, Route::Oral);
    assert!(rx.advice.iter().any(|a| a.contains("warm fluids")));
    assert!(matches!(
        rx.extraction_method,
        ExtractionMethod::Llm | ExtractionMethod::Ensemble
    ));
    assert!(outcome.report.valid);
}

// ── Scenario 2: Thanglish consultation ──

#[test]
fn thanglish_consultation_normalized() {
    let transcript =
        "patient peru Karuppan, kaichel iruku, paracetamol 500 mg morning and night, 3 days.";
    let llm_json = r#"{"patient_name": "Karuppan", "age": null, "gender": null,
        "complaints": ["fever"], "diagnosis": [],
        "medicines": [{"name": "paracetamol", "dose": "500 mg", "frequency": "twice daily",
                       "duration": "3 days", "instruction": "", "route": "oral"}],
        "tests": [], "advice": [], "follow_up_days": null}"#;

    let p = pipeline(
        vec![Ok(mock_response(transcript, "ta", 20.0))],
        Some(vec![Ok(llm_json.into())]),
    );
    let outcome = run(&p, &PipelineOptions::default()).unwrap();
    let rx = &outcome.prescription;

    assert_eq!(rx.language, Language::Thanglish);
    assert_eq!(rx.patient_name, "Karuppan");
    assert!(rx.complaints.contains(&"fever".to_string()));
    let med = &rx.medicines[0];
    assert_eq!(med.name, "paracetamol");
    assert_eq!(med.dose.as_deref(), Some("500 mg"));
    assert_eq!(med.frequency, "twice daily");
    assert_eq!(med.duration, "3 days");
    assert_eq!(med.route, Route::Oral);
}

// ── Scenario 3: Arabic consultation, transcribed natively ──

#[test]
fn arabic_consultation_keeps_allowed_frequency() {
    let transcript = "مرحباً فاطمة، لديها التهاب الجيوب الأنفية. \
                      خذي levocetirizine 5 mg مرة في الليل لمدة 10 أيام.";
    let llm_json = r#"{"patient_name": "فاطمة", "age": null, "gender": null,
        "complaints": [], "diagnosis": ["sinusitis"],
        "medicines": [{"name": "levocetirizine", "dose": "5 mg", "frequency": "once at night",
                       "duration": "10 days", "instruction": "", "route": "oral"}],
        "tests": [], "advice": [], "follow_up_days": null}"#;

    let p = pipeline(
        vec![Ok(mock_response(transcript, "ar", 20.0))],
        Some(vec![Ok(llm_json.into())]),
    );
    let outcome = run(&p, &PipelineOptions::default()).unwrap();
    let rx = &outcome.prescription;

    assert_eq!(rx.language, Language::Ar);
    assert_eq!(rx.patient_name, "فاطمة");
    assert_eq!(rx.diagnosis, vec!["sinusitis"]);
    let med = &rx.medicines[0];
    assert_eq!(med.name, "levocetirizine");
    assert_eq!(med.dose.as_deref(), Some("5 mg"));
    // "once at night" is legal for levocetirizine: no rewrite, no warning.
    assert_eq!(med.frequency, "once at night");
    assert_eq!(med.duration, "10 days");
    assert!(!rx.warnings.iter().any(|w| w.contains("frequency corrected")));
    assert!(!rx.warnings.iter().any(|w| w.contains("anatomy")));
    assert!(!rx.diagnosis.iter().any(|d| d.contains("pulmonary")));
}

// ── Scenario 4: brand substitution without fuzzy duplication ──

#[test]
fn brand_name_not_duplicated_by_fuzzy_matching() {
    let transcript = "stayhappi nitrofurantoin tablet 100 mg twice daily 5 days";
    let llm_json = r#"{"patient_name": null, "age": null, "gender": null,
        "complaints": [], "diagnosis": [],
        "medicines": [{"name": "nitrofurantoin tablet", "dose": "100 mg",
                       "frequency": "twice daily", "duration": "5 days",
                       "instruction": "", "route": "oral"}],
        "tests": [], "advice": [], "follow_up_days": null}"#;

    let p = pipeline(
        vec![Ok(mock_response(transcript, "en", 15.0))],
        Some(vec![Ok(llm_json.into())]),
    );
    let outcome = run(&p, &PipelineOptions::default()).unwrap();
    let rx = &outcome.prescription;

    assert_eq!(rx.medicines.len(), 1, "brand and generic must merge to one entry");
    let med = &rx.medicines[0];
    assert_eq!(med.name, "nitrofurantoin");
    assert_eq!(med.dose.as_deref(), Some("100 mg"));
    assert_eq!(med.frequency, "twice daily");
    assert_eq!(med.duration, "5 days");
    assert_eq!(med.route, Route::Oral);
}

// ── Scenario 5: hallucinated advice dropped by the evidence gate ──

#[test]
fn hallucinated_advice_dropped() {
    let transcript = "hello maya. you have a throat infection. take amoxicillin 500 mg \
                      3 times a day for 5 days. drink warm fluids.";
    let llm_json = r#"{"patient_name": "Maya", "age": null, "gender": null,
        "complaints": [], "diagnosis": ["throat infection"],
        "medicines": [{"name": "amoxicillin", "dose": "500 mg", "frequency": "3 times a day",
                       "duration": "5 days", "instruction": "", "route": "oral"}],
        "tests": [],
        "advice": ["drink warm fluids", "apply mustard oil on chest every morning"],
        "follow_up_days": null}"#;

    let p = pipeline(
        vec![Ok(mock_response(transcript, "en", 25.0))],
        Some(vec![Ok(llm_json.into())]),
    );
    let outcome = run(&p, &PipelineOptions::default()).unwrap();
    let rx = &outcome.prescription;

    assert!(rx.advice.iter().any(|a| a.contains("warm fluids")));
    assert!(!rx.advice.iter().any(|a| a.contains("mustard oil")));
    assert!(rx
        .warnings
        .iter()
        .any(|w| w == "advice dropped: apply mustard oil on chest every morning"));
}

// ── Scenario 6: sparse input routed to rules, fails validation ──

#[test]
fn sparse_input_fails_validation_gracefully() {
    let transcript = "okay thank you see you soon";
    let p = pipeline(
        vec![
            Ok(mock_response(transcript, "en", 60.0)),
            Ok(mock_response(transcript, "en", 60.0)),
        ],
        Some(vec![Ok("{}".into())]),
    );
    let outcome = run(&p, &PipelineOptions::default()).unwrap();

    assert_eq!(outcome.metrics.route, "rules_only");
    assert!(outcome.prescription.medicines.is_empty());
    assert!(!outcome.report.valid);
    assert!(outcome
        .report
        .errors
        .contains(&"at-least-one-medicine-required".to_string()));
}

// ── Boundary cases ──

#[test]
fn empty_transcript_is_a_transcription_error() {
    let p = pipeline(
        vec![
            Ok(mock_response("", "en", 10.0)),
            Ok(mock_response("", "en", 10.0)),
        ],
        None,
    );
    let err = run(&p, &PipelineOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Transcription(TranscriptionError::AllTiersFailed)
    ));
}

#[test]
fn numeric_free_dose_kept_with_null_dose() {
    let transcript = "take paracetamol once daily after meals please";
    let p = pipeline(vec![Ok(mock_response(transcript, "en", 15.0))], None);
    let options = PipelineOptions {
        llm_enabled: false,
        ..Default::default()
    };
    let outcome = run(&p, &options).unwrap();
    let rx = &outcome.prescription;

    assert_eq!(rx.medicines.len(), 1);
    assert_eq!(rx.medicines[0].name, "paracetamol");
    assert!(rx.medicines[0].dose.is_none());
    assert_eq!(rx.medicines[0].frequency, "once daily");
    assert!(outcome.report.valid);
}

#[test]
fn sinusitis_with_pulmonary_nearby_is_repaired() {
    let transcript = "hello fathima. she has pulmonary sinusitis. \
                      take levocetirizine 5 mg once at night for 10 days.";
    let llm_json = r#"{"patient_name": "Fathima", "age": null, "gender": null,
        "complaints": [], "diagnosis": ["pulmonary sinusitis"],
        "medicines": [{"name": "levocetirizine", "dose": "5 mg", "frequency": "once at night",
                       "duration": "10 days", "instruction": "", "route": "oral"}],
        "tests": [], "advice": [], "follow_up_days": null}"#;

    let p = pipeline(
        vec![Ok(mock_response(transcript, "en", 25.0))],
        Some(vec![Ok(llm_json.into())]),
    );
    let outcome = run(&p, &PipelineOptions::default()).unwrap();
    let rx = &outcome.prescription;

    assert!(rx.diagnosis.iter().any(|d| d.contains("sinusitis")));
    assert!(!rx.diagnosis.iter().any(|d| d.contains("pulmonary")));
    assert!(rx.warnings.iter().any(|w| w.contains("anatomy corrected")));
}

#[test]
fn llm_failure_falls_back_to_rules() {
    let transcript = "hello john. you have acute pharyngitis. take erythromycin 500 mg \
                      3 times a day for 5 days. drink warm fluids.";
    let p = pipeline(
        vec![Ok(mock_response(transcript, "en", 30.0))],
        Some(vec![
            Err(LlmError::Network("llm is down".into())),
            Err(LlmError::Network("llm is down".into())),
        ]),
    );
    let outcome = run(&p, &PipelineOptions::default()).unwrap();
    let rx = &outcome.prescription;

    assert_eq!(rx.extraction_method, ExtractionMethod::Rules);
    assert_eq!(rx.medicines[0].name, "erythromycin");
    assert!(outcome.report.valid);
}

#[test]
fn tests_are_tagged_and_deduplicated() {
    let transcript = "hello ravi. you have sinusitis. take amoxicillin 500 mg 3 times a day \
                      for 7 days. do a cbc and an x-ray pns. monitor temperature at home.";
    let llm_json = r#"{"patient_name": "Ravi", "age": null, "gender": null,
        "complaints": [], "diagnosis": ["sinusitis"],
        "medicines": [{"name": "amoxicillin", "dose": "500 mg", "frequency": "3 times a day",
                       "duration": "7 days", "instruction": "", "route": "oral"}],
        "tests": ["CBC", "PNS x-ray"], "advice": [], "follow_up_days": null}"#;

    let p = pipeline(
        vec![Ok(mock_response(transcript, "en", 30.0))],
        Some(vec![Ok(llm_json.into())]),
    );
    let outcome = run(&p, &PipelineOptions::default()).unwrap();
    let tests = &outcome.prescription.tests;

    assert!(tests
        .iter()
        .any(|t| t.name == "complete blood count" && t.kind == TestKind::Lab));
    assert!(tests
        .iter()
        .any(|t| t.name == "paranasal sinus x-ray" && t.kind == TestKind::Imaging));
    assert!(tests
        .iter()
        .any(|t| t.name == "temperature monitoring" && t.kind == TestKind::Home));
    // LLM "CBC" and rule "cbc" collapse to one entry.
    let cbc_count = tests.iter().filter(|t| t.name.contains("blood count")).count();
    assert_eq!(cbc_count, 1);
}

#[test]
fn metrics_accumulate_across_invocations() {
    let transcript = "take erythromycin 500 mg 3 times a day for 5 days after food";
    let p = pipeline(
        vec![
            Ok(mock_response(transcript, "en", 20.0)),
            Ok(mock_response(transcript, "en", 20.0)),
        ],
        None,
    );
    let options = PipelineOptions {
        llm_enabled: false,
        ..Default::default()
    };
    run(&p, &options).unwrap();
    run(&p, &options).unwrap();

    let summary = p.metrics().summary();
    assert_eq!(summary.total_processed, 2);
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.extraction_methods["rules"], 2);
    assert_eq!(summary.tier_distribution["tier_1"], 2);
}
