//! End-to-end orchestration: one audio file in, one validated
//! prescription (plus report and metrics) out.
//!
//! Stages run strictly in order; the cancellation token and the optional
//! deadline are checked at every stage boundary. All collaborators are
//! constructor-injected and shared read-only, so invocations can run in
//! parallel at process level.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::asr::{AsrClient, AudioInput, TieredTranscriber, WhisperApiClient};
use crate::config::Settings;
use crate::extraction::{
    merge_prescriptions, ChatCompletionsClient, ExtractionError, ExtractionMethod, Extractor,
    LlmExtractor, PostProcessor, Prescription, RuleExtractor,
};
use crate::handoff::HandoffWriter;
use crate::knowledge::KnowledgeBase;
use crate::metrics::{InvocationMetrics, MetricsCollector};
use crate::validation::{ValidationReport, Validator};

use super::cleaner::TranscriptCleaner;
use super::language::{Language, LanguageDetector};
use super::normalize::TermNormalizer;
use super::router::{RouteDecision, Router};
use super::thanglish::ThanglishNormalizer;
use super::{PipelineError, Stage};

/// Cooperative cancellation flag, checked at stage boundaries. Stages in
/// flight finish their current external call first.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Caller-tunable knobs for one invocation.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub hint_language: Option<Language>,
    pub max_tier: u8,
    pub llm_enabled: bool,
    /// Overall wall-clock budget, observed at stage boundaries.
    pub timeout_ms: Option<u64>,
    /// Doctor-review mode: advice templates bypass the evidence gate.
    pub template_advice: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            hint_language: None,
            max_tier: 3,
            llm_enabled: true,
            timeout_ms: None,
            template_advice: false,
        }
    }
}

/// What one invocation produces.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub prescription: Prescription,
    pub report: ValidationReport,
    pub metrics: InvocationMetrics,
}

pub struct PrescriptionPipeline {
    transcriber: TieredTranscriber,
    cleaner: TranscriptCleaner,
    detector: LanguageDetector,
    thanglish: ThanglishNormalizer,
    normalizer: TermNormalizer,
    router: Router,
    llm: Option<LlmExtractor>,
    rules: RuleExtractor,
    post: PostProcessor,
    validator: Validator,
    metrics: MetricsCollector,
    handoff: Option<HandoffWriter>,
}

impl PrescriptionPipeline {
    pub fn new(
        kb: Arc<KnowledgeBase>,
        transcriber: TieredTranscriber,
        llm: Option<LlmExtractor>,
    ) -> Self {
        Self {
            transcriber,
            cleaner: TranscriptCleaner::new(Arc::clone(&kb)),
            detector: LanguageDetector::new(),
            thanglish: ThanglishNormalizer::new(),
            normalizer: TermNormalizer::new(Arc::clone(&kb)),
            router: Router::new(),
            llm,
            rules: RuleExtractor::new(Arc::clone(&kb)),
            post: PostProcessor::new(Arc::clone(&kb)),
            validator: Validator::new(kb),
            metrics: MetricsCollector::new(),
            handoff: None,
        }
    }

    /// Wire up real collaborators from environment-driven settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        let kb = Arc::new(match &settings.kb_dir {
            Some(dir) => KnowledgeBase::from_dir(dir)?,
            None => KnowledgeBase::builtin(),
        });

        let asr: Arc<dyn AsrClient> = Arc::new(WhisperApiClient::new(
            &settings.asr_base_url,
            &settings.asr_api_key,
            settings.asr_timeout_secs,
        ));
        let transcriber =
            TieredTranscriber::new(asr, &settings.asr_base_model, &settings.asr_high_model);

        let llm_client = ChatCompletionsClient::new(
            &settings.llm_base_url,
            &settings.llm_api_key,
            settings.llm_timeout_secs,
        );
        let llm = LlmExtractor::new(
            Box::new(llm_client),
            settings.llm_models.clone(),
            Arc::clone(&kb),
        );

        Ok(Self::new(kb, transcriber, Some(llm))
            .with_handoff(HandoffWriter::new(settings.handoff_path.clone())))
    }

    pub fn with_handoff(mut self, handoff: HandoffWriter) -> Self {
        self.handoff = Some(handoff);
        self
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Process one audio input end to end.
    pub fn process(
        &self,
        audio: &AudioInput,
        options: &PipelineOptions,
        cancel: &CancelToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        let audio_ref = audio.reference();
        let deadline_ms = options.timeout_ms;

        let check = |stage: Stage| -> Result<(), PipelineError> {
            if cancel.is_cancelled() {
                tracing::warn!(stage = %stage, "invocation cancelled");
                return Err(PipelineError::Cancelled(stage));
            }
            if let Some(budget) = deadline_ms {
                if started.elapsed().as_millis() as u64 >= budget {
                    tracing::warn!(stage = %stage, budget_ms = budget, "deadline exceeded");
                    return Err(PipelineError::DeadlineExceeded { stage });
                }
            }
            Ok(())
        };

        // ── [1] Transcription ──
        check(Stage::Transcription)?;
        let mut input = audio.clone();
        if let Some(hint) = options.hint_language {
            // The ASR collaborator takes ISO hints; Thanglish is Latin-script
            // audio and mixed input is best left to auto-detection.
            let iso = match hint {
                Language::En | Language::Thanglish => Some("en"),
                Language::Ta => Some("ta"),
                Language::Ar => Some("ar"),
                Language::Mixed => None,
            };
            if let Some(iso) = iso {
                input.hint_language = Some(iso.to_string());
            }
        }
        let transcription = self.transcriber.transcribe(&input, options.max_tier.clamp(1, 3))?;
        tracing::info!(
            tier = transcription.transcription_tier,
            chars = transcription.text.len(),
            language = %transcription.whisper_language,
            "transcription complete"
        );

        // ── [2] Cleaning ──
        check(Stage::Cleaning)?;
        let cleaned = self.cleaner.clean(&transcription.text);

        // ── [3] Language detection ──
        check(Stage::LanguageDetection)?;
        let decision = self.detector.detect(
            &cleaned.text,
            Some(transcription.whisper_language.as_str()).filter(|l| !l.is_empty()),
            transcription.confidence,
        );
        tracing::info!(language = %decision.primary, confidence = decision.confidence, "language decided");

        // ── [4] Thanglish normalization (conditional) ──
        check(Stage::ThanglishNormalization)?;
        let working = if decision.tamil_leaning() {
            self.thanglish.normalize(&cleaned.text).text
        } else {
            cleaned.text.clone()
        };

        // ── [5] Term normalization ──
        check(Stage::TermNormalization)?;
        let normalized = self.normalizer.normalize(&working);

        // ── [6] Routing ──
        check(Stage::Routing)?;
        let analysis = self.router.analyze(&normalized.text, transcription.confidence);
        let (route, route_config) = self.router.select(&analysis);
        tracing::debug!(retry_budget = route_config.retry_budget, timeout_ms = route_config.timeout_ms, "route config attached");

        // ── [7] Extraction ──
        check(Stage::Extraction)?;
        let extracted = self.run_extraction(route, &normalized.text, &decision, options)?;

        // ── [8] Post-processing ──
        check(Stage::PostProcessing)?;
        let mut prescription = extracted;
        prescription.language = decision.primary;
        prescription.transcription_tier = transcription.transcription_tier;
        // One end-to-end confidence: the weakest stage bounds it.
        prescription.confidence = prescription.confidence.min(transcription.confidence);
        prescription.timestamp = Utc::now().to_rfc3339();
        self.post.run(
            &mut prescription,
            &normalized.text,
            &normalized.anatomy_flags,
            options.template_advice,
        );

        // ── [9] Validation ──
        check(Stage::Validation)?;
        let report = self.validator.validate(&prescription);

        let metrics = InvocationMetrics {
            audio_ref,
            transcription_tier: transcription.transcription_tier,
            no_speech_prob: transcription.no_speech_prob,
            transcript_chars: normalized.text.chars().count(),
            corrections_applied: cleaned.corrections_applied,
            extraction_method: prescription.extraction_method.as_str().to_string(),
            medicines: prescription.medicines.len(),
            diagnoses: prescription.diagnosis.len(),
            tests: prescription.tests.len(),
            advice: prescription.advice.len(),
            validation_passed: report.valid,
            error_count: report.errors.len(),
            warning_count: report.warnings.len() + prescription.warnings.len(),
            wall_time_secs: started.elapsed().as_secs_f64(),
            ..Default::default()
        }
        .language_from(&decision)
        .route_from(route, analysis.composite);
        self.metrics.record(metrics.clone());

        if report.valid {
            if let Some(handoff) = &self.handoff {
                if let Err(e) = handoff.publish(&prescription) {
                    tracing::warn!(error = %e, "handoff publish failed");
                }
            }
        }

        Ok(PipelineOutcome {
            prescription,
            report,
            metrics,
        })
    }

    fn run_extraction(
        &self,
        route: RouteDecision,
        transcript: &str,
        decision: &super::language::LanguageDecision,
        options: &PipelineOptions,
    ) -> Result<Prescription, PipelineError> {
        let llm = if options.llm_enabled { self.llm.as_ref() } else { None };

        match (route, llm) {
            (RouteDecision::RulesOnly, _) | (_, None) => {
                Ok(self.rules.extract(transcript, decision)?)
            }

            (RouteDecision::LlmOnly, Some(llm)) => match llm.extract(transcript, decision) {
                Ok(p) if p.extraction_method != ExtractionMethod::Failed => Ok(p),
                Ok(_) => self.rules_fallback(transcript, decision, "unparseable LLM output"),
                Err(e) => {
                    tracing::warn!(error = %e, "LLM extraction failed, falling back to rules");
                    self.rules_fallback(transcript, decision, &e.to_string())
                }
            },

            (RouteDecision::Ensemble, Some(llm)) => {
                let rule_result = self.rules.extract(transcript, decision)?;
                let llm_result = match llm.extract(transcript, decision) {
                    Ok(p) if p.extraction_method != ExtractionMethod::Failed => Some(p),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::warn!(error = %e, "LLM side of ensemble failed");
                        if rule_result.is_empty_shell() {
                            return Err(PipelineError::Extraction(
                                ExtractionError::AllExtractorsFailed(e.to_string()),
                            ));
                        }
                        None
                    }
                };
                match llm_result {
                    Some(p) => Ok(merge_prescriptions(&p, &rule_result)),
                    None if rule_result.is_empty_shell() => Err(PipelineError::Extraction(
                        ExtractionError::AllExtractorsFailed(
                            "unparseable LLM output and empty rule extraction".into(),
                        ),
                    )),
                    None => Ok(rule_result),
                }
            }
        }
    }

    /// Rules fallback after an LLM failure. Both sides empty is the one
    /// unrecoverable extraction outcome.
    fn rules_fallback(
        &self,
        transcript: &str,
        decision: &super::language::LanguageDecision,
        llm_failure: &str,
    ) -> Result<Prescription, PipelineError> {
        let fallback = self.rules.extract(transcript, decision)?;
        if fallback.is_empty_shell() {
            return Err(PipelineError::Extraction(
                ExtractionError::AllExtractorsFailed(llm_failure.to_string()),
            ));
        }
        Ok(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::client::{mock_response, MockAsrClient};
    use crate::extraction::MockLlmClient;

    const ENGLISH: &str =
        "hello john. you have acute pharyngitis. take erythromycin 500 mg 3 times a day \
         for 5 days after food. drink plenty of warm fluids. come for review after 5 days.";

    fn pipeline_with(
        asr_script: Vec<Result<crate::asr::AsrResponse, crate::asr::TranscriptionError>>,
        llm_script: Option<Vec<Result<String, crate::extraction::LlmError>>>,
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

    #[test]
    fn rules_only_pipeline_end_to_end() {
        let pipeline = pipeline_with(vec![Ok(mock_response(ENGLISH, "en", 60.0))], None);
        let outcome = pipeline
            .process(
                &AudioInput::from_bytes(vec![], "audio/wav"),
                &PipelineOptions::default(),
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(outcome.prescription.patient_name, "John");
        assert_eq!(outcome.prescription.medicines[0].name, "erythromycin");
        assert!(outcome.report.valid);
        assert_eq!(pipeline.metrics().len(), 1);
    }

    #[test]
    fn cancellation_checked_before_first_stage() {
        let pipeline = pipeline_with(vec![Ok(mock_response(ENGLISH, "en", 60.0))], None);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = pipeline
            .process(
                &AudioInput::from_bytes(vec![], "audio/wav"),
                &PipelineOptions::default(),
                &cancel,
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled(Stage::Transcription)));
    }

    #[test]
    fn zero_deadline_exceeds_immediately() {
        let pipeline = pipeline_with(vec![Ok(mock_response(ENGLISH, "en", 60.0))], None);
        let options = PipelineOptions {
            timeout_ms: Some(0),
            ..Default::default()
        };
        // The first boundary after any elapsed time trips the deadline;
        // transcription may or may not run depending on timer resolution,
        // so only the error kind is asserted.
        let err = pipeline
            .process(&AudioInput::from_bytes(vec![], "audio/wav"), &options, &CancelToken::new())
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DeadlineExceeded { .. } | PipelineError::Cancelled(_)
        ));
    }

    #[test]
    fn llm_disabled_option_forces_rules() {
        let llm_script = vec![Ok("{}".to_string())];
        let pipeline = pipeline_with(
            vec![Ok(mock_response(ENGLISH, "en", 60.0))],
            Some(llm_script),
        );
        let options = PipelineOptions {
            llm_enabled: false,
            ..Default::default()
        };
        let outcome = pipeline
            .process(&AudioInput::from_bytes(vec![], "audio/wav"), &options, &CancelToken::new())
            .unwrap();
        assert_eq!(outcome.prescription.extraction_method, ExtractionMethod::Rules);
    }

    #[test]
    fn confidence_is_min_of_transcription_and_extraction() {
        let mut response = mock_response(ENGLISH, "en", 60.0);
        response.confidence = 0.45;
        let pipeline = pipeline_with(vec![Ok(response)], None);
        let outcome = pipeline
            .process(
                &AudioInput::from_bytes(vec![], "audio/wav"),
                &PipelineOptions::default(),
                &CancelToken::new(),
            )
            .unwrap();
        // Rule extractor reports 0.6; transcription 0.45 bounds it.
        assert!((outcome.prescription.confidence - 0.45).abs() < 1e-6);
    }
}
