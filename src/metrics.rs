//! Per-invocation metrics with aggregate summaries and NDJSON export.
//!
//! The collector holds read-only views of pipeline products and never
//! mutates them. Records are totally ordered by arrival; export is
//! append-only.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::language::LanguageDecision;
use crate::pipeline::router::RouteDecision;

/// Everything recorded about one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationMetrics {
    pub id: Uuid,
    pub audio_ref: String,
    pub timestamp: String,
    pub transcription_tier: i8,
    pub no_speech_prob: f32,
    pub transcript_chars: usize,
    pub corrections_applied: usize,
    pub language: String,
    pub language_confidence: f32,
    pub router_score: f32,
    pub route: String,
    pub extraction_method: String,
    pub medicines: usize,
    pub diagnoses: usize,
    pub tests: usize,
    pub advice: usize,
    pub validation_passed: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub wall_time_secs: f64,
}

impl InvocationMetrics {
    pub fn language_from(mut self, decision: &LanguageDecision) -> Self {
        self.language = decision.primary.as_str().to_string();
        self.language_confidence = decision.confidence;
        self
    }

    pub fn route_from(mut self, route: RouteDecision, score: f32) -> Self {
        self.route = route.to_string();
        self.router_score = score;
        self
    }
}

impl Default for InvocationMetrics {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            audio_ref: String::new(),
            timestamp: Utc::now().to_rfc3339(),
            transcription_tier: 1,
            no_speech_prob: 0.0,
            transcript_chars: 0,
            corrections_applied: 0,
            language: "en".into(),
            language_confidence: 0.0,
            router_score: 0.0,
            route: String::new(),
            extraction_method: String::new(),
            medicines: 0,
            diagnoses: 0,
            tests: 0,
            advice: 0,
            validation_passed: false,
            error_count: 0,
            warning_count: 0,
            wall_time_secs: 0.0,
        }
    }
}

/// Aggregate view over all recorded invocations.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_processed: usize,
    pub success_count: usize,
    pub success_rate: f32,
    pub routing_distribution: std::collections::BTreeMap<String, usize>,
    pub extraction_methods: std::collections::BTreeMap<String, usize>,
    pub language_distribution: std::collections::BTreeMap<String, usize>,
    pub tier_distribution: std::collections::BTreeMap<String, usize>,
    pub mean_latency_secs: f64,
    pub median_latency_secs: f64,
}

/// Thread-safe, append-only metrics collector.
pub struct MetricsCollector {
    records: Mutex<Vec<InvocationMetrics>>,
    started: DateTime<Utc>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            started: Utc::now(),
        }
    }

    pub fn record(&self, metrics: InvocationMetrics) {
        tracing::debug!(audio = %metrics.audio_ref, "metrics recorded");
        self.records.lock().unwrap().push(metrics);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn uptime_secs(&self) -> f64 {
        (Utc::now() - self.started).num_milliseconds() as f64 / 1000.0
    }

    pub fn summary(&self) -> MetricsSummary {
        let records = self.records.lock().unwrap();
        let total = records.len();
        let success = records.iter().filter(|r| r.validation_passed).count();

        let mut routing = std::collections::BTreeMap::new();
        let mut methods = std::collections::BTreeMap::new();
        let mut languages = std::collections::BTreeMap::new();
        let mut tiers = std::collections::BTreeMap::new();
        for record in records.iter() {
            *routing.entry(record.route.clone()).or_insert(0) += 1;
            *methods.entry(record.extraction_method.clone()).or_insert(0) += 1;
            *languages.entry(record.language.clone()).or_insert(0) += 1;
            *tiers
                .entry(format!("tier_{}", record.transcription_tier))
                .or_insert(0) += 1;
        }

        let mut latencies: Vec<f64> = records.iter().map(|r| r.wall_time_secs).collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mean = if total > 0 {
            latencies.iter().sum::<f64>() / total as f64
        } else {
            0.0
        };
        let median = match total {
            0 => 0.0,
            n if n % 2 == 1 => latencies[n / 2],
            n => (latencies[n / 2 - 1] + latencies[n / 2]) / 2.0,
        };

        MetricsSummary {
            total_processed: total,
            success_count: success,
            success_rate: if total > 0 {
                success as f32 / total as f32
            } else {
                0.0
            },
            routing_distribution: routing,
            extraction_methods: methods,
            language_distribution: languages,
            tier_distribution: tiers,
            mean_latency_secs: mean,
            median_latency_secs: median,
        }
    }

    /// Append every record not yet exported as one NDJSON line each.
    /// Call with the same path repeatedly; the file only grows.
    pub fn export_ndjson(&self, path: &Path) -> std::io::Result<usize> {
        let records = self.records.lock().unwrap();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let mut written = 0;
        for record in records.iter() {
            let line = serde_json::to_string(record).map_err(std::io::Error::other)?;
            writeln!(file, "{line}")?;
            written += 1;
        }
        tracing::info!(written, path = %path.display(), "metrics exported");
        Ok(written)
    }

    /// Write the aggregate summary as a JSON document.
    pub fn export_summary(&self, path: &Path) -> std::io::Result<()> {
        let summary = self.summary();
        let body = serde_json::to_string_pretty(&summary).map_err(std::io::Error::other)?;
        std::fs::write(path, body)
    }
}
