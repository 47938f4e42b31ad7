//! Metrics and audit event emission.
//!
//! The orchestrator emits counters, histograms, gauges, execution records,
//! and audit events through the narrow [`EventSink`] contract; wiring those
//! into Prometheus, a ledger, or anything else is the host system's job.
//! Everything is append-only from the orchestrator's perspective.

use std::sync::Mutex;

use tracing::debug;

use crate::domain::{AuditEvent, ExecutionRecord};

/// Exported metric names.
pub mod metric {
    pub const NODE_DURATION_MS: &str = "orchestrator_node_duration_ms";
    pub const NODE_EXECUTIONS_TOTAL: &str = "orchestrator_node_executions_total";
    pub const NODE_TIMEOUTS_TOTAL: &str = "orchestrator_node_timeouts_total";
    pub const PIPELINE_DURATION_MS: &str = "orchestrator_pipeline_duration_ms";
    pub const PIPELINE_EXECUTIONS_TOTAL: &str = "orchestrator_pipeline_executions_total";
    pub const PIPELINE_TIMEOUTS_TOTAL: &str = "orchestrator_pipeline_timeouts_total";
    pub const PIPELINE_COMPLETED_NODES_AT_TIMEOUT: &str =
        "orchestrator_pipeline_completed_nodes_at_timeout";
    pub const VERIFIER_ATTEMPTS_TOTAL: &str = "plan_verifier_attempts_total";
    pub const VERIFIER_DENIALS_TOTAL: &str = "plan_verifier_denials_total";
}

/// Sink for counters, histograms, gauges, records, and audit events.
pub trait EventSink: Send + Sync {
    /// Increment a counter
    fn counter(&self, name: &'static str, labels: &[(&'static str, &str)], by: u64);

    /// Observe one histogram sample, in milliseconds
    fn histogram_ms(&self, name: &'static str, labels: &[(&'static str, &str)], value_ms: f64);

    /// Set a gauge
    fn gauge(&self, name: &'static str, value: f64);

    /// Hand off one terminal execution record
    fn record(&self, record: &ExecutionRecord);

    /// Hand off one audit event
    fn audit(&self, event: &AuditEvent);
}

/// Default sink: structured `tracing` events, one per emission.
#[derive(Debug, Default, Clone)]
pub struct TracingEmitter;

impl EventSink for TracingEmitter {
    fn counter(&self, name: &'static str, labels: &[(&'static str, &str)], by: u64) {
        debug!(metric = name, labels = ?labels, by, "counter");
    }

    fn histogram_ms(&self, name: &'static str, labels: &[(&'static str, &str)], value_ms: f64) {
        debug!(metric = name, labels = ?labels, value_ms, "histogram");
    }

    fn gauge(&self, name: &'static str, value: f64) {
        debug!(metric = name, value, "gauge");
    }

    fn record(&self, record: &ExecutionRecord) {
        debug!(
            id = %record.id,
            status = record.status.as_str(),
            duration_ms = record.duration_ms,
            error_type = record.error_type.as_deref().unwrap_or(""),
            "execution record"
        );
    }

    fn audit(&self, event: &AuditEvent) {
        match serde_json::to_string(event) {
            Ok(json) => debug!(audit = %json, "audit event"),
            Err(e) => debug!(error = %e, "failed to serialize audit event"),
        }
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone)]
pub struct NullEmitter;

impl EventSink for NullEmitter {
    fn counter(&self, _name: &'static str, _labels: &[(&'static str, &str)], _by: u64) {}
    fn histogram_ms(&self, _name: &'static str, _labels: &[(&'static str, &str)], _value: f64) {}
    fn gauge(&self, _name: &'static str, _value: f64) {}
    fn record(&self, _record: &ExecutionRecord) {}
    fn audit(&self, _event: &AuditEvent) {}
}

/// One captured metric sample.
#[derive(Debug, Clone)]
pub struct MetricSample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl MetricSample {
    /// Value of a label, if present
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
struct Recorded {
    counters: Vec<MetricSample>,
    histograms: Vec<MetricSample>,
    gauges: Vec<(String, f64)>,
    records: Vec<ExecutionRecord>,
    audits: Vec<AuditEvent>,
}

/// Sink that captures everything in memory, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    inner: Mutex<Recorded>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of a counter across all captured samples
    pub fn counter_total(&self, name: &str) -> u64 {
        self.inner
            .lock()
            .expect("recording emitter poisoned")
            .counters
            .iter()
            .filter(|s| s.name == name)
            .map(|s| s.value as u64)
            .sum()
    }

    /// Sum of a counter restricted to samples carrying a given label value
    pub fn counter_total_with(&self, name: &str, key: &str, value: &str) -> u64 {
        self.inner
            .lock()
            .expect("recording emitter poisoned")
            .counters
            .iter()
            .filter(|s| s.name == name && s.label(key) == Some(value))
            .map(|s| s.value as u64)
            .sum()
    }

    /// All captured histogram samples for a metric
    pub fn histogram_samples(&self, name: &str) -> Vec<MetricSample> {
        self.inner
            .lock()
            .expect("recording emitter poisoned")
            .histograms
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    /// Last value set on a gauge
    pub fn gauge_value(&self, name: &str) -> Option<f64> {
        self.inner
            .lock()
            .expect("recording emitter poisoned")
            .gauges
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// All captured execution records
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.inner
            .lock()
            .expect("recording emitter poisoned")
            .records
            .clone()
    }

    /// All captured audit events
    pub fn audits(&self) -> Vec<AuditEvent> {
        self.inner
            .lock()
            .expect("recording emitter poisoned")
            .audits
            .clone()
    }
}

impl EventSink for RecordingEmitter {
    fn counter(&self, name: &'static str, labels: &[(&'static str, &str)], by: u64) {
        self.inner
            .lock()
            .expect("recording emitter poisoned")
            .counters
            .push(MetricSample {
                name: name.to_string(),
                labels: owned_labels(labels),
                value: by as f64,
            });
    }

    fn histogram_ms(&self, name: &'static str, labels: &[(&'static str, &str)], value_ms: f64) {
        self.inner
            .lock()
            .expect("recording emitter poisoned")
            .histograms
            .push(MetricSample {
                name: name.to_string(),
                labels: owned_labels(labels),
                value: value_ms,
            });
    }

    fn gauge(&self, name: &'static str, value: f64) {
        self.inner
            .lock()
            .expect("recording emitter poisoned")
            .gauges
            .push((name.to_string(), value));
    }

    fn record(&self, record: &ExecutionRecord) {
        self.inner
            .lock()
            .expect("recording emitter poisoned")
            .records
            .push(record.clone());
    }

    fn audit(&self, event: &AuditEvent) {
        self.inner
            .lock()
            .expect("recording emitter poisoned")
            .audits
            .push(event.clone());
    }
}

fn owned_labels(labels: &[(&'static str, &str)]) -> Vec<(String, String)> {
    labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
