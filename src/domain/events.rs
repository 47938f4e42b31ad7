//! Audit events handed off to the external audit/ledger collaborator.
//!
//! One event is emitted per verification and per pipeline terminal state.
//! The orchestrator never reads these back; storage and querying live
//! outside this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When this event was emitted (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// Canonical plan digest, when the event concerns a plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_hash: Option<String>,

    /// Verification decision, for verification events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<bool>,

    /// Denial reason or passed-check trail
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,

    /// Whether verification was bypassed for this action
    #[serde(default)]
    pub bypassed: bool,

    /// Pipeline this event belongs to, for execution events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,

    /// Terminal status ("allowed", "denied", or a pipeline state label)
    pub status: String,

    /// Wall-clock duration, for execution events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Nodes that finished before a pipeline-level failure
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completed_nodes: Vec<String>,
}

impl AuditEvent {
    /// Event for one verification call
    pub fn verification(
        plan_hash: String,
        allow: bool,
        reasons: Vec<String>,
        bypassed: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            plan_hash: Some(plan_hash),
            allow: Some(allow),
            reasons,
            bypassed,
            pipeline_id: None,
            status: if allow { "allowed" } else { "denied" }.to_string(),
            duration_ms: None,
            completed_nodes: Vec::new(),
        }
    }

    /// Event for one pipeline reaching a terminal state
    pub fn pipeline(
        pipeline_id: String,
        status: &str,
        duration_ms: u64,
        completed_nodes: Vec<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            plan_hash: None,
            allow: None,
            reasons: Vec::new(),
            bypassed: false,
            pipeline_id: Some(pipeline_id),
            status: status.to_string(),
            duration_ms: Some(duration_ms),
            completed_nodes,
        }
    }

    /// Attach the plan hash that gated this execution
    pub fn with_plan_hash(mut self, plan_hash: String) -> Self {
        self.plan_hash = Some(plan_hash);
        self
    }
}
