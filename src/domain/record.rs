//! Execution records and the pipeline state machine.
//!
//! A record is created when a node or pipeline reaches a terminal status,
//! handed to the event sink by value, and then discarded; durable storage
//! is an external collaborator.

use serde::{Deserialize, Serialize};

/// Terminal status of one node or pipeline execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    /// Completed and produced an output
    Success,

    /// Budget exhausted (node or pipeline)
    Timeout,

    /// Explicitly cancelled by an external caller
    Cancelled,

    /// The work itself failed
    Error,
}

impl ExecStatus {
    /// Stable label value for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }
}

/// One terminal execution record, per node call or per pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Node id or pipeline id
    pub id: String,

    /// Terminal status, written exactly once
    pub status: ExecStatus,

    /// Wall-clock time from start to terminal status
    pub duration_ms: u64,

    /// Short failure classification, if not successful
    pub error_type: Option<String>,
}

impl ExecutionRecord {
    /// Create a terminal record
    pub fn new(id: impl Into<String>, status: ExecStatus, duration_ms: u64) -> Self {
        Self {
            id: id.into(),
            status,
            duration_ms,
            error_type: None,
        }
    }

    /// Attach a failure classification
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }
}

/// State machine for one pipeline invocation.
///
/// `Pending → Running → {Succeeded | NodeTimedOut | PipelineTimedOut |
/// Cancelled | Errored}`. Terminal states are final; there is no resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Running,
    Succeeded,
    NodeTimedOut,
    PipelineTimedOut,
    Cancelled,
    Errored,
}

impl PipelineState {
    /// Whether this state admits no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Status label for metrics and audit events
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::NodeTimedOut => "node_timed_out",
            Self::PipelineTimedOut => "pipeline_timed_out",
            Self::Cancelled => "cancelled",
            Self::Errored => "errored",
        }
    }
}
