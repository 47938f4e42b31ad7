//! Typed failure taxonomy for plan gating and pipeline execution.
//!
//! Verifier-internal failures never surface here: the verifier swallows them
//! into a denial outcome. Everything in this enum is either a pre-execution
//! rejection or a terminal executor failure, and none of them are retried.

use thiserror::Error;

use crate::domain::ExecStatus;

/// Terminal failures from the orchestrator.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The plan was rejected before any node ran.
    #[error("plan denied: {}", reasons.join(", "))]
    Denied {
        reasons: Vec<String>,
        plan_hash: String,
    },

    /// A single node exceeded its budget. Fatal to the enclosing pipeline.
    #[error("node '{node_id}' exceeded its {timeout_ms}ms budget")]
    NodeTimeout { node_id: String, timeout_ms: u64 },

    /// The pipeline as a whole exceeded its budget. Remaining nodes were
    /// never started.
    #[error(
        "pipeline '{pipeline_id}' exceeded its {timeout_ms}ms budget ({} nodes completed)",
        completed_nodes.len()
    )]
    PipelineTimeout {
        pipeline_id: String,
        timeout_ms: u64,
        completed_nodes: Vec<String>,
    },

    /// An external caller cancelled the pipeline.
    #[error("pipeline '{pipeline_id}' cancelled: {reason}")]
    Cancelled { pipeline_id: String, reason: String },

    /// The node function itself returned an error.
    #[error("node '{node_id}' failed: {source}")]
    NodeFailed {
        node_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ExecutionError {
    /// Terminal status this failure maps to in execution records
    pub fn status(&self) -> ExecStatus {
        match self {
            Self::NodeTimeout { .. } | Self::PipelineTimeout { .. } => ExecStatus::Timeout,
            Self::Cancelled { .. } => ExecStatus::Cancelled,
            Self::Denied { .. } | Self::NodeFailed { .. } => ExecStatus::Error,
        }
    }

    /// Stable short name used as the `error_type` field of records
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Denied { .. } => "verification_denied",
            Self::NodeTimeout { .. } => "node_timeout",
            Self::PipelineTimeout { .. } => "pipeline_timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::NodeFailed { .. } => "node_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ExecutionError::NodeTimeout {
            node_id: "n1".to_string(),
            timeout_ms: 200,
        };
        assert_eq!(err.status(), ExecStatus::Timeout);
        assert_eq!(err.error_type(), "node_timeout");

        let err = ExecutionError::Cancelled {
            pipeline_id: "p1".to_string(),
            reason: "operator request".to_string(),
        };
        assert_eq!(err.status(), ExecStatus::Cancelled);
    }

    #[test]
    fn test_display_includes_ids() {
        let err = ExecutionError::PipelineTimeout {
            pipeline_id: "p1".to_string(),
            timeout_ms: 500,
            completed_nodes: vec!["a".to_string(), "b".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("p1"));
        assert!(msg.contains("500"));
        assert!(msg.contains("2 nodes completed"));
    }
}
