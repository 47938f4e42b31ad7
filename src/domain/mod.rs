//! Domain types for the plangate orchestrator.
//!
//! This module contains the core data structures:
//! - Plan: A proposed action plus parameters, with canonical hashing
//! - Records: Per-node and per-pipeline execution records
//! - Events: Audit events handed to the external sink

pub mod events;
pub mod plan;
pub mod record;

// Re-export commonly used types
pub use events::AuditEvent;
pub use plan::{canonical_json, Plan, VerificationContext, VerificationOutcome};
pub use record::{ExecStatus, ExecutionRecord, PipelineState};
