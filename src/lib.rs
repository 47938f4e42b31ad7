//! plangate - Plan-gated pipeline orchestrator
//!
//! Deterministically decides, before any side effect occurs, whether a
//! proposed action plan is safe to execute, and if allowed, runs the plan's
//! nodes as a linear pipeline under strict per-node and per-pipeline time
//! budgets with cooperative cancellation and guaranteed cleanup.
//!
//! # Architecture
//!
//! - Verification is pure and fail-closed: any internal error resolves to
//!   denial, never to a permissive default.
//! - Execution is cooperative: node work races a budget timer and a
//!   cancellation signal; a bounded grace window lets in-flight work unwind
//!   after a timeout, but nothing is forcibly killed.
//! - The only state shared across concurrent pipelines is the cancellation
//!   registry, keyed by pipeline id.
//!
//! # Modules
//!
//! - `config`: Timeout budgets and verifier limits
//! - `core`: Verifier, executors, cancellation, event emission
//! - `domain`: Data structures (Plan, VerificationOutcome, ExecutionRecord)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Verify a plan from a JSON file
//! plangate verify plan.json
//!
//! # Print the canonical hash of a plan
//! plangate hash plan.json
//!
//! # Run the built-in demo pipeline
//! plangate demo --nodes 3 --delay-ms 50
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod errors;

// Re-export main types at crate root for convenience
pub use crate::config::{OrchestratorConfig, TimeoutConfig, VerifierConfig};
pub use crate::core::{
    metric, CancelToken, CancellationRegistry, EventSink, FnNode, Node, NodeExecutor, NodeSpec,
    NullEmitter, Orchestrator, PipelineExecutor, PlanVerifier, RecordingEmitter, StopSignal,
    TracingEmitter,
};
pub use crate::domain::{
    AuditEvent, ExecStatus, ExecutionRecord, PipelineState, Plan, VerificationContext,
    VerificationOutcome,
};
pub use crate::errors::ExecutionError;
