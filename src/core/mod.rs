//! Core orchestration logic.
//!
//! This module contains:
//! - Verifier: Deterministic, fail-closed plan gating
//! - Cancel: Cancellation tokens and the per-pipeline registry
//! - Executor: Single-node execution under a budget
//! - Pipeline: Sequential node execution under an overall budget
//! - Emitter: Metrics and audit event sinks
//! - Orchestrator: Plan-gated facade tying the above together

pub mod cancel;
pub mod emitter;
pub mod executor;
pub mod orchestrator;
pub mod pipeline;
pub mod verifier;

// Re-export commonly used types
pub use cancel::{CancelToken, CancellationRegistry};
pub use emitter::{metric, EventSink, NullEmitter, RecordingEmitter, TracingEmitter};
pub use executor::{FnNode, Node, NodeExecutor, StopSignal};
pub use orchestrator::Orchestrator;
pub use pipeline::{NodeSpec, PipelineExecutor};
pub use verifier::PlanVerifier;
