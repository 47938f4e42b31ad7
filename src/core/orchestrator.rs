//! Plan-gated orchestration facade.
//!
//! Ties the verifier, cancellation registry, and pipeline executor together:
//! a plan is verified first, and only an allowed plan's node list is ever
//! executed. Denials stop everything before any side effect occurs.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};

use crate::config::OrchestratorConfig;
use crate::core::cancel::CancellationRegistry;
use crate::core::emitter::{metric, EventSink, TracingEmitter};
use crate::core::pipeline::{NodeSpec, PipelineExecutor};
use crate::core::verifier::{PlanVerifier, REASON_BYPASSED};
use crate::domain::{AuditEvent, Plan, VerificationContext, VerificationOutcome};
use crate::errors::ExecutionError;

/// Plan-gated pipeline orchestrator.
pub struct Orchestrator {
    verifier: PlanVerifier,
    registry: Arc<CancellationRegistry>,
    pipelines: PipelineExecutor,
    sink: Arc<dyn EventSink>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

impl Orchestrator {
    /// Create an orchestrator with the default tracing sink
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingEmitter))
    }

    /// Create an orchestrator emitting into the given sink
    pub fn with_sink(config: OrchestratorConfig, sink: Arc<dyn EventSink>) -> Self {
        let registry = Arc::new(CancellationRegistry::new());
        let pipelines =
            PipelineExecutor::new(config.timeouts.clone(), registry.clone(), sink.clone());
        Self {
            verifier: PlanVerifier::new(config.verifier),
            registry,
            pipelines,
            sink,
        }
    }

    /// Verify a plan, emitting verifier metrics and an audit event.
    /// Deterministic for a fixed plan; never fails outward.
    pub fn verify(&self, plan: &Plan, context: &VerificationContext) -> VerificationOutcome {
        let outcome = self.verifier.verify(plan, context);
        self.emit_verification(&outcome);
        outcome
    }

    /// Verify a raw JSON value that may not parse as a plan (fail-closed)
    pub fn verify_value(&self, raw: &Value, context: &VerificationContext) -> VerificationOutcome {
        let outcome = self.verifier.verify_value(raw, context);
        self.emit_verification(&outcome);
        outcome
    }

    /// Gate a plan and, if allowed, execute its node list as a pipeline.
    ///
    /// A denied plan returns [`ExecutionError::Denied`] without starting
    /// any node.
    #[instrument(skip(self, plan, context, nodes, initial_input), fields(action = %plan.action))]
    pub async fn run(
        &self,
        pipeline_id: &str,
        plan: &Plan,
        context: &VerificationContext,
        nodes: &[NodeSpec],
        initial_input: Value,
    ) -> Result<Value, ExecutionError> {
        let outcome = self.verify(plan, context);
        if !outcome.allow {
            return Err(ExecutionError::Denied {
                reasons: outcome.reasons,
                plan_hash: outcome.plan_hash,
            });
        }

        info!(pipeline_id, action = %plan.action, "plan allowed, executing");
        self.pipelines
            .execute_gated(pipeline_id, Some(&outcome.plan_hash), nodes, initial_input)
            .await
    }

    /// Cancel an in-flight pipeline. Unknown ids are a no-op.
    pub fn cancel(&self, pipeline_id: &str, reason: &str) -> bool {
        self.registry.cancel(pipeline_id, reason)
    }

    /// The shared cancellation registry
    pub fn registry(&self) -> &Arc<CancellationRegistry> {
        &self.registry
    }

    /// The pipeline executor, for callers that gate plans themselves
    pub fn pipelines(&self) -> &PipelineExecutor {
        &self.pipelines
    }

    fn emit_verification(&self, outcome: &VerificationOutcome) {
        let result = if outcome.allow { "allow" } else { "deny" };
        self.sink
            .counter(metric::VERIFIER_ATTEMPTS_TOTAL, &[("result", result)], 1);

        if !outcome.allow {
            if let Some(reason) = outcome.reasons.first() {
                self.sink
                    .counter(metric::VERIFIER_DENIALS_TOTAL, &[("reason", reason)], 1);
            }
        }

        let bypassed = outcome
            .reasons
            .first()
            .map(|r| r == REASON_BYPASSED)
            .unwrap_or(false);
        self.sink.audit(&AuditEvent::verification(
            outcome.plan_hash.clone(),
            outcome.allow,
            outcome.reasons.clone(),
            bypassed,
        ));
    }
}
