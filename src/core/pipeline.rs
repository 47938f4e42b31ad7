//! Sequential pipeline execution under an overall time budget.
//!
//! Nodes run strictly in list order, each node's output threading forward
//! as the next node's input. Every node races the smaller of its own budget
//! and the pipeline's remaining time, so a node late in the chain never
//! gets a fresh full window when the pipeline is close to its deadline.
//! A cancellation token is registered at the start and unregistered on
//! every exit path via a drop guard.

use std::sync::Arc;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::TimeoutConfig;
use crate::core::cancel::CancellationRegistry;
use crate::core::emitter::{metric, EventSink};
use crate::core::executor::{FnNode, Node, NodeExecutor};
use crate::domain::{AuditEvent, ExecStatus, ExecutionRecord, PipelineState};
use crate::errors::ExecutionError;

/// A named node in a pipeline
#[derive(Clone)]
pub struct NodeSpec {
    /// Node id (unique within the pipeline)
    pub id: String,
    node: Arc<dyn Node>,
}

impl NodeSpec {
    /// Pair an id with a node implementation
    pub fn new(id: impl Into<String>, node: Arc<dyn Node>) -> Self {
        Self {
            id: id.into(),
            node,
        }
    }

    /// Pair an id with a plain async closure
    pub fn from_fn<F, Fut>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::new(id, Arc::new(FnNode(f)))
    }

    /// The node implementation
    pub fn node(&self) -> &dyn Node {
        self.node.as_ref()
    }
}

/// Unregisters a pipeline's token when the execution ends, however it ends.
struct RegistryGuard {
    registry: Arc<CancellationRegistry>,
    pipeline_id: String,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.pipeline_id);
    }
}

/// Runs ordered node lists under the pipeline budget.
#[derive(Clone)]
pub struct PipelineExecutor {
    timeouts: TimeoutConfig,
    registry: Arc<CancellationRegistry>,
    nodes: NodeExecutor,
    sink: Arc<dyn EventSink>,
}

impl PipelineExecutor {
    /// Create a pipeline executor sharing the given registry and sink
    pub fn new(
        timeouts: TimeoutConfig,
        registry: Arc<CancellationRegistry>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let nodes = NodeExecutor::new(timeouts.clone(), sink.clone());
        Self {
            timeouts,
            registry,
            nodes,
            sink,
        }
    }

    /// Execute an ordered node list, threading outputs forward.
    ///
    /// Returns the final node's output, or the first terminal failure. A
    /// single node timeout is fatal to the whole pipeline; remaining nodes
    /// are never started.
    pub async fn execute(
        &self,
        pipeline_id: &str,
        nodes: &[NodeSpec],
        initial_input: Value,
    ) -> Result<Value, ExecutionError> {
        self.execute_gated(pipeline_id, None, nodes, initial_input)
            .await
    }

    /// Execute with the canonical hash of the plan that gated this run, so
    /// the terminal audit event correlates with the verification event.
    #[instrument(skip(self, plan_hash, nodes, initial_input), fields(node_count = nodes.len()))]
    pub async fn execute_gated(
        &self,
        pipeline_id: &str,
        plan_hash: Option<&str>,
        nodes: &[NodeSpec],
        initial_input: Value,
    ) -> Result<Value, ExecutionError> {
        let started = Instant::now();
        let budget = self.timeouts.pipeline_timeout();

        let token = self.registry.register(pipeline_id);
        let _guard = RegistryGuard {
            registry: self.registry.clone(),
            pipeline_id: pipeline_id.to_string(),
        };

        info!(pipeline_id, "pipeline started");
        let mut completed: Vec<String> = Vec::with_capacity(nodes.len());
        let mut current = initial_input;

        for spec in nodes {
            // Remaining pipeline time governs alongside the node budget
            let remaining = match budget.checked_sub(started.elapsed()) {
                Some(d) if !d.is_zero() => d,
                _ => {
                    let err = self.pipeline_timeout(pipeline_id, &completed);
                    return Err(self.finish(pipeline_id, plan_hash, started, completed, err));
                }
            };
            let node_budget = self.timeouts.node_timeout();
            let clipped = remaining < node_budget;
            let effective = if clipped { remaining } else { node_budget };

            let retained = if self.timeouts.fail_fast {
                None
            } else {
                Some(current.clone())
            };

            match self
                .nodes
                .execute_bounded(
                    &spec.id,
                    spec.node(),
                    current,
                    Some(&token),
                    effective,
                    Some(pipeline_id),
                )
                .await
            {
                Ok(output) => {
                    completed.push(spec.id.clone());
                    current = output;
                }
                Err(ExecutionError::NodeTimeout { .. }) if clipped => {
                    // The pipeline's budget was the one that expired
                    let err = self.pipeline_timeout(pipeline_id, &completed);
                    return Err(self.finish(pipeline_id, plan_hash, started, completed, err));
                }
                Err(ExecutionError::NodeFailed { node_id, source }) if retained.is_some() => {
                    // fail_fast is off: record the failure and thread the
                    // node's input onward unchanged
                    warn!(pipeline_id, node_id = %node_id, error = %source, "node failed, continuing");
                    current = retained.unwrap_or_default();
                }
                Err(err) => {
                    return Err(self.finish(pipeline_id, plan_hash, started, completed, err));
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        self.emit_terminal(
            pipeline_id,
            plan_hash,
            PipelineState::Succeeded,
            ExecStatus::Success,
            None,
            duration_ms,
            &completed,
        );
        info!(
            pipeline_id,
            duration_ms,
            node_count = completed.len(),
            "pipeline completed"
        );
        Ok(current)
    }

    fn pipeline_timeout(&self, pipeline_id: &str, completed: &[String]) -> ExecutionError {
        ExecutionError::PipelineTimeout {
            pipeline_id: pipeline_id.to_string(),
            timeout_ms: self.timeouts.pipeline_timeout_ms,
            completed_nodes: completed.to_vec(),
        }
    }

    /// Emit terminal telemetry for a failed pipeline and pass the error on
    fn finish(
        &self,
        pipeline_id: &str,
        plan_hash: Option<&str>,
        started: Instant,
        completed: Vec<String>,
        err: ExecutionError,
    ) -> ExecutionError {
        let duration_ms = started.elapsed().as_millis() as u64;
        let state = match &err {
            ExecutionError::NodeTimeout { .. } => PipelineState::NodeTimedOut,
            ExecutionError::PipelineTimeout { .. } => PipelineState::PipelineTimedOut,
            ExecutionError::Cancelled { .. } => PipelineState::Cancelled,
            ExecutionError::Denied { .. } | ExecutionError::NodeFailed { .. } => {
                PipelineState::Errored
            }
        };

        if let ExecutionError::PipelineTimeout {
            completed_nodes, ..
        } = &err
        {
            // How much useful work survived the failure
            self.sink.gauge(
                metric::PIPELINE_COMPLETED_NODES_AT_TIMEOUT,
                completed_nodes.len() as f64,
            );
            self.sink.counter(
                metric::PIPELINE_TIMEOUTS_TOTAL,
                &[("pipeline_id", pipeline_id)],
                1,
            );
        }

        self.emit_terminal(
            pipeline_id,
            plan_hash,
            state,
            err.status(),
            Some(err.error_type()),
            duration_ms,
            &completed,
        );
        warn!(
            pipeline_id,
            state = state.as_str(),
            duration_ms,
            error = %err,
            "pipeline failed"
        );
        err
    }

    fn emit_terminal(
        &self,
        pipeline_id: &str,
        plan_hash: Option<&str>,
        state: PipelineState,
        status: ExecStatus,
        error_type: Option<&str>,
        duration_ms: u64,
        completed: &[String],
    ) {
        let mut record = ExecutionRecord::new(pipeline_id, status, duration_ms);
        if let Some(error_type) = error_type {
            record = record.with_error_type(error_type);
        }
        self.sink.record(&record);

        self.sink.histogram_ms(
            metric::PIPELINE_DURATION_MS,
            &[("pipeline_id", pipeline_id)],
            duration_ms as f64,
        );
        self.sink.counter(
            metric::PIPELINE_EXECUTIONS_TOTAL,
            &[("pipeline_id", pipeline_id), ("status", status.as_str())],
            1,
        );

        let mut event = AuditEvent::pipeline(
            pipeline_id.to_string(),
            state.as_str(),
            duration_ms,
            completed.to_vec(),
        );
        if let Some(hash) = plan_hash {
            event = event.with_plan_hash(hash.to_string());
        }
        self.sink.audit(&event);
        debug!(pipeline_id, state = state.as_str(), "pipeline terminal state");
    }
}
