//! Single-node execution under a time budget.
//!
//! A node is an opaque unit of async work. The executor races it against a
//! budget timer and an optional cancellation token via `tokio::select!`; no
//! dedicated thread is spun up per node. When a timer or cancellation wins
//! the race, the node's stop signal is fired and the executor waits up to
//! the cleanup grace window for the work to unwind before reporting the
//! failure regardless. This is best-effort cleanup: nothing is preempted,
//! and work that ignores its stop signal is simply no longer awaited.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::config::TimeoutConfig;
use crate::core::cancel::CancelToken;
use crate::core::emitter::{metric, EventSink};
use crate::domain::{ExecStatus, ExecutionRecord};
use crate::errors::ExecutionError;

/// Advisory stop signal handed to every node invocation. Fires when the
/// node's budget is exhausted or its pipeline is cancelled; nodes are
/// expected to observe it at safe points and unwind.
pub use tokio_util::sync::CancellationToken as StopSignal;

/// One unit of work in a pipeline
#[async_trait]
pub trait Node: Send + Sync {
    /// Run the node. Implementations should check `stop` at safe points
    /// and return promptly once it fires.
    async fn run(&self, input: Value, stop: StopSignal) -> Result<Value>;
}

/// Adapts a plain async closure into a [`Node`] that ignores the stop
/// signal (the executor stops awaiting it after the grace window instead).
pub struct FnNode<F>(pub F);

#[async_trait]
impl<F, Fut> Node for FnNode<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn run(&self, input: Value, _stop: StopSignal) -> Result<Value> {
        (self.0)(input).await
    }
}

/// Runs one node under a budget with optional cancellation.
#[derive(Clone)]
pub struct NodeExecutor {
    timeouts: TimeoutConfig,
    sink: Arc<dyn EventSink>,
}

impl NodeExecutor {
    /// Create an executor with the given budgets and sink
    pub fn new(timeouts: TimeoutConfig, sink: Arc<dyn EventSink>) -> Self {
        Self { timeouts, sink }
    }

    /// Execute one node under the configured per-node budget.
    #[instrument(skip(self, node, input, cancel))]
    pub async fn execute(
        &self,
        node_id: &str,
        node: &dyn Node,
        input: Value,
        cancel: Option<&CancelToken>,
    ) -> Result<Value, ExecutionError> {
        self.execute_bounded(node_id, node, input, cancel, self.timeouts.node_timeout(), None)
            .await
    }

    /// Execute one node under an explicit budget. The pipeline executor
    /// uses this to clip a node's window to the pipeline's remaining time.
    pub(crate) async fn execute_bounded(
        &self,
        node_id: &str,
        node: &dyn Node,
        input: Value,
        cancel: Option<&CancelToken>,
        budget: Duration,
        pipeline_id: Option<&str>,
    ) -> Result<Value, ExecutionError> {
        let started = Instant::now();

        // A cancellation that landed before we started still wins
        if cancel.map(|t| t.is_cancelled()).unwrap_or(false) {
            let err = cancelled_error(cancel, pipeline_id, node_id);
            self.finish(node_id, started, Err(&err));
            return Err(err);
        }

        let stop = cancel.map(|t| t.child_stop()).unwrap_or_default();
        let fut = node.run(input, stop.clone());
        tokio::pin!(fut);

        let result = tokio::select! {
            res = &mut fut => res.map_err(|e| ExecutionError::NodeFailed {
                node_id: node_id.to_string(),
                source: e,
            }),
            _ = cancelled_or_never(cancel) => {
                stop.cancel();
                self.drain(node_id, &mut fut).await;
                Err(cancelled_error(cancel, pipeline_id, node_id))
            }
            _ = tokio::time::sleep(budget) => {
                stop.cancel();
                self.drain(node_id, &mut fut).await;
                Err(ExecutionError::NodeTimeout {
                    node_id: node_id.to_string(),
                    timeout_ms: budget.as_millis() as u64,
                })
            }
        };

        self.finish(node_id, started, result.as_ref());
        result
    }

    /// Wait up to the grace window for a stopped node to unwind cleanly.
    /// Exceeding the window does not block the executor further.
    async fn drain(&self, node_id: &str, fut: &mut (impl Future<Output = Result<Value>> + Unpin)) {
        let grace = self.timeouts.cleanup_grace();
        if tokio::time::timeout(grace, fut).await.is_err() {
            warn!(
                node_id,
                grace_ms = grace.as_millis() as u64,
                "node did not unwind within the grace window"
            );
        }
    }

    /// Emit the per-node record and metrics for a terminal status
    fn finish(&self, node_id: &str, started: Instant, result: Result<&Value, &ExecutionError>) {
        let duration_ms = started.elapsed().as_millis() as u64;
        let status = match result {
            Ok(_) => ExecStatus::Success,
            Err(e) => e.status(),
        };

        let mut record = ExecutionRecord::new(node_id, status, duration_ms);
        if let Err(e) = result {
            record = record.with_error_type(e.error_type());
        }
        self.sink.record(&record);

        self.sink.histogram_ms(
            metric::NODE_DURATION_MS,
            &[("node_id", node_id)],
            duration_ms as f64,
        );
        self.sink.counter(
            metric::NODE_EXECUTIONS_TOTAL,
            &[("node_id", node_id), ("status", status.as_str())],
            1,
        );
        if status == ExecStatus::Timeout {
            self.sink
                .counter(metric::NODE_TIMEOUTS_TOTAL, &[("node_id", node_id)], 1);
        }

        debug!(
            node_id,
            status = status.as_str(),
            duration_ms,
            "node finished"
        );
    }
}

// Standalone node executions have no pipeline; name the node instead so
// the error always identifies its origin.
fn cancelled_error(
    cancel: Option<&CancelToken>,
    pipeline_id: Option<&str>,
    node_id: &str,
) -> ExecutionError {
    ExecutionError::Cancelled {
        pipeline_id: pipeline_id.unwrap_or(node_id).to_string(),
        reason: cancel
            .and_then(|t| t.reason())
            .unwrap_or_else(|| "cancelled".to_string()),
    }
}

/// Resolves when the token cancels; never resolves without a token
async fn cancelled_or_never(cancel: Option<&CancelToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
