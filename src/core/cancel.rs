//! Cancellation tokens and the per-pipeline registry.
//!
//! Cancellation here is advisory: a token is a signal, not a kill. Node
//! functions observe it at safe points; the executors race against it.
//! The registry is the only state shared across concurrent pipeline
//! executions and is keyed by pipeline id, so independent pipelines never
//! contend on each other's tokens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tokio_util::sync::CancellationToken;

/// A cancellation handle for one pipeline execution.
///
/// Clones share state: cancelling any clone cancels all of them. The
/// transition reason is written once, at cancellation time.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
    reason: Arc<OnceLock<String>>,
}

impl CancelToken {
    /// Create a fresh, active token
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking check of the cancelled state
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }

    /// The transition reason, once cancelled
    pub fn reason(&self) -> Option<String> {
        self.reason.get().cloned()
    }

    /// Cancel with a reason. The first reason wins; later calls are no-ops.
    pub fn cancel(&self, reason: impl Into<String>) {
        let _ = self.reason.set(reason.into());
        self.inner.cancel();
    }

    /// Derive a stop signal that fires when this token is cancelled.
    /// Cancelling the derived signal does not cancel this token, which lets
    /// the executor tell a node to unwind without marking the whole
    /// pipeline as cancelled.
    pub(crate) fn child_stop(&self) -> CancellationToken {
        self.inner.child_token()
    }
}

/// Maps pipeline ids to cancellation tokens for in-flight executions.
///
/// Owned by an orchestrator instance and injected where needed; never a
/// process-wide singleton, so multiple orchestrators in one process (or in
/// tests) cannot cross-contaminate.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl CancellationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline and return its token. Registering an id that
    /// already exists replaces the prior token.
    pub fn register(&self, pipeline_id: &str) -> CancelToken {
        let token = CancelToken::new();
        let mut tokens = self.tokens.lock().expect("cancellation registry poisoned");
        tokens.insert(pipeline_id.to_string(), token.clone());
        token
    }

    /// Cancel a pipeline's token with a reason. Unknown ids are a no-op
    /// (returns false) to avoid racing completion-driven unregistration.
    pub fn cancel(&self, pipeline_id: &str, reason: &str) -> bool {
        let tokens = self.tokens.lock().expect("cancellation registry poisoned");
        match tokens.get(pipeline_id) {
            Some(token) => {
                token.cancel(reason);
                true
            }
            None => false,
        }
    }

    /// Remove a pipeline's token. Callers must unregister on every exit path.
    pub fn unregister(&self, pipeline_id: &str) {
        let mut tokens = self.tokens.lock().expect("cancellation registry poisoned");
        tokens.remove(pipeline_id);
    }

    /// Whether a pipeline currently has a registered token
    pub fn is_registered(&self, pipeline_id: &str) -> bool {
        let tokens = self.tokens.lock().expect("cancellation registry poisoned");
        tokens.contains_key(pipeline_id)
    }

    /// Number of in-flight registrations
    pub fn len(&self) -> usize {
        let tokens = self.tokens.lock().expect("cancellation registry poisoned");
        tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_active() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());
    }

    #[test]
    fn test_cancel_sets_reason_once() {
        let token = CancelToken::new();
        token.cancel("first");
        token.cancel("second");

        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("first"));
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel("shared");

        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("shared"));
    }

    #[test]
    fn test_child_stop_observes_parent() {
        let token = CancelToken::new();
        let stop = token.child_stop();
        assert!(!stop.is_cancelled());

        token.cancel("parent");
        assert!(stop.is_cancelled());
    }

    #[test]
    fn test_child_stop_does_not_cancel_parent() {
        let token = CancelToken::new();
        let stop = token.child_stop();
        stop.cancel();

        assert!(stop.is_cancelled());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_registry_register_cancel_unregister() {
        let registry = CancellationRegistry::new();
        let token = registry.register("pipe-1");

        assert!(registry.is_registered("pipe-1"));
        assert!(registry.cancel("pipe-1", "operator request"));
        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("operator request"));

        registry.unregister("pipe-1");
        assert!(!registry.is_registered("pipe-1"));
    }

    #[test]
    fn test_cancel_unknown_id_is_noop() {
        let registry = CancellationRegistry::new();
        assert!(!registry.cancel("missing", "too late"));
    }

    #[test]
    fn test_reregister_replaces_token() {
        let registry = CancellationRegistry::new();
        let first = registry.register("pipe-1");
        let second = registry.register("pipe-1");

        registry.cancel("pipe-1", "stop");
        assert!(!first.is_cancelled());
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
            waiter.reason()
        });

        token.cancel("done waiting");
        let reason = handle.await.unwrap();
        assert_eq!(reason.as_deref(), Some("done waiting"));
    }
}
