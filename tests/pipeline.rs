//! End-to-end pipeline tests through the orchestrator facade.
//!
//! Covers the gate-then-execute path, fail-fast abort semantics, audit
//! trail contents, and registry hygiene on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use plangate::{
    metric, ExecutionError, NodeSpec, Orchestrator, OrchestratorConfig, Plan, RecordingEmitter,
    VerificationContext,
};
use serde_json::{json, Value};

fn orchestrator(config: OrchestratorConfig) -> (Orchestrator, Arc<RecordingEmitter>) {
    let sink = Arc::new(RecordingEmitter::new());
    (Orchestrator::with_sink(config, sink.clone()), sink)
}

fn sleep_node(id: &str, millis: u64) -> NodeSpec {
    NodeSpec::from_fn(id, move |input: Value| async move {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(input)
    })
}

#[tokio::test]
async fn test_three_fast_nodes_complete_well_inside_budget() {
    let (orch, sink) = orchestrator(OrchestratorConfig::default());
    let nodes = vec![
        sleep_node("node1", 50),
        sleep_node("node2", 50),
        sleep_node("node3", 50),
    ];

    let started = Instant::now();
    let out = orch
        .run(
            "pipe-fast",
            &Plan::new("summarize", json!({})),
            &VerificationContext::default(),
            &nodes,
            json!("seed"),
        )
        .await
        .unwrap();

    assert_eq!(out, json!("seed"));
    assert!(started.elapsed() < Duration::from_millis(300));

    let audits = sink.audits();
    let pipeline_audit = audits.last().expect("pipeline audit present");
    assert_eq!(pipeline_audit.status, "succeeded");
    assert_eq!(pipeline_audit.completed_nodes, vec!["node1", "node2", "node3"]);
}

#[tokio::test]
async fn test_fail_fast_abandons_nodes_after_a_timeout() {
    let mut config = OrchestratorConfig::default();
    config.timeouts.node_timeout_ms = 100;
    config.timeouts.pipeline_timeout_ms = 2_000;
    config.timeouts.cleanup_grace_ms = 20;
    let (orch, sink) = orchestrator(config);

    let third_ran = Arc::new(AtomicBool::new(false));
    let probe = third_ran.clone();
    let nodes = vec![
        sleep_node("node1", 10),
        sleep_node("node2", 500),
        NodeSpec::from_fn("node3", move |input: Value| {
            let probe = probe.clone();
            async move {
                probe.store(true, Ordering::SeqCst);
                Ok(input)
            }
        }),
    ];

    let err = orch
        .run(
            "pipe-abort",
            &Plan::new("summarize", json!({})),
            &VerificationContext::default(),
            &nodes,
            json!(null),
        )
        .await
        .unwrap_err();

    match err {
        ExecutionError::NodeTimeout { node_id, .. } => assert_eq!(node_id, "node2"),
        other => panic!("expected node timeout, got {:?}", other),
    }
    assert!(!third_ran.load(Ordering::SeqCst), "node3 must never start");

    let pipeline_audit = sink.audits().last().cloned().expect("pipeline audit");
    assert_eq!(pipeline_audit.status, "node_timed_out");
    assert_eq!(pipeline_audit.completed_nodes, vec!["node1"]);
}

#[tokio::test]
async fn test_pipeline_audit_carries_gating_plan_hash() {
    let (orch, sink) = orchestrator(OrchestratorConfig::default());
    let plan = Plan::new("summarize", json!({"topic": "tides"}));
    let nodes = vec![sleep_node("only", 10)];

    orch.run(
        "pipe-hash",
        &plan,
        &VerificationContext::default(),
        &nodes,
        json!(null),
    )
    .await
    .unwrap();

    let pipeline_audit = sink.audits().last().cloned().expect("pipeline audit");
    assert_eq!(pipeline_audit.plan_hash.as_deref(), Some(plan.hash().as_str()));
}

#[tokio::test]
async fn test_failed_pipeline_audit_still_correlates_by_hash() {
    let mut config = OrchestratorConfig::default();
    config.timeouts.node_timeout_ms = 50;
    config.timeouts.cleanup_grace_ms = 20;
    let (orch, sink) = orchestrator(config);
    let plan = Plan::new("summarize", json!({}));

    orch.run(
        "pipe-hash-timeout",
        &plan,
        &VerificationContext::default(),
        &[sleep_node("slow", 500)],
        json!(null),
    )
    .await
    .unwrap_err();

    let pipeline_audit = sink.audits().last().cloned().expect("pipeline audit");
    assert_eq!(pipeline_audit.status, "node_timed_out");
    assert_eq!(pipeline_audit.plan_hash.as_deref(), Some(plan.hash().as_str()));
}

#[tokio::test]
async fn test_registry_released_after_success() {
    let (orch, _) = orchestrator(OrchestratorConfig::default());
    let nodes = vec![sleep_node("only", 10)];

    orch.run(
        "pipe-clean",
        &Plan::new("summarize", json!({})),
        &VerificationContext::default(),
        &nodes,
        json!(null),
    )
    .await
    .unwrap();

    assert!(!orch.registry().is_registered("pipe-clean"));
    assert!(orch.registry().is_empty());
}

#[tokio::test]
async fn test_registry_released_after_timeout() {
    let mut config = OrchestratorConfig::default();
    config.timeouts.node_timeout_ms = 50;
    config.timeouts.cleanup_grace_ms = 20;
    let (orch, _) = orchestrator(config);

    let nodes = vec![sleep_node("slow", 500)];
    orch.run(
        "pipe-timeout",
        &Plan::new("summarize", json!({})),
        &VerificationContext::default(),
        &nodes,
        json!(null),
    )
    .await
    .unwrap_err();

    assert!(!orch.registry().is_registered("pipe-timeout"));
}

#[tokio::test]
async fn test_registry_released_after_node_failure() {
    let (orch, _) = orchestrator(OrchestratorConfig::default());
    let nodes = vec![NodeSpec::from_fn("broken", |_: Value| async move {
        anyhow::bail!("boom")
    })];

    orch.run(
        "pipe-broken",
        &Plan::new("summarize", json!({})),
        &VerificationContext::default(),
        &nodes,
        json!(null),
    )
    .await
    .unwrap_err();

    assert!(!orch.registry().is_registered("pipe-broken"));
}

#[tokio::test]
async fn test_empty_node_list_returns_initial_input() {
    let (orch, sink) = orchestrator(OrchestratorConfig::default());

    let out = orch
        .run(
            "pipe-empty",
            &Plan::new("summarize", json!({})),
            &VerificationContext::default(),
            &[],
            json!({"untouched": true}),
        )
        .await
        .unwrap();

    assert_eq!(out, json!({"untouched": true}));
    let pipeline_audit = sink.audits().last().cloned().expect("pipeline audit");
    assert_eq!(pipeline_audit.status, "succeeded");
    assert!(pipeline_audit.completed_nodes.is_empty());
}

#[tokio::test]
async fn test_metrics_emitted_per_node_and_per_pipeline() {
    let (orch, sink) = orchestrator(OrchestratorConfig::default());
    let nodes = vec![sleep_node("n1", 5), sleep_node("n2", 5)];

    orch.run(
        "pipe-metrics",
        &Plan::new("summarize", json!({})),
        &VerificationContext::default(),
        &nodes,
        json!(null),
    )
    .await
    .unwrap();

    assert_eq!(
        sink.counter_total_with(metric::NODE_EXECUTIONS_TOTAL, "status", "success"),
        2
    );
    assert_eq!(
        sink.counter_total_with(metric::PIPELINE_EXECUTIONS_TOTAL, "status", "success"),
        1
    );
    assert_eq!(sink.histogram_samples(metric::NODE_DURATION_MS).len(), 2);
    assert_eq!(sink.histogram_samples(metric::PIPELINE_DURATION_MS).len(), 1);
}

#[tokio::test]
async fn test_concurrent_pipelines_do_not_interfere() {
    let (orch, _) = orchestrator(OrchestratorConfig::default());
    let orch = Arc::new(orch);

    let mut handles = Vec::new();
    for i in 0..4 {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move {
            let nodes = vec![sleep_node("step", 20)];
            orch.run(
                &format!("pipe-{i}"),
                &Plan::new("summarize", json!({})),
                &VerificationContext::default(),
                &nodes,
                json!(i),
            )
            .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let out = handle.await.unwrap().unwrap();
        assert_eq!(out, json!(i));
    }
    assert!(orch.registry().is_empty());
}
