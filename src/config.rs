//! Configuration for the orchestrator.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (PLANGATE_*)
//! 2. Config file (YAML, passed explicitly)
//! 3. Defaults
//!
//! All configuration is consumed at construction time; there is no hot
//! reload. Configs are plain values owned by the orchestrator instance,
//! never a process-wide singleton, so independent instances (e.g. in tests)
//! cannot contaminate each other.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Time budgets for node and pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Per-node budget in milliseconds (default: 200)
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,

    /// Whole-pipeline budget in milliseconds (default: 500)
    #[serde(default = "default_pipeline_timeout_ms")]
    pub pipeline_timeout_ms: u64,

    /// How long to wait for in-flight work to unwind after a timeout fires
    /// before reporting failure regardless (default: 100)
    #[serde(default = "default_cleanup_grace_ms")]
    pub cleanup_grace_ms: u64,

    /// Whether a plain node error aborts the pipeline (default: true).
    /// Timeouts and cancellations are always fatal.
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
}

fn default_node_timeout_ms() -> u64 {
    200
}
fn default_pipeline_timeout_ms() -> u64 {
    500
}
fn default_cleanup_grace_ms() -> u64 {
    100
}
fn default_fail_fast() -> bool {
    true
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            node_timeout_ms: default_node_timeout_ms(),
            pipeline_timeout_ms: default_pipeline_timeout_ms(),
            cleanup_grace_ms: default_cleanup_grace_ms(),
            fail_fast: default_fail_fast(),
        }
    }
}

impl TimeoutConfig {
    /// Per-node budget as a [`Duration`]
    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }

    /// Whole-pipeline budget as a [`Duration`]
    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline_timeout_ms)
    }

    /// Cleanup grace window as a [`Duration`]
    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }
}

/// Resource limits and allow-lists consulted by the plan verifier.
///
/// Every field feeds a pure check; none of them are read after
/// construction, which is what keeps verification deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Maximum `estimated_time_seconds` a plan may declare (default: 300)
    #[serde(default = "default_max_execution_time_secs")]
    pub max_execution_time_secs: u64,

    /// Maximum `estimated_memory_mb` a plan may declare (default: 1024)
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u64,

    /// Maximum `iterations` a plan may declare (default: 1000)
    #[serde(default = "default_max_loop_iterations")]
    pub max_loop_iterations: u64,

    /// Hard ceiling on `batch_size` (default: 1000)
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: u64,

    /// Hard ceiling on `recursion_depth` (default: 10)
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: u64,

    /// Domains outbound calls may target (exact host match)
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,

    /// Whether the ethics guard runs (default: true)
    #[serde(default = "default_ethics_guard")]
    pub ethics_guard: bool,

    /// Actions that skip verification checks after the structure check.
    /// Strictly additive: bypass never weakens the deny-by-default posture
    /// for any action outside this set, and bypassed plans are still audited.
    #[serde(default)]
    pub bypass_actions: Vec<String>,
}

fn default_max_execution_time_secs() -> u64 {
    300
}
fn default_max_memory_mb() -> u64 {
    1024
}
fn default_max_loop_iterations() -> u64 {
    1000
}
fn default_max_batch_size() -> u64 {
    1000
}
fn default_max_recursion_depth() -> u64 {
    10
}
fn default_allowed_domains() -> Vec<String> {
    vec!["api.openai.com".to_string(), "api.anthropic.com".to_string()]
}
fn default_ethics_guard() -> bool {
    true
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_execution_time_secs: default_max_execution_time_secs(),
            max_memory_mb: default_max_memory_mb(),
            max_loop_iterations: default_max_loop_iterations(),
            max_batch_size: default_max_batch_size(),
            max_recursion_depth: default_max_recursion_depth(),
            allowed_domains: default_allowed_domains(),
            ethics_guard: default_ethics_guard(),
            bypass_actions: Vec::new(),
        }
    }
}

/// Top-level configuration for one orchestrator instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub verifier: VerifierConfig,
}

impl OrchestratorConfig {
    /// Parse a config from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config YAML")
    }

    /// Load a config from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Defaults with `PLANGATE_*` environment overrides applied
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `PLANGATE_*` environment variables on top of this config
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = env_parse("PLANGATE_NODE_TIMEOUT_MS")? {
            self.timeouts.node_timeout_ms = v;
        }
        if let Some(v) = env_parse("PLANGATE_PIPELINE_TIMEOUT_MS")? {
            self.timeouts.pipeline_timeout_ms = v;
        }
        if let Some(v) = env_parse("PLANGATE_CLEANUP_GRACE_MS")? {
            self.timeouts.cleanup_grace_ms = v;
        }
        if let Some(v) = env_parse("PLANGATE_FAIL_FAST")? {
            self.timeouts.fail_fast = v;
        }
        if let Some(v) = env_parse("PLANGATE_MAX_EXECUTION_TIME_SECS")? {
            self.verifier.max_execution_time_secs = v;
        }
        if let Some(v) = env_parse("PLANGATE_MAX_MEMORY_MB")? {
            self.verifier.max_memory_mb = v;
        }
        if let Some(v) = env_parse("PLANGATE_MAX_LOOP_ITERATIONS")? {
            self.verifier.max_loop_iterations = v;
        }
        if let Some(v) = env_parse("PLANGATE_ETHICS_GUARD")? {
            self.verifier.ethics_guard = v;
        }
        if let Ok(domains) = std::env::var("PLANGATE_ALLOWED_DOMAINS") {
            self.verifier.allowed_domains = domains
                .split(',')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect();
        }
        Ok(self)
    }
}

/// Read and parse an environment variable, if set
fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => {
            let value = raw
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", name, raw, e))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}
