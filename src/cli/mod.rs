//! Command-line interface for plangate.
//!
//! - `verify`: gate a plan JSON (file or stdin) and print the outcome
//! - `hash`: print the canonical digest of a plan
//! - `demo`: run a built-in pipeline through the real executors

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::core::pipeline::NodeSpec;
use crate::core::Orchestrator;
use crate::domain::VerificationContext;

/// Plan-gated pipeline orchestrator
#[derive(Parser)]
#[command(name = "plangate", version, about)]
pub struct Cli {
    /// Path to a YAML config file (environment overrides still apply)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Verify a plan without executing anything
    Verify {
        /// Plan JSON file (reads stdin when omitted)
        file: Option<PathBuf>,

        /// User id recorded in the verification context
        #[arg(long)]
        user: Option<String>,

        /// Session id recorded in the verification context
        #[arg(long)]
        session: Option<String>,
    },

    /// Print the canonical hash of a plan
    Hash {
        /// Plan JSON file (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Run a built-in demo pipeline under the configured budgets
    Demo {
        /// Number of nodes in the demo pipeline
        #[arg(long, default_value_t = 3)]
        nodes: usize,

        /// Per-node simulated work in milliseconds
        #[arg(long, default_value_t = 50)]
        delay_ms: u64,
    },
}

impl Cli {
    /// Execute the parsed command
    pub async fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => OrchestratorConfig::from_file(path)?.with_env_overrides()?,
            None => OrchestratorConfig::from_env()?,
        };

        match self.command {
            Command::Verify {
                file,
                user,
                session,
            } => {
                let raw = read_plan(file.as_deref())?;
                let orchestrator = Orchestrator::new(config);
                let context = VerificationContext::new(user, session);
                let outcome = orchestrator.verify_value(&raw, &context);

                println!("{}", serde_json::to_string_pretty(&outcome)?);
                if !outcome.allow {
                    std::process::exit(1);
                }
                Ok(())
            }

            Command::Hash { file } => {
                let raw = read_plan(file.as_deref())?;
                let plan: crate::domain::Plan = serde_json::from_value(raw)
                    .context("Plan must have a string 'action' and optional 'params' object")?;
                println!("{}", plan.hash());
                Ok(())
            }

            Command::Demo { nodes, delay_ms } => {
                let orchestrator = Orchestrator::new(config);
                let pipeline_id = Uuid::new_v4().to_string();

                let specs: Vec<NodeSpec> = (0..nodes)
                    .map(|i| {
                        NodeSpec::from_fn(format!("demo_node_{}", i + 1), move |input: Value| {
                            async move {
                                tokio::time::sleep(std::time::Duration::from_millis(delay_ms))
                                    .await;
                                let hops = input
                                    .get("hops")
                                    .and_then(Value::as_u64)
                                    .unwrap_or(0);
                                Ok(json!({"hops": hops + 1}))
                            }
                        })
                    })
                    .collect();

                let plan = crate::domain::Plan::new("demo", json!({"nodes": nodes}));
                let output = orchestrator
                    .run(
                        &pipeline_id,
                        &plan,
                        &VerificationContext::default(),
                        &specs,
                        json!({"hops": 0}),
                    )
                    .await
                    .map_err(|e| anyhow::anyhow!(e.to_string()))?;

                println!("{}", serde_json::to_string_pretty(&output)?);
                Ok(())
            }
        }
    }
}

/// Read a plan JSON value from a file or stdin
fn read_plan(path: Option<&std::path::Path>) -> Result<Value> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read plan from stdin")?;
            buf
        }
    };

    serde_json::from_str(&content).context("Plan is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verify_args() {
        let cli = Cli::parse_from(["plangate", "verify", "plan.json", "--user", "u1"]);
        match cli.command {
            Command::Verify { file, user, .. } => {
                assert_eq!(file, Some(PathBuf::from("plan.json")));
                assert_eq!(user.as_deref(), Some("u1"));
            }
            _ => panic!("expected verify command"),
        }
    }

    #[test]
    fn test_demo_defaults() {
        let cli = Cli::parse_from(["plangate", "demo"]);
        match cli.command {
            Command::Demo { nodes, delay_ms } => {
                assert_eq!(nodes, 3);
                assert_eq!(delay_ms, 50);
            }
            _ => panic!("expected demo command"),
        }
    }
}
