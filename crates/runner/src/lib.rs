//! Shared shell-command execution.
//!
//! This crate runs ordered batches of shell commands with a
//! continue-on-error discipline: every command in a batch is attempted
//! regardless of earlier failures, and each one produces exactly one
//! [`ExecutionResult`] in input order. Remediation and manifest tooling
//! both build on it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use runner::{execute_batch, LocalShell};
//!
//! # async fn run() {
//! let shell = LocalShell::new();
//! let report = execute_batch(
//!     &shell,
//!     &["kubectl rollout restart deployment/api -n prod".to_string()],
//! )
//! .await;
//! assert_eq!(report.results.len(), 1);
//! # }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod error;

pub use error::{RunnerError, RunnerResult};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

/// Outcome of one attempted command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// The command string as it was executed (after normalization)
    pub action: String,
    /// Whether the command exited successfully
    pub success: bool,
    /// Captured stdout, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Error description, present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the command finished
    pub timestamp: DateTime<Utc>,
}

/// Aggregate outcome of a command batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// One result per input command, in input order
    pub results: Vec<ExecutionResult>,
    /// True iff every command succeeded
    pub overall_success: bool,
}

/// Seam for executing a single shell command.
///
/// Implementations return captured stdout on success and a typed error on
/// failure. Batch semantics (ordering, continue-on-error) live in
/// [`execute_batch`], not in implementations.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run one command string and capture its output.
    async fn run_command(&self, command: &str) -> RunnerResult<String>;
}

/// Runs commands through the local shell (`sh -c`).
#[derive(Debug, Clone, Default)]
pub struct LocalShell {
    _priv: (),
}

impl LocalShell {
    /// Create a new local shell runner.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommandRunner for LocalShell {
    async fn run_command(&self, command: &str) -> RunnerResult<String> {
        debug!(command = %command, "Executing shell command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| RunnerError::Spawn {
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            match output.status.code() {
                Some(code) => Err(RunnerError::NonZeroExit { code, stderr }),
                None => Err(RunnerError::Terminated { stderr }),
            }
        }
    }
}

/// Strip escape artifacts that AI-generated commands sometimes carry.
///
/// Model output occasionally arrives with quote characters still
/// backslash-escaped from an intermediate JSON encoding
/// (`kubectl get pods -l \"app=web\"`). The shell would pass those
/// backslashes through verbatim, so they are removed before execution.
pub fn normalize_command(command: &str) -> String {
    command
        .replace("\\\"", "\"")
        .replace("\\'", "'")
        .trim()
        .to_string()
}

/// Run every command in order, continuing past failures.
///
/// Produces exactly one [`ExecutionResult`] per input command, in input
/// order. `overall_success` is the logical AND of the per-command success
/// flags. Commands are never retried here; a retry is a fresh batch.
pub async fn execute_batch(runner: &dyn CommandRunner, commands: &[String]) -> BatchReport {
    let mut results = Vec::with_capacity(commands.len());

    for command in commands {
        let normalized = normalize_command(command);
        match runner.run_command(&normalized).await {
            Ok(stdout) => {
                results.push(ExecutionResult {
                    action: normalized,
                    success: true,
                    output: Some(stdout),
                    error: None,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                warn!(command = %normalized, error = %e, "Command failed, continuing batch");
                results.push(ExecutionResult {
                    action: normalized,
                    success: false,
                    output: None,
                    error: Some(e.to_string()),
                    timestamp: Utc::now(),
                });
            }
        }
    }

    let overall_success = results.iter().all(|r| r.success);
    BatchReport {
        results,
        overall_success,
    }
}
