//! Diagnostic tool catalog and executors.
//!
//! The investigation may only touch the cluster through this fixed catalog
//! of read-only operations. [`DiagnosticExecutor`] is the seam the driver
//! calls through; [`KubectlExecutor`] is the default implementation, which
//! maps each tool onto an allow-listed `kubectl` argv. Arguments become
//! discrete argv entries, never a shell string, and no mutating verb is
//! reachable.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use crate::ai::ToolSpec;
use crate::errors::{MedicError, MedicResult};

/// The fixed catalog of read-only diagnostic tools offered to the model.
pub fn diagnostic_tools() -> Vec<ToolSpec> {
    vec![
        tool(
            "get_pods",
            "List pods in a namespace with their status, restarts, and node placement",
            json!({
                "type": "object",
                "properties": {
                    "namespace": { "type": "string", "description": "Namespace to list (default: default)" },
                    "selector": { "type": "string", "description": "Label selector, e.g. app=web" }
                }
            }),
        ),
        tool(
            "describe_pod",
            "Describe one pod: containers, state, last termination reason, events",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Pod name" },
                    "namespace": { "type": "string", "description": "Namespace (default: default)" }
                },
                "required": ["name"]
            }),
        ),
        tool(
            "get_pod_logs",
            "Fetch recent logs from a pod, optionally from the previous (crashed) container",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Pod name" },
                    "namespace": { "type": "string", "description": "Namespace (default: default)" },
                    "tail": { "type": "integer", "description": "Number of trailing lines (default: 100)" },
                    "previous": { "type": "boolean", "description": "Read the previous container instance" }
                },
                "required": ["name"]
            }),
        ),
        tool(
            "get_events",
            "List recent events in a namespace, oldest first",
            json!({
                "type": "object",
                "properties": {
                    "namespace": { "type": "string", "description": "Namespace (default: default)" }
                }
            }),
        ),
        tool(
            "get_deployments",
            "List deployments in a namespace with replica readiness",
            json!({
                "type": "object",
                "properties": {
                    "namespace": { "type": "string", "description": "Namespace (default: default)" }
                }
            }),
        ),
        tool(
            "describe_deployment",
            "Describe one deployment: strategy, conditions, replica sets, events",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Deployment name" },
                    "namespace": { "type": "string", "description": "Namespace (default: default)" }
                },
                "required": ["name"]
            }),
        ),
        tool(
            "get_services",
            "List services in a namespace with cluster IPs and ports",
            json!({
                "type": "object",
                "properties": {
                    "namespace": { "type": "string", "description": "Namespace (default: default)" }
                }
            }),
        ),
        tool(
            "get_nodes",
            "List cluster nodes with status, roles, and versions",
            json!({ "type": "object", "properties": {} }),
        ),
        tool(
            "top_pods",
            "Show current CPU and memory usage per pod in a namespace",
            json!({
                "type": "object",
                "properties": {
                    "namespace": { "type": "string", "description": "Namespace (default: default)" }
                }
            }),
        ),
    ]
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Seam for executing one diagnostic tool call.
///
/// An `Err` from an implementation is an operation failure, not a driver
/// fault: the investigation records it as evidence and continues.
#[async_trait]
pub trait DiagnosticExecutor: Send + Sync {
    async fn execute(&self, tool: &str, args: &Value) -> MedicResult<String>;
}

/// Default executor: shells out to `kubectl` with read-only argv.
#[derive(Debug, Clone)]
pub struct KubectlExecutor {
    kubectl_bin: String,
}

impl Default for KubectlExecutor {
    fn default() -> Self {
        Self {
            kubectl_bin: "kubectl".to_string(),
        }
    }
}

impl KubectlExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a non-default kubectl binary (tests, vendored builds).
    pub fn with_binary(bin: impl Into<String>) -> Self {
        Self {
            kubectl_bin: bin.into(),
        }
    }

    fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
        args.get(key).and_then(Value::as_str)
    }

    fn namespace(args: &Value) -> &str {
        Self::str_arg(args, "namespace").unwrap_or("default")
    }

    fn require_name<'a>(args: &'a Value, tool: &str) -> MedicResult<&'a str> {
        Self::str_arg(args, "name").ok_or_else(|| MedicError::Diagnostic {
            reason: format!("{tool} requires a 'name' argument"),
        })
    }

    /// Build the argv for a tool call. Pure; unit-tested without a cluster.
    fn build_argv(tool: &str, args: &Value) -> MedicResult<Vec<String>> {
        let ns = Self::namespace(args).to_string();

        let argv: Vec<String> = match tool {
            "get_pods" => {
                let mut argv = vec!["get".into(), "pods".into(), "-n".into(), ns];
                if let Some(selector) = Self::str_arg(args, "selector") {
                    argv.push("-l".into());
                    argv.push(selector.into());
                }
                argv.push("-o".into());
                argv.push("wide".into());
                argv
            }
            "describe_pod" => {
                let name = Self::require_name(args, tool)?;
                vec!["describe".into(), "pod".into(), name.into(), "-n".into(), ns]
            }
            "get_pod_logs" => {
                let name = Self::require_name(args, tool)?;
                let tail = args.get("tail").and_then(Value::as_u64).unwrap_or(100);
                let mut argv = vec![
                    "logs".into(),
                    name.into(),
                    "-n".into(),
                    ns,
                    format!("--tail={tail}"),
                ];
                if args.get("previous").and_then(Value::as_bool).unwrap_or(false) {
                    argv.push("--previous".into());
                }
                argv
            }
            "get_events" => vec![
                "get".into(),
                "events".into(),
                "-n".into(),
                ns,
                "--sort-by=.lastTimestamp".into(),
            ],
            "get_deployments" => {
                vec!["get".into(), "deployments".into(), "-n".into(), ns, "-o".into(), "wide".into()]
            }
            "describe_deployment" => {
                let name = Self::require_name(args, tool)?;
                vec![
                    "describe".into(),
                    "deployment".into(),
                    name.into(),
                    "-n".into(),
                    ns,
                ]
            }
            "get_services" => {
                vec!["get".into(), "services".into(), "-n".into(), ns, "-o".into(), "wide".into()]
            }
            "get_nodes" => vec!["get".into(), "nodes".into(), "-o".into(), "wide".into()],
            "top_pods" => vec!["top".into(), "pods".into(), "-n".into(), ns],
            other => {
                return Err(MedicError::Diagnostic {
                    reason: format!("Unknown diagnostic tool '{other}'"),
                });
            }
        };

        Ok(argv)
    }
}

#[async_trait]
impl DiagnosticExecutor for KubectlExecutor {
    async fn execute(&self, tool: &str, args: &Value) -> MedicResult<String> {
        let argv = Self::build_argv(tool, args)?;
        debug!(tool = %tool, argv = ?argv, "Running diagnostic");

        let output = Command::new(&self.kubectl_bin)
            .args(&argv)
            .output()
            .await
            .map_err(|e| MedicError::Diagnostic {
                reason: format!("Failed to run kubectl: {e}"),
            })?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            if stdout.trim().is_empty() {
                Ok("(no output)".to_string())
            } else {
                Ok(stdout)
            }
        } else {
            Err(MedicError::Diagnostic {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
