//! Medic MCP Server - Exposes cluster remediation via Model Context Protocol.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]

use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use medic::{
    AnthropicProvider, FileSessionStore, KubectlExecutor, MedicConfig, RemediateRequest,
    RemediationOrchestrator,
};
use runner::LocalShell;

/// JSON-RPC request structure
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

/// JSON-RPC response structure
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// MCP server state
struct McpServer {
    orchestrator: RemediationOrchestrator,
}

impl McpServer {
    fn new(config: MedicConfig) -> Self {
        let orchestrator = RemediationOrchestrator::new(
            Arc::new(FileSessionStore::new(&config.session_dir)),
            Arc::new(AnthropicProvider::from_env()),
            Arc::new(KubectlExecutor::new()),
            Arc::new(LocalShell::new()),
            config,
        );
        Self { orchestrator }
    }

    async fn handle_request(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => Self::handle_initialize(id),
            "tools/list" => Self::handle_tools_list(id),
            "tools/call" => self.handle_tool_call(id, request.params.as_ref()).await,
            _ => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id,
                result: None,
                error: Some(JsonRpcError {
                    code: -32601,
                    message: "Method not found".to_string(),
                    data: None,
                }),
            },
        }
    }

    fn handle_initialize(id: Value) -> JsonRpcResponse {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "medic-mcp",
                    "version": env!("CARGO_PKG_VERSION")
                }
            })),
            error: None,
        }
    }

    fn handle_tools_list(id: Value) -> JsonRpcResponse {
        let tools = json!({
            "tools": [
                {
                    "name": "remediate_cluster",
                    "description": "Investigate a cluster symptom with read-only diagnostics, propose a vetted fix, and (with approval or under automatic policy) execute it. Call with an issue to open a session; call again with sessionId and executeChoice to continue one.",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "issue": {
                                "type": "string",
                                "description": "Natural-language symptom description (required unless continuing a session)"
                            },
                            "mode": {
                                "type": "string",
                                "enum": ["manual", "automatic"],
                                "description": "Approval mode (default: manual)"
                            },
                            "confidenceThreshold": {
                                "type": "number",
                                "description": "Confidence required for unattended execution (default: 0.8)"
                            },
                            "maxRiskLevel": {
                                "type": "string",
                                "enum": ["low", "medium", "high"],
                                "description": "Highest risk allowed for unattended execution (default: low)"
                            },
                            "executeChoice": {
                                "type": "integer",
                                "enum": [1, 2],
                                "description": "Continue a session: 1 = execute now, 2 = execute via the calling agent"
                            },
                            "sessionId": {
                                "type": "string",
                                "description": "Session to continue (required with executeChoice)"
                            },
                            "executedCommands": {
                                "type": "array",
                                "items": { "type": "string" },
                                "description": "With executeChoice 1: commands to run instead of the stored plan. With executeChoice 2: commands the agent already ran, for the record."
                            }
                        }
                    }
                }
            ]
        });

        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(tools),
            error: None,
        }
    }

    async fn handle_tool_call(&self, id: Value, params: Option<&Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id,
                result: None,
                error: Some(JsonRpcError {
                    code: -32602,
                    message: "Missing params".to_string(),
                    data: None,
                }),
            };
        };

        let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let result = match tool_name {
            "remediate_cluster" => self.tool_remediate_cluster(arguments).await,
            _ => Err(format!("Unknown tool: {tool_name}")),
        };

        match result {
            Ok(content) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id,
                result: Some(json!({
                    "content": [{
                        "type": "text",
                        "text": content
                    }]
                })),
                error: None,
            },
            Err(e) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id,
                result: Some(json!({
                    "content": [{
                        "type": "text",
                        "text": format!("Error: {}", e)
                    }],
                    "isError": true
                })),
                error: None,
            },
        }
    }

    async fn tool_remediate_cluster(&self, arguments: Value) -> Result<String, String> {
        let request: RemediateRequest =
            serde_json::from_value(arguments).map_err(|e| format!("Invalid arguments: {e}"))?;

        let response = self
            .orchestrator
            .handle(request)
            .await
            .map_err(|e| e.to_string())?;

        Ok(serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string()))
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing to stderr; stdout is the protocol channel
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = std::env::var("MEDIC_CONFIG").map_or_else(
        |_| MedicConfig::from_env(),
        |path| MedicConfig::load(&path).unwrap_or_else(|_| MedicConfig::from_env()),
    );

    let server = McpServer::new(config);

    // Read from stdin, write to stdout (JSON-RPC over stdio)
    let stdin = std::io::stdin();
    let reader = BufReader::new(stdin.lock());
    let mut stdout = std::io::stdout();

    for line in reader.lines() {
        let Ok(line) = line else { break };

        if line.is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                let error_response = JsonRpcResponse {
                    jsonrpc: "2.0".to_string(),
                    id: Value::Null,
                    result: None,
                    error: Some(JsonRpcError {
                        code: -32700,
                        message: format!("Parse error: {e}"),
                        data: None,
                    }),
                };
                let _ = writeln!(
                    stdout,
                    "{}",
                    serde_json::to_string(&error_response).unwrap()
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let response = server.handle_request(&request).await;
        let _ = writeln!(stdout, "{}", serde_json::to_string(&response).unwrap());
        let _ = stdout.flush();
    }
}
