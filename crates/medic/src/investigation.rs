//! Bounded AI tool-calling investigation.
//!
//! The driver runs a single model conversation that may request diagnostic
//! tool calls before producing a final answer. Every requested call goes
//! through the external [`DiagnosticExecutor`] (the driver itself never
//! touches the cluster) and every outcome, success or failure, is fed back
//! into the conversation as evidence. The only driver-level failure is the
//! model call itself failing, or a run that never produced any text.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ai::{AIProvider, ChatMessage, ChatOptions, ContentBlock, ToolSpec};
use crate::diagnostics::DiagnosticExecutor;
use crate::errors::{MedicError, MedicResult};
use crate::prompts::{build_issue_prompt, INVESTIGATION_SYSTEM_PROMPT};

/// One executed tool invocation, for the caller-visible record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    pub tool: String,
    pub args: Value,
}

/// Outcome of an investigation run.
#[derive(Debug, Clone)]
pub struct InvestigationReport {
    /// The model's terminal message (contains the analysis JSON)
    pub final_message: String,
    /// Model turns consumed
    pub iterations: u32,
    /// Every tool call executed, in order
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Drives the bounded investigation loop.
pub struct InvestigationDriver {
    provider: Arc<dyn AIProvider>,
    executor: Arc<dyn DiagnosticExecutor>,
    tools: Vec<ToolSpec>,
    model: String,
    max_iterations: u32,
}

impl InvestigationDriver {
    pub fn new(
        provider: Arc<dyn AIProvider>,
        executor: Arc<dyn DiagnosticExecutor>,
        tools: Vec<ToolSpec>,
        model: impl Into<String>,
        max_iterations: u32,
    ) -> Self {
        Self {
            provider,
            executor,
            tools,
            model: model.into(),
            max_iterations,
        }
    }

    /// Investigate one issue to a terminal analysis message.
    ///
    /// Reaching the iteration ceiling is not an error: the last text the
    /// model produced is treated as final. The run fails only when the
    /// provider call fails or no text was ever produced.
    pub async fn run(&self, issue: &str) -> MedicResult<InvestigationReport> {
        let options = ChatOptions {
            model: self.model.clone(),
            ..ChatOptions::default()
        };

        let mut messages = vec![ChatMessage::user_text(build_issue_prompt(issue))];
        let mut tool_calls = Vec::new();
        let mut last_text: Option<String> = None;

        for iteration in 1..=self.max_iterations {
            let response = self
                .provider
                .chat(INVESTIGATION_SYSTEM_PROMPT, &messages, &self.tools, &options)
                .await?;

            let text = response.text();
            if !text.trim().is_empty() {
                last_text = Some(text);
            }

            let requests = response.tool_uses();
            if requests.is_empty() {
                let final_message = last_text.ok_or_else(|| MedicError::AiService {
                    reason: "Model finished the investigation without producing any text"
                        .to_string(),
                })?;
                info!(
                    iterations = iteration,
                    tool_calls = tool_calls.len(),
                    "Investigation complete"
                );
                return Ok(InvestigationReport {
                    final_message,
                    iterations: iteration,
                    tool_calls,
                });
            }

            debug!(
                iteration,
                requested = requests.len(),
                "Executing requested diagnostics"
            );

            let mut results = Vec::with_capacity(requests.len());
            for (id, name, input) in &requests {
                tool_calls.push(ToolCallRecord {
                    tool: (*name).to_string(),
                    args: (*input).clone(),
                });
                let result = match self.executor.execute(name, input).await {
                    Ok(output) => ContentBlock::ToolResult {
                        tool_use_id: (*id).to_string(),
                        content: output,
                        is_error: false,
                    },
                    // A failing diagnostic is evidence, not a driver fault.
                    Err(e) => {
                        warn!(tool = %name, error = %e, "Diagnostic failed, feeding back as evidence");
                        ContentBlock::ToolResult {
                            tool_use_id: (*id).to_string(),
                            content: e.to_string(),
                            is_error: true,
                        }
                    }
                };
                results.push(result);
            }

            messages.push(ChatMessage::assistant(response.content.clone()));
            messages.push(ChatMessage::tool_results(results));
        }

        // Ceiling reached: whatever text we last saw is the final answer.
        let final_message = last_text.ok_or_else(|| MedicError::AiService {
            reason: format!(
                "Investigation hit the {}-iteration ceiling without producing any analysis text",
                self.max_iterations
            ),
        })?;
        warn!(
            max_iterations = self.max_iterations,
            "Investigation hit iteration ceiling; using last produced text"
        );
        Ok(InvestigationReport {
            final_message,
            iterations: self.max_iterations,
            tool_calls,
        })
    }
}
