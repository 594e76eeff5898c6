//! AI provider seam and conversation types.
//!
//! Content is modeled as typed blocks rather than plain strings because a
//! tool-calling conversation interleaves text, tool requests, and tool
//! results. The block shapes mirror the Messages API wire format so the
//! Anthropic provider can serialize them directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::MedicResult;

/// Role of a conversation message. System text travels separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One typed piece of message content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain assistant or user text
    Text { text: String },
    /// The model requests a tool invocation
    ToolUse { id: String, name: String, input: Value },
    /// The caller reports a tool outcome back to the model
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

/// A message in a tool-calling conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    /// User message carrying plain text.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// Assistant message carrying the blocks a response produced.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content,
        }
    }

    /// User message carrying tool results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: ChatRole::User,
            content: results,
        }
    }
}

/// A tool the model may call, described by a JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Natural end of the reply
    EndTurn,
    /// The reply requests tool invocations
    ToolUse,
    /// The token budget cut the reply short
    MaxTokens,
    /// Anything else the provider reports
    Other(String),
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One model turn.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub model: String,
    pub usage: TokenUsage,
}

impl ChatResponse {
    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The tool invocations this turn requests, in order.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

/// Generation options for one call.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 4096,
            temperature: None,
        }
    }
}

/// Trait for AI providers capable of tool-calling conversations.
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Provider name (e.g., "anthropic").
    fn name(&self) -> &'static str;

    /// Check if the provider is configured (has credentials).
    fn is_configured(&self) -> bool;

    /// Run one model turn over the conversation.
    async fn chat(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        options: &ChatOptions,
    ) -> MedicResult<ChatResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_block_wire_format() {
        let block = ContentBlock::ToolUse {
            id: "toolu_1".to_string(),
            name: "get_pods".to_string(),
            input: json!({"namespace": "prod"}),
        };
        let wire = serde_json::to_value(&block).unwrap();
        assert_eq!(wire["type"], "tool_use");
        assert_eq!(wire["name"], "get_pods");
        assert_eq!(wire["input"]["namespace"], "prod");
    }

    #[test]
    fn test_tool_result_omits_false_error_flag() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: "3 pods".to_string(),
            is_error: false,
        };
        let wire = serde_json::to_value(&block).unwrap();
        assert!(wire.get("is_error").is_none());

        let block = ContentBlock::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: "denied".to_string(),
            is_error: true,
        };
        let wire = serde_json::to_value(&block).unwrap();
        assert_eq!(wire["is_error"], true);
    }

    #[test]
    fn test_response_text_and_tool_uses() {
        let response = ChatResponse {
            content: vec![
                ContentBlock::Text {
                    text: "Checking pods.".to_string(),
                },
                ContentBlock::ToolUse {
                    id: "toolu_1".to_string(),
                    name: "get_pods".to_string(),
                    input: json!({}),
                },
            ],
            stop_reason: StopReason::ToolUse,
            model: "test".to_string(),
            usage: TokenUsage::default(),
        };
        assert_eq!(response.text(), "Checking pods.");
        assert_eq!(response.tool_uses().len(), 1);
        assert_eq!(response.tool_uses()[0].1, "get_pods");
    }
}
