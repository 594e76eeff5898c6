//! Anthropic Messages API provider with tool use.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{MedicError, MedicResult};

use super::provider::{
    AIProvider, ChatMessage, ChatOptions, ChatResponse, ContentBlock, StopReason, TokenUsage,
    ToolSpec,
};

/// Anthropic API endpoint
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic API request
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolSpec],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Anthropic API usage
#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Anthropic API response
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    model: String,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

/// Anthropic API error
#[derive(Debug, Deserialize)]
struct AnthropicError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Anthropic API error response
#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a new provider with an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Some(api_key.into()),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Create from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Self {
        Self {
            client: Client::new(),
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Set a custom base URL (tests, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn map_stop_reason(reason: Option<&str>) -> StopReason {
        match reason {
            Some("end_turn") | None => StopReason::EndTurn,
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some(other) => StopReason::Other(other.to_string()),
        }
    }
}

#[async_trait]
impl AIProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn chat(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        options: &ChatOptions,
    ) -> MedicResult<ChatResponse> {
        let api_key = self.api_key.as_ref().ok_or_else(|| MedicError::AiService {
            reason: "ANTHROPIC_API_KEY not set".to_string(),
        })?;

        let request = AnthropicRequest {
            model: &options.model,
            max_tokens: options.max_tokens,
            system: (!system.is_empty()).then_some(system),
            messages,
            tools,
            temperature: options.temperature,
        };

        tracing::debug!(
            model = %options.model,
            messages = messages.len(),
            tools = tools.len(),
            "Calling Anthropic Messages API"
        );

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| MedicError::AiService {
                reason: format!("Anthropic API request failed: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| MedicError::AiService {
            reason: format!("Failed to read Anthropic response: {e}"),
        })?;

        if !status.is_success() {
            if let Ok(error_response) = serde_json::from_str::<AnthropicErrorResponse>(&body) {
                return Err(MedicError::AiService {
                    reason: format!(
                        "Anthropic API error: {} - {}",
                        error_response.error.error_type, error_response.error.message
                    ),
                });
            }
            return Err(MedicError::AiService {
                reason: format!("Anthropic API error ({status}): {body}"),
            });
        }

        let parsed: AnthropicResponse =
            serde_json::from_str(&body).map_err(|e| MedicError::AiService {
                reason: format!("Unexpected Anthropic response shape: {e}"),
            })?;

        Ok(ChatResponse {
            content: parsed.content,
            stop_reason: Self::map_stop_reason(parsed.stop_reason.as_deref()),
            model: parsed.model,
            usage: TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_name() {
        let provider = AnthropicProvider::new("sk-ant-test");
        assert_eq!(provider.name(), "anthropic");
        assert!(provider.is_configured());
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(
            AnthropicProvider::map_stop_reason(Some("end_turn")),
            StopReason::EndTurn
        );
        assert_eq!(
            AnthropicProvider::map_stop_reason(Some("tool_use")),
            StopReason::ToolUse
        );
        assert_eq!(AnthropicProvider::map_stop_reason(None), StopReason::EndTurn);
        assert_eq!(
            AnthropicProvider::map_stop_reason(Some("refusal")),
            StopReason::Other("refusal".to_string())
        );
    }

    #[test]
    fn test_request_serialization_omits_empty_tools() {
        let messages = vec![ChatMessage::user_text("hi")];
        let request = AnthropicRequest {
            model: "claude-sonnet-4-5-20250929",
            max_tokens: 1024,
            system: Some("be brief"),
            messages: &messages,
            tools: &[],
            temperature: None,
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert!(wire.get("tools").is_none());
        assert!(wire.get("temperature").is_none());
        assert_eq!(wire["system"], "be brief");
        assert_eq!(wire["messages"][0]["role"], "user");
        assert_eq!(wire["messages"][0]["content"][0]["type"], "text");
    }

    #[test]
    fn test_response_deserialization_with_tool_use() {
        let body = json!({
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_pods",
                 "input": {"namespace": "prod"}}
            ],
            "model": "claude-sonnet-4-5-20250929",
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 20}
        })
        .to_string();

        let parsed: AnthropicResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.content.len(), 2);
        assert_eq!(parsed.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(parsed.usage.output_tokens, 20);
    }
}
