//! AI integration.
//!
//! [`provider`] defines the provider-neutral conversation and tool-use
//! types plus the [`provider::AIProvider`] seam; [`anthropic`] implements
//! it against the Anthropic Messages API.

pub mod anthropic;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use provider::{
    AIProvider, ChatMessage, ChatOptions, ChatResponse, ChatRole, ContentBlock, StopReason,
    TokenUsage, ToolSpec,
};
