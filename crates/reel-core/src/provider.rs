//! LLM Adapter Strategy
//!
//! Defines the single interface every LLM backend implements. Each adapter
//! owns its wire format completely; the executor only ever sees
//! [`Message`], [`ToolDefinition`] and [`LlmResponse`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reel_core::provider::LlmAdapter;
//!
//! let adapter = OpenAiAdapter::new(config)?;
//! let response = adapter.chat(&memory.all(), registry.list()).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;
use crate::tool::{ToolCall, ToolDefinition};

/// Configuration for LLM generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gpt-4o", "claude-3-5-sonnet-latest", "llama3.2")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 { 4096 }

impl GenerationOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: default_max_tokens(),
        }
    }
}

/// Why a response ended
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Error,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::ToolCalls => write!(f, "tool_calls"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::Error => write!(f, "error"),
        }
    }
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Normalized response from one adapter call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text (may be empty on a pure tool-call turn)
    pub content: String,

    /// Present only when the model requested at least one invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    pub finish_reason: FinishReason,

    /// Token usage statistics (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    /// Plain text completion
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: None,
            finish_reason: FinishReason::Stop,
            usage: None,
        }
    }

    /// Assemble a response from parsed parts.
    ///
    /// `tool_calls` wins over the provider's own stop signal: any parsed call
    /// makes the finish reason [`FinishReason::ToolCalls`], and an empty call
    /// list is dropped.
    pub fn from_parts(content: impl Into<String>, tool_calls: Vec<ToolCall>, native: FinishReason) -> Self {
        let (tool_calls, finish_reason) = if tool_calls.is_empty() {
            let reason = if native == FinishReason::ToolCalls { FinishReason::Stop } else { native };
            (None, reason)
        } else {
            (Some(tool_calls), FinishReason::ToolCalls)
        };

        Self {
            content: content.into(),
            tool_calls,
            finish_reason,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Tool calls, empty when none were requested
    pub fn calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// Whether the executor should dispatch tools for this response
    pub fn wants_tools(&self) -> bool {
        self.finish_reason == FinishReason::ToolCalls && !self.calls().is_empty()
    }
}

/// Strategy trait for LLM backends
///
/// Implement this trait to add support for new providers.
/// The executor works exclusively through this interface.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Provider name for logging (e.g., "openai")
    fn name(&self) -> &str;

    /// Model the adapter is configured for
    fn model(&self) -> &str;

    /// Send the conversation and tool schemas, return one normalized response.
    ///
    /// Transport failures are errors, never an empty response.
    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolArguments;

    #[test]
    fn test_generation_options_defaults() {
        let opts: GenerationOptions = serde_json::from_str(r#"{"model": "llama3.2"}"#).unwrap();
        assert_eq!(opts.max_tokens, 4096);
        assert_eq!(opts.temperature, None);
        assert_eq!(opts, GenerationOptions::new("llama3.2"));
    }

    #[test]
    fn test_tool_calls_override_finish_reason() {
        let call = ToolCall::new("1", "project_create", ToolArguments::new());
        let response = LlmResponse::from_parts("", vec![call], FinishReason::Stop);
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert!(response.wants_tools());

        let response = LlmResponse::from_parts("done", vec![], FinishReason::ToolCalls);
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert!(response.tool_calls.is_none());

        let response = LlmResponse::from_parts("cut off", vec![], FinishReason::Length);
        assert_eq!(response.finish_reason, FinishReason::Length);
    }

    #[test]
    fn test_usage_total_saturates() {
        assert_eq!(TokenUsage::new(30, 12).total_tokens, 42);
        assert_eq!(TokenUsage::new(u32::MAX, 5).total_tokens, u32::MAX);
    }

    #[test]
    fn test_finish_reason_wire_names() {
        assert_eq!(serde_json::to_string(&FinishReason::ToolCalls).unwrap(), "\"tool_calls\"");
        assert_eq!(FinishReason::Length.to_string(), "length");
    }
}
