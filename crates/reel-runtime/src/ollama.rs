//! Ollama Adapter
//!
//! Local models through `/api/chat`. Tool use is simulated in the prompt:
//! tool descriptions ride in the system message and calls come back as JSON
//! in the reply text, so any chat model can drive the executor.

use async_trait::async_trait;
use reel_core::{
    FinishReason, GenerationOptions, LlmAdapter, LlmResponse, Message, Result, Role, TokenUsage,
    ToolDefinition,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::http::{build_client, count, endpoint, send_json};
use crate::prompt_tools::{parse_reply, render_tool_calls, tool_prompt};

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const OLLAMA_MODEL: &str = "llama3.2";

/// Ollama adapter configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama server URL, host and port
    pub base_url: String,

    pub generation: GenerationOptions,

    /// Local models can be slow to load; keep this generous
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: OLLAMA_BASE_URL.into(),
            generation: GenerationOptions::new(OLLAMA_MODEL),
            timeout_secs: 300,
        }
    }
}

/// Ollama chat adapter
pub struct OllamaAdapter {
    client: Client,
    config: OllamaConfig,
}

impl OllamaAdapter {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    /// Create with default localhost settings
    pub fn localhost() -> Result<Self> {
        Self::new(OllamaConfig::default())
    }

    /// Convert agent messages to Ollama format
    fn convert_messages(messages: &[Message], tools: &[ToolDefinition]) -> Vec<Value> {
        let tool_section = (!tools.is_empty()).then(|| tool_prompt(tools));
        let mut converted = Vec::with_capacity(messages.len() + 1);
        let mut system_seen = false;

        for m in messages {
            let message = match m.role {
                Role::System => {
                    system_seen = true;
                    let content = match &tool_section {
                        Some(section) => format!("{}\n\n{section}", m.content),
                        None => m.content.clone(),
                    };
                    json!({ "role": "system", "content": content })
                }
                Role::User => json!({ "role": "user", "content": m.content }),
                Role::Assistant if m.has_tool_calls() => {
                    let replay = render_tool_calls(m.calls());
                    let content = if m.content.is_empty() {
                        replay
                    } else {
                        format!("{}\n\n{replay}", m.content)
                    };
                    json!({ "role": "assistant", "content": content })
                }
                Role::Assistant => json!({ "role": "assistant", "content": m.content }),
                // Tool results appear as user context
                Role::Tool => json!({
                    "role": "user",
                    "content": format!(
                        "[Tool result for {}]\n{}",
                        m.tool_call_id.as_deref().unwrap_or("unknown call"),
                        m.content
                    ),
                }),
            };
            converted.push(message);
        }

        if let (false, Some(section)) = (system_seen, tool_section) {
            converted.insert(0, json!({ "role": "system", "content": section }));
        }

        converted
    }

    /// Build Ollama generation options
    fn build_options(opts: &GenerationOptions) -> Value {
        let mut options = json!({ "num_predict": opts.max_tokens });
        if let Some(temperature) = opts.temperature {
            options["temperature"] = json!(temperature);
        }
        options
    }

    /// Convert an Ollama response to the normalized response
    fn convert_completion(body: &Value) -> LlmResponse {
        let text = body.pointer("/message/content").and_then(Value::as_str).unwrap_or_default();
        let parsed = parse_reply(text);

        let native = match body.get("done_reason").and_then(Value::as_str) {
            Some("length") => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        let usage = TokenUsage::new(count(body, "/prompt_eval_count"), count(body, "/eval_count"));
        LlmResponse::from_parts(parsed.content, parsed.tool_calls, native).with_usage(usage)
    }
}

#[async_trait]
impl LlmAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.generation.model
    }

    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse> {
        let payload = json!({
            "model": self.config.generation.model,
            "messages": Self::convert_messages(messages, tools),
            "stream": false,
            "options": Self::build_options(&self.config.generation),
        });
        let url = endpoint(&self.config.base_url, "api/chat");

        tracing::debug!(provider = "ollama", model = %self.config.generation.model, "Sending chat request");
        let body = send_json("ollama", self.client.post(&url).json(&payload)).await?;
        Ok(Self::convert_completion(&body))
    }
}
