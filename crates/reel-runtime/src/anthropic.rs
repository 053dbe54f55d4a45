//! Anthropic Messages API Adapter

use async_trait::async_trait;
use reel_core::{
    AgentError, FinishReason, GenerationOptions, LlmAdapter, LlmResponse, Message, Result, Role,
    TokenUsage, ToolCall, ToolDefinition,
    tool::arguments_from_value,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::http::{build_client, count, endpoint, send_json};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Short names accepted in place of a full model id
const MODEL_ALIASES: &[(&str, &str)] = &[
    ("opus", "claude-opus-4-5-20251101"),
    ("sonnet", "claude-sonnet-4-20250514"),
    ("haiku", "claude-3-5-haiku-20241022"),
];

/// Expand a model alias, passing full ids through
pub fn resolve_model(model: &str) -> &str {
    MODEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == model)
        .map_or(model, |(_, id)| *id)
}

/// Anthropic adapter configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub api_key: String,
    pub generation: GenerationOptions,
    pub timeout_secs: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: ANTHROPIC_BASE_URL.into(),
            api_key: String::new(),
            generation: GenerationOptions::new(ANTHROPIC_MODEL),
            timeout_secs: 120,
        }
    }
}

pub struct AnthropicAdapter {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicAdapter {
    pub fn new(mut config: AnthropicConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AgentError::Config("Anthropic adapter requires an API key".into()));
        }
        config.generation.model = resolve_model(&config.generation.model).to_string();
        let client = build_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    /// Split out the system prompt and convert the rest to Anthropic turns.
    ///
    /// Consecutive tool results share one `user` message, since the API
    /// wants every result for an assistant turn in the next message.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut converted: Vec<Value> = Vec::new();
        let mut pending_results: Vec<Value> = Vec::new();

        for m in messages {
            if m.role != Role::Tool && !pending_results.is_empty() {
                converted.push(json!({ "role": "user", "content": std::mem::take(&mut pending_results) }));
            }

            match m.role {
                Role::System => system_parts.push(m.content.clone()),
                Role::User => converted.push(json!({ "role": "user", "content": m.content })),
                Role::Assistant => {
                    let mut blocks = Vec::new();
                    if !m.content.is_empty() {
                        blocks.push(json!({ "type": "text", "text": m.content }));
                    }
                    for call in m.calls() {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments_json(),
                        }));
                    }
                    if !blocks.is_empty() {
                        converted.push(json!({ "role": "assistant", "content": blocks }));
                    }
                }
                Role::Tool => pending_results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": m.tool_call_id,
                    "content": m.content,
                    "is_error": m.is_error,
                })),
            }
        }

        if !pending_results.is_empty() {
            converted.push(json!({ "role": "user", "content": pending_results }));
        }

        let system = if system_parts.is_empty() { None } else { Some(system_parts.join("\n\n")) };
        (system, converted)
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.json_schema(),
                })
            })
            .collect()
    }

    fn build_payload(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let opts = &self.config.generation;
        let (system, converted) = Self::convert_messages(messages);

        let mut payload = json!({
            "model": opts.model,
            "messages": converted,
            "max_tokens": opts.max_tokens,
        });
        if let Some(system) = system {
            payload["system"] = json!(system);
        }
        if let Some(temperature) = opts.temperature {
            payload["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            payload["tools"] = Value::Array(Self::convert_tools(tools));
        }
        payload
    }

    fn parse_response(body: &Value) -> Result<LlmResponse> {
        let blocks = body
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::Parse("Anthropic response has no content array".into()))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    text.push_str(block.get("text").and_then(Value::as_str).unwrap_or_default());
                }
                Some("tool_use") => {
                    let (Some(id), Some(name)) = (
                        block.get("id").and_then(Value::as_str),
                        block.get("name").and_then(Value::as_str),
                    ) else {
                        return Err(AgentError::Parse("tool_use block without id or name".into()));
                    };
                    let input = block.get("input").cloned().unwrap_or(Value::Null);
                    let arguments = arguments_from_value(input).map_err(AgentError::Parse)?;
                    tool_calls.push(ToolCall::new(id, name, arguments));
                }
                _ => {}
            }
        }

        let native = match body.get("stop_reason").and_then(Value::as_str) {
            Some("max_tokens") => FinishReason::Length,
            Some("tool_use") => FinishReason::ToolCalls,
            Some("refusal") => FinishReason::Error,
            _ => FinishReason::Stop,
        };

        let usage = TokenUsage::new(
            count(body, "/usage/input_tokens"),
            count(body, "/usage/output_tokens"),
        );

        Ok(LlmResponse::from_parts(text, tool_calls, native).with_usage(usage))
    }
}

#[async_trait]
impl LlmAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.config.generation.model
    }

    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse> {
        let payload = self.build_payload(messages, tools);
        let url = endpoint(&self.config.base_url, "v1/messages");

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload);

        tracing::debug!(provider = "anthropic", model = %self.config.generation.model, "Sending chat request");
        let body = send_json("anthropic", request).await?;
        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::{ConversationMemory, ToolResult};
    use reel_core::tool::ToolArguments;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(status: u16, response_body: Value) -> (MockServer, AnthropicAdapter) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_api_key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(status).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = AnthropicConfig {
            base_url: mock_server.uri(),
            api_key: "test_api_key".into(),
            ..AnthropicConfig::default()
        };
        (mock_server, AnthropicAdapter::new(config).unwrap())
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall::new(id, name, ToolArguments::new())
    }

    #[tokio::test]
    async fn test_tool_use_response() {
        let response_body = json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Creating the project."},
                {"type": "tool_use", "id": "toolu_1", "name": "project_create", "input": {"name": "demo"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 30, "output_tokens": 9}
        });
        let (server, adapter) = setup_mock_server(200, response_body).await;

        let messages = vec![Message::system("You edit videos."), Message::user("make demo")];
        let response = adapter.chat(&messages, &[]).await.unwrap();

        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.content, "Creating the project.");
        assert_eq!(response.calls()[0].id, "toolu_1");
        assert_eq!(response.calls()[0].arguments["name"], "demo");
        assert_eq!(response.usage.unwrap().total_tokens, 39);

        let requests = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent["system"], "You edit videos.");
        assert_eq!(sent["messages"].as_array().unwrap().len(), 1);
        assert!(sent.get("tools").is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_status() {
        let (_server, adapter) = setup_mock_server(
            429,
            json!({"type": "error", "error": {"type": "rate_limit_error", "message": "slow down"}}),
        )
        .await;

        let err = adapter.chat(&[Message::user("hi")], &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::RateLimited(ref m) if m.contains("slow down")));
    }

    #[test]
    fn test_tool_results_merge_into_one_user_message() {
        let failed = ToolResult::failure("file not found");
        let messages = vec![
            Message::user("add both clips"),
            Message::assistant("", Some(vec![call("t1", "clip_add"), call("t2", "clip_add")])),
            Message::tool_result("t1", &ToolResult::success("Error: none, added a.mp4")),
            Message::tool_result("t2", &failed),
            Message::assistant("One clip failed.", None),
        ];

        let (system, converted) = AnthropicAdapter::convert_messages(&messages);
        assert!(system.is_none());
        assert_eq!(converted.len(), 4);

        let results = converted[2]["content"].as_array().unwrap();
        assert_eq!(converted[2]["role"], "user");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["tool_use_id"], "t1");
        assert_eq!(results[0]["is_error"], false);
        assert_eq!(results[1]["is_error"], true);

        assert_eq!(converted[1]["content"].as_array().unwrap().len(), 2);
        assert_eq!(converted[3]["content"][0]["text"], "One clip failed.");
    }

    #[test]
    fn test_trimmed_history_opens_with_user() {
        let mut memory = ConversationMemory::new(4);
        memory.set_system("You edit videos.");
        memory.append_user("add intro and outro");
        for id in ["t1", "t2"] {
            memory.append_assistant("", Some(vec![call(id, "clip_add")]));
            memory.append_tool_result(id, &ToolResult::success("Added"));
        }

        let (system, converted) = AnthropicAdapter::convert_messages(&memory.all());
        assert_eq!(system.as_deref(), Some("You edit videos."));
        assert_eq!(converted[0]["role"], "user");
        assert_eq!(converted[0]["content"], "add intro and outro");
        assert_eq!(converted[1]["role"], "assistant");
    }

    #[test]
    fn test_model_aliases() {
        assert_eq!(resolve_model("haiku"), "claude-3-5-haiku-20241022");
        assert_eq!(resolve_model("claude-custom"), "claude-custom");

        let mut config = AnthropicConfig {
            api_key: "k".into(),
            ..AnthropicConfig::default()
        };
        config.generation.model = "opus".into();
        let adapter = AnthropicAdapter::new(config).unwrap();
        assert_eq!(adapter.model(), "claude-opus-4-5-20251101");
    }
}
