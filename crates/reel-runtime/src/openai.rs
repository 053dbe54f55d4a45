//! OpenAI Chat Completions Adapter
//!
//! Native function calling: tool schemas go in `tools`, assistant calls in
//! `tool_calls` (arguments as a JSON string), results as `tool` role messages.

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

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_MODEL: &str = "gpt-4o";

/// OpenAI adapter configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API root, without the `/chat/completions` suffix
    pub base_url: String,

    pub api_key: String,

    /// Optional `OpenAI-Organization` header
    pub organization: Option<String>,

    pub generation: GenerationOptions,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAI_BASE_URL.into(),
            api_key: String::new(),
            organization: None,
            generation: GenerationOptions::new(OPENAI_MODEL),
            timeout_secs: 120,
        }
    }
}

/// OpenAI (and OpenAI-compatible) chat adapter
pub struct OpenAiAdapter {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiAdapter {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AgentError::Config("OpenAI adapter requires an API key".into()));
        }
        let client = build_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    /// Convert agent messages to OpenAI format
    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::System => json!({ "role": "system", "content": m.content }),
                Role::User => json!({ "role": "user", "content": m.content }),
                Role::Assistant if m.has_tool_calls() => {
                    let calls: Vec<Value> = m
                        .calls()
                        .iter()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": {
                                    "name": c.name,
                                    "arguments": c.arguments_json().to_string(),
                                }
                            })
                        })
                        .collect();
                    let content = if m.content.is_empty() { Value::Null } else { json!(m.content) };
                    json!({ "role": "assistant", "content": content, "tool_calls": calls })
                }
                Role::Assistant => json!({ "role": "assistant", "content": m.content }),
                Role::Tool => json!({
                    "role": "tool",
                    "tool_call_id": m.tool_call_id,
                    "content": m.content,
                }),
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI function specs
    fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.json_schema(),
                    }
                })
            })
            .collect()
    }

    fn build_payload(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let opts = &self.config.generation;
        let mut payload = json!({
            "model": opts.model,
            "messages": Self::convert_messages(messages),
            "max_tokens": opts.max_tokens,
        });

        if let Some(temperature) = opts.temperature {
            payload["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            payload["tools"] = Value::Array(Self::convert_tools(tools));
        }

        payload
    }

    /// Convert an OpenAI response body to the normalized response
    fn parse_response(body: &Value) -> Result<LlmResponse> {
        let choice = body
            .pointer("/choices/0")
            .ok_or_else(|| AgentError::Parse("OpenAI response has no choices".into()))?;
        let message = choice
            .get("message")
            .ok_or_else(|| AgentError::Parse("OpenAI choice has no message".into()))?;

        let content = message.get("content").and_then(Value::as_str).unwrap_or_default();

        let tool_calls = match message.get("tool_calls").and_then(Value::as_array) {
            Some(calls) => calls.iter().map(Self::parse_tool_call).collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let native = match choice.get("finish_reason").and_then(Value::as_str) {
            Some("length") => FinishReason::Length,
            Some("tool_calls" | "function_call") => FinishReason::ToolCalls,
            Some("content_filter") => FinishReason::Error,
            _ => FinishReason::Stop,
        };

        let usage = TokenUsage::new(
            count(body, "/usage/prompt_tokens"),
            count(body, "/usage/completion_tokens"),
        );

        Ok(LlmResponse::from_parts(content, tool_calls, native).with_usage(usage))
    }

    fn parse_tool_call(raw: &Value) -> Result<ToolCall> {
        let id = raw.get("id").and_then(Value::as_str).unwrap_or_default();
        let name = raw
            .pointer("/function/name")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Parse(format!("tool call {id} has no function name")))?;
        let arguments = raw
            .pointer("/function/arguments")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let value = if arguments.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(arguments).map_err(|e| {
                AgentError::Parse(format!("could not decode arguments for tool call {id}: {e}"))
            })?
        };
        let arguments = arguments_from_value(value).map_err(AgentError::Parse)?;

        let id = if id.is_empty() { reel_core::tool::generate_call_id() } else { id.to_string() };
        Ok(ToolCall::new(id, name, arguments))
    }
}

#[async_trait]
impl LlmAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.generation.model
    }

    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse> {
        let payload = self.build_payload(messages, tools);
        let url = endpoint(&self.config.base_url, "chat/completions");

        let mut request = self.client.post(&url).bearer_auth(&self.config.api_key).json(&payload);
        if let Some(org) = &self.config.organization {
            request = request.header("OpenAI-Organization", org);
        }

        tracing::debug!(provider = "openai", model = %self.config.generation.model, "Sending chat request");
        let body = send_json("openai", request).await?;
        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::ParameterSchema;
    use reel_core::tool::ToolArguments;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(status: u16, response_body: Value) -> (MockServer, OpenAiAdapter) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test_api_key"))
            .respond_with(ResponseTemplate::new(status).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = OpenAiConfig {
            base_url: format!("{}/v1", mock_server.uri()),
            api_key: "test_api_key".into(),
            ..OpenAiConfig::default()
        };
        (mock_server, OpenAiAdapter::new(config).unwrap())
    }

    fn project_create() -> ToolDefinition {
        ToolDefinition::new("project_create", "Create a new project")
            .param(ParameterSchema::new("name", "string", "Project name").required())
    }

    #[tokio::test]
    async fn test_tool_call_response() {
        let response_body = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "project_create", "arguments": "{\"name\": \"demo\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 40, "completion_tokens": 12, "total_tokens": 52}
        });
        let (server, adapter) = setup_mock_server(200, response_body).await;

        let messages = vec![Message::system("You edit videos."), Message::user("make demo")];
        let response = adapter.chat(&messages, &[project_create()]).await.unwrap();

        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.content, "");
        let calls = response.calls();
        assert_eq!(calls[0].id, "call_abc");
        assert_eq!(calls[0].arguments["name"], "demo");
        assert_eq!(response.usage.unwrap().total_tokens, 52);

        let requests = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent["model"], OPENAI_MODEL);
        assert_eq!(sent["messages"][0]["role"], "system");
        assert_eq!(sent["tools"][0]["function"]["name"], "project_create");
        assert_eq!(sent["tools"][0]["function"]["parameters"]["required"], json!(["name"]));
    }

    #[tokio::test]
    async fn test_plain_and_truncated_responses() {
        let response_body = json!({
            "choices": [{"message": {"role": "assistant", "content": "The timeline is"}, "finish_reason": "length"}]
        });
        let (_server, adapter) = setup_mock_server(200, response_body).await;

        let response = adapter.chat(&[Message::user("describe")], &[]).await.unwrap();
        assert_eq!(response.finish_reason, FinishReason::Length);
        assert!(response.tool_calls.is_none());
        assert_eq!(response.content, "The timeline is");
    }

    #[tokio::test]
    async fn test_http_error_is_fatal() {
        let (_server, adapter) =
            setup_mock_server(500, json!({"error": {"message": "overloaded"}})).await;

        let err = adapter.chat(&[Message::user("hi")], &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(ref m) if m.contains("overloaded")));
    }

    #[tokio::test]
    async fn test_bad_arguments_are_a_parse_error() {
        let response_body = json!({
            "choices": [{
                "message": {"tool_calls": [{"id": "c1", "function": {"name": "clip_add", "arguments": "{\"path\": "}}]},
                "finish_reason": "tool_calls"
            }]
        });
        let (_server, adapter) = setup_mock_server(200, response_body).await;

        let err = adapter.chat(&[Message::user("add")], &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
    }

    #[test]
    fn test_message_conversion_pairs_calls_and_results() {
        let mut args = ToolArguments::new();
        args.insert("name".into(), json!("demo"));
        let messages = vec![
            Message::user("make demo"),
            Message::assistant("", Some(vec![ToolCall::new("call_1", "project_create", args)])),
            Message::tool("call_1", "Created project demo"),
        ];

        let converted = OpenAiAdapter::convert_messages(&messages);
        assert_eq!(converted[1]["content"], Value::Null);
        assert_eq!(converted[1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(converted[1]["tool_calls"][0]["function"]["arguments"], "{\"name\":\"demo\"}");
        assert_eq!(converted[2]["role"], "tool");
        assert_eq!(converted[2]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_missing_api_key() {
        assert!(matches!(OpenAiAdapter::new(OpenAiConfig::default()), Err(AgentError::Config(_))));
    }
}
