//! Google Gemini `generateContent` Adapter
//!
//! Gemini issues no call ids, so ids are synthesized on receipt and mapped
//! back to function names when results are replayed.

use std::collections::HashMap;

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

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_MODEL: &str = "gemini-1.5-pro";

/// Gemini adapter configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub generation: GenerationOptions,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: GEMINI_BASE_URL.into(),
            api_key: String::new(),
            generation: GenerationOptions::new(GEMINI_MODEL),
            timeout_secs: 120,
        }
    }
}

pub struct GeminiAdapter {
    client: Client,
    config: GeminiConfig,
}

impl GeminiAdapter {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AgentError::Config("Gemini adapter requires an API key".into()));
        }
        let client = build_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    /// Returns `(systemInstruction, contents)`
    fn convert_messages(messages: &[Message]) -> (Option<Value>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut contents: Vec<Value> = Vec::new();
        let mut responses: Vec<Value> = Vec::new();
        let mut call_names: HashMap<&str, &str> = HashMap::new();

        for m in messages {
            if m.role != Role::Tool && !responses.is_empty() {
                contents.push(json!({ "role": "user", "parts": std::mem::take(&mut responses) }));
            }

            match m.role {
                Role::System => system_parts.push(json!({ "text": m.content })),
                Role::User => contents.push(json!({ "role": "user", "parts": [{ "text": m.content }] })),
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !m.content.is_empty() {
                        parts.push(json!({ "text": m.content }));
                    }
                    for call in m.calls() {
                        call_names.insert(call.id.as_str(), call.name.as_str());
                        parts.push(json!({
                            "functionCall": { "name": call.name, "args": call.arguments_json() }
                        }));
                    }
                    if !parts.is_empty() {
                        contents.push(json!({ "role": "model", "parts": parts }));
                    }
                }
                Role::Tool => {
                    let id = m.tool_call_id.as_deref().unwrap_or_default();
                    let Some(name) = call_names.get(id) else {
                        tracing::warn!(call_id = id, "Dropping tool result with no matching call");
                        continue;
                    };
                    responses.push(json!({
                        "functionResponse": {
                            "name": name,
                            "response": { "name": name, "content": m.content },
                        }
                    }));
                }
            }
        }

        if !responses.is_empty() {
            contents.push(json!({ "role": "user", "parts": responses }));
        }

        let system = if system_parts.is_empty() { None } else { Some(json!({ "parts": system_parts })) };
        (system, contents)
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Value {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                let mut declaration = json!({ "name": t.name, "description": t.description });
                if !t.parameters.is_empty() {
                    let mut schema = t.json_schema();
                    strip_unsupported(&mut schema);
                    declaration["parameters"] = schema;
                }
                declaration
            })
            .collect();
        json!([{ "functionDeclarations": declarations }])
    }

    fn build_payload(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let opts = &self.config.generation;
        let (system, contents) = Self::convert_messages(messages);

        let mut generation_config = json!({ "maxOutputTokens": opts.max_tokens });
        if let Some(temperature) = opts.temperature {
            generation_config["temperature"] = json!(temperature);
        }

        let mut payload = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(system) = system {
            payload["systemInstruction"] = system;
        }
        if !tools.is_empty() {
            payload["tools"] = Self::convert_tools(tools);
        }
        payload
    }

    fn parse_response(body: &Value) -> Result<LlmResponse> {
        let Some(candidate) = body.pointer("/candidates/0") else {
            // A blocked prompt yields no candidates, only feedback
            if let Some(reason) = body.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
                tracing::warn!(provider = "gemini", reason, "Prompt was blocked");
                return Ok(LlmResponse::from_parts(
                    format!("The request was blocked by the provider ({reason})."),
                    Vec::new(),
                    FinishReason::Error,
                ));
            }
            return Err(AgentError::Parse("Gemini response has no candidates".into()));
        };

        let mut text = String::new();
        let mut tool_calls = Vec::new();

        let parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for part in parts {
            if let Some(t) = part.get("text").and_then(Value::as_str) {
                text.push_str(t);
            }
            if let Some(call) = part.get("functionCall") {
                let name = call
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AgentError::Parse("functionCall without a name".into()))?;
                let args = call.get("args").cloned().unwrap_or(Value::Null);
                let arguments = arguments_from_value(args).map_err(AgentError::Parse)?;
                tool_calls.push(ToolCall::generated(name, arguments));
            }
        }

        let native = match candidate.get("finishReason").and_then(Value::as_str) {
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII") => FinishReason::Error,
            _ => FinishReason::Stop,
        };

        let usage = TokenUsage::new(
            count(body, "/usageMetadata/promptTokenCount"),
            count(body, "/usageMetadata/candidatesTokenCount"),
        );

        Ok(LlmResponse::from_parts(text, tool_calls, native).with_usage(usage))
    }
}

/// Remove schema keywords Gemini rejects in function declarations
fn strip_unsupported(schema: &mut Value) {
    let Value::Object(map) = schema else { return };
    map.remove("default");
    if let Some(Value::Object(properties)) = map.get_mut("properties") {
        properties.values_mut().for_each(strip_unsupported);
    }
    if let Some(items) = map.get_mut("items") {
        strip_unsupported(items);
    }
}

#[async_trait]
impl LlmAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.generation.model
    }

    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse> {
        let payload = self.build_payload(messages, tools);
        let path = format!("models/{}:generateContent", self.config.generation.model);
        let url = endpoint(&self.config.base_url, &path);

        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&payload);

        tracing::debug!(provider = "gemini", model = %self.config.generation.model, "Sending chat request");
        let body = send_json("gemini", request).await?;
        Self::parse_response(&body)
    }
}
