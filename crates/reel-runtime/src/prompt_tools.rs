//! Prompt-embedded tool calling for models without a native tool schema.
//!
//! The model is told to answer with a JSON payload when it wants a tool.
//! Extraction is best-effort: a fenced block or a bare object is accepted,
//! and anything that fails to parse is treated as plain text.

use reel_core::tool::{arguments_from_value, describe_tools};
use reel_core::{ToolCall, ToolDefinition};
use serde_json::{Value, json};

const TOOL_CALL_INSTRUCTIONS: &str = r#"## Calling Tools

To call one or more tools, reply with a single JSON block in exactly this format and nothing else:
```json
{"tool_calls": [{"name": "tool_name", "arguments": {"arg": "value"}}]}
```

List calls in the order they must run. Tool results will be sent back to you as messages.
When no tool is needed, answer in plain text without any JSON."#;

/// System-prompt section describing the tools and the reply contract
pub fn tool_prompt(tools: &[ToolDefinition]) -> String {
    format!("{}{}", describe_tools(tools), TOOL_CALL_INSTRUCTIONS)
}

/// Replay earlier calls in the same format the model was asked to use
pub fn render_tool_calls(calls: &[ToolCall]) -> String {
    let calls: Vec<Value> = calls
        .iter()
        .map(|c| json!({ "name": c.name, "arguments": c.arguments_json() }))
        .collect();
    format!("```json\n{}\n```", json!({ "tool_calls": calls }))
}

/// Text and calls recovered from a model reply
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ParsedReply {
    fn plain(text: &str) -> Self {
        Self {
            content: text.to_string(),
            tool_calls: Vec::new(),
        }
    }
}

/// Extract tool calls from a reply.
///
/// A fenced block tagged `json`, `tool` or untagged is tried first, then the
/// outermost bare `{...}`. On success the payload is cut out of the content.
/// On any failure the reply comes back unchanged with no calls.
pub fn parse_reply(text: &str) -> ParsedReply {
    if let Some((start, end, body)) = find_fenced_json(text) {
        if let Some(calls) = calls_from_json(body) {
            return ParsedReply {
                content: splice_out(text, start, end),
                tool_calls: calls,
            };
        }
        tracing::warn!("Fenced tool-call block did not parse; treating reply as text");
        return ParsedReply::plain(text);
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(calls) = calls_from_json(&text[start..=end]) {
                return ParsedReply {
                    content: splice_out(text, start, end + 1),
                    tool_calls: calls,
                };
            }
        }
    }

    ParsedReply::plain(text)
}

/// Byte range of the first candidate fence and its body
fn find_fenced_json(text: &str) -> Option<(usize, usize, &str)> {
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find("```") {
        let open = search_from + offset;
        let after_ticks = open + 3;
        let line_end = text[after_ticks..].find('\n').map(|i| after_ticks + i)?;
        let tag = text[after_ticks..line_end].trim();

        let body_start = line_end + 1;
        let close = text[body_start..].find("```").map(|i| body_start + i)?;

        if matches!(tag, "" | "json" | "tool") {
            return Some((open, close + 3, text[body_start..close].trim()));
        }
        search_from = close + 3;
    }

    None
}

fn splice_out(text: &str, start: usize, end: usize) -> String {
    let before = text[..start].trim_end();
    let after = text[end..].trim_start();
    match (before.is_empty(), after.is_empty()) {
        (true, _) => after.trim_end().to_string(),
        (false, true) => before.trim_start().to_string(),
        (false, false) => format!("{}\n\n{}", before.trim_start(), after.trim_end()),
    }
}

/// All-or-nothing: every entry must name a tool with object arguments
fn calls_from_json(body: &str) -> Option<Vec<ToolCall>> {
    let value: Value = serde_json::from_str(body).ok()?;

    let entries: Vec<&Value> = match value.get("tool_calls") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(_) => return None,
        // A lone object must look like a call, not just any JSON with a "name"
        None if ["tool", "arguments", "parameters"].iter().any(|k| value.get(k).is_some()) => {
            vec![&value]
        }
        None => return None,
    };

    let calls = entries
        .into_iter()
        .map(call_from_entry)
        .collect::<Option<Vec<_>>>()?;

    if calls.is_empty() { None } else { Some(calls) }
}

fn call_from_entry(entry: &Value) -> Option<ToolCall> {
    let name = entry
        .get("name")
        .or_else(|| entry.get("tool"))
        .and_then(Value::as_str)
        .filter(|n| !n.trim().is_empty())?;

    let raw = entry
        .get("arguments")
        .or_else(|| entry.get("parameters"))
        .cloned()
        .unwrap_or(Value::Null);

    // Some models double-encode the arguments as a JSON string
    let raw = match raw {
        Value::String(s) => serde_json::from_str(&s).ok()?,
        other => other,
    };

    let arguments = arguments_from_value(raw).ok()?;
    Some(ToolCall::generated(name.trim(), arguments))
}
