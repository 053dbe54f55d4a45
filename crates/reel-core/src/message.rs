//! Conversation Messages
//!
//! Provider-agnostic message format and the bounded memory sent to the model
//! on every turn.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResult};

/// Default number of non-system messages kept in memory
pub const DEFAULT_MAX_MESSAGES: usize = 50;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content; may be empty for a pure tool-call turn
    #[serde(default)]
    pub content: String,

    /// Tool invocations requested by an assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Call this tool message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Set on tool messages whose result was a failure
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message; an empty call list is stored as `None`
    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCall>>) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        msg.tool_calls = tool_calls.filter(|calls| !calls.is_empty());
        msg
    }

    /// Create a tool result message
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Create a tool message from a result, keeping its failure flag
    pub fn tool_result(tool_call_id: impl Into<String>, result: &ToolResult) -> Self {
        let mut msg = Self::tool(tool_call_id, result.to_content());
        msg.is_error = !result.success;
        msg
    }

    /// Tool calls carried by this message, empty for anything but assistant turns
    pub fn calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.calls().is_empty()
    }
}

/// Bounded, ordered message history with a single pinned system message.
///
/// At most `max_messages` non-system messages are retained; older ones are
/// dropped first. The system message never counts against the bound.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationMemory {
    system: Option<Message>,
    messages: Vec<Message>,
    max_messages: usize,

    /// Latest user message trimmed out of the window
    #[serde(default)]
    anchor: Option<Message>,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

impl ConversationMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            system: None,
            messages: Vec::new(),
            max_messages,
            anchor: None,
        }
    }

    /// Insert or replace the system message
    pub fn set_system(&mut self, text: impl Into<String>) {
        self.system = Some(Message::system(text));
    }

    pub fn system(&self) -> Option<&Message> {
        self.system.as_ref()
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.push(Message::user(text));
    }

    pub fn append_assistant(&mut self, text: impl Into<String>, tool_calls: Option<Vec<ToolCall>>) {
        self.push(Message::assistant(text, tool_calls));
    }

    /// Append a tool result; failures become `"Error: <message>"`
    pub fn append_tool_result(&mut self, tool_call_id: impl Into<String>, result: &ToolResult) {
        self.push(Message::tool_result(tool_call_id, result));
    }

    /// Append an arbitrary message. A system message replaces the current one.
    pub fn push(&mut self, message: Message) {
        if message.role == Role::System {
            self.system = Some(message);
            return;
        }
        self.messages.push(message);
        self.trim();
    }

    fn trim(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            if let Some(user) = self.messages[..excess].iter().rev().find(|m| m.role == Role::User) {
                self.anchor = Some(user.clone());
            }
            self.messages.drain(..excess);
            tracing::debug!(dropped = excess, kept = self.max_messages, "Trimmed conversation memory");
        }
    }

    /// Live sequence for an adapter: system first, then chronological.
    ///
    /// The window always opens on a user turn. Messages ahead of the first
    /// retained user message are skipped; when trimming has removed every
    /// user message, the latest trimmed one is replayed in front instead.
    /// Tool results whose originating assistant message has been trimmed away
    /// are left out so every tool message pairs with a preceding call.
    pub fn all(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.messages.len() + 2);
        if let Some(system) = &self.system {
            out.push(system.clone());
        }

        let window = match self.messages.iter().position(|m| m.role == Role::User) {
            Some(first_user) => &self.messages[first_user..],
            None => {
                out.extend(self.anchor.iter().cloned());
                &self.messages[..]
            }
        };

        let mut issued: HashSet<&str> = HashSet::new();
        for message in window {
            match message.role {
                Role::Assistant => {
                    issued.extend(message.calls().iter().map(|c| c.id.as_str()));
                }
                Role::Tool => {
                    let paired = message
                        .tool_call_id
                        .as_deref()
                        .is_some_and(|id| issued.contains(id));
                    if !paired {
                        continue;
                    }
                }
                _ => {}
            }
            out.push(message.clone());
        }

        out
    }

    /// Retained non-system messages, oldest first
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Clear all messages except the system prompt
    pub fn reset(&mut self) {
        self.messages.clear();
        self.anchor = None;
    }

    /// Number of retained non-system messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }
}
