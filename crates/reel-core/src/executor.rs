//! Agent Executor
//!
//! The turn loop: send the conversation to the active adapter, dispatch any
//! tool calls it returns (optionally gated by a human), feed the results back,
//! and repeat until the model answers in plain text or the turn budget runs out.
//!
//! Tool calls from one assistant turn run strictly in the order the model
//! emitted them; later calls may depend on side effects of earlier ones.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::confirm::ConfirmationGate;
use crate::context::AgentContext;
use crate::error::{AgentError, Result};
use crate::message::{ConversationMemory, DEFAULT_MAX_MESSAGES};
use crate::provider::{FinishReason, LlmAdapter, LlmResponse};
use crate::tool::{ToolCall, ToolRegistry, ToolResult};

/// Error text fed back to the model when the gate rejects a call
pub const DECLINED_ERROR: &str = "execution declined by user";

const DEFAULT_SYSTEM_PROMPT: &str = r"You are a video editing assistant. You help the user build and edit video projects by calling the tools available to you.

Work step by step. When a task needs several operations (for example creating a project and then adding clips to it), call the tools in the order they must happen.
If a tool reports an error, read it and adjust your plan instead of repeating the same call.
When the task is complete, reply with a short plain-text summary of what changed.";

/// Executor configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Operating instructions placed in the system message
    pub system_prompt: String,

    /// Maximum adapter calls per user request
    pub max_turns: usize,

    /// Non-system messages retained in memory
    pub max_messages: usize,

    /// Upper bound for a single adapter call, in milliseconds
    pub adapter_timeout_ms: Option<u64>,

    /// Upper bound for a single tool dispatch, in milliseconds
    pub tool_timeout_ms: Option<u64>,

    /// Append working directory and loaded project to the system message
    pub describe_context: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_turns: 10,
            max_messages: DEFAULT_MAX_MESSAGES,
            adapter_timeout_ms: Some(120_000),
            tool_timeout_ms: Some(300_000),
            describe_context: true,
        }
    }
}

impl AgentConfig {
    pub fn adapter_timeout(&self) -> Option<Duration> {
        self.adapter_timeout_ms.map(Duration::from_millis)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_ms.map(Duration::from_millis)
    }
}

/// What one `execute` call produced
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Final assistant text, or a budget-exhaustion notice
    pub response: String,

    /// Names of dispatched tools, in dispatch order
    pub tools_used: Vec<String>,

    /// Adapter calls made
    pub turns: usize,

    /// False when the turn budget ran out before a final answer
    pub completed: bool,

    /// Finish reason of the last adapter response
    pub finish_reason: Option<FinishReason>,
}

/// Drives one session: owns its memory and context, shares the registry
pub struct AgentExecutor {
    adapter: Arc<dyn LlmAdapter>,
    tools: Arc<ToolRegistry>,
    gate: Option<Arc<dyn ConfirmationGate>>,
    memory: ConversationMemory,
    context: AgentContext,
    config: AgentConfig,
}

impl AgentExecutor {
    /// Create a new executor
    pub fn new(adapter: Arc<dyn LlmAdapter>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        let mut executor = Self {
            adapter,
            tools,
            gate: None,
            memory: ConversationMemory::new(config.max_messages),
            context: AgentContext::default(),
            config,
        };
        executor.refresh_system_prompt();
        executor
    }

    /// Start building an executor
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.describe_context {
            prompt.push_str("\n\n## Session\n");
            prompt.push_str(&self.context.describe());
        }

        prompt
    }

    fn refresh_system_prompt(&mut self) {
        let prompt = self.build_system_prompt();
        self.memory.set_system(prompt);
    }

    /// Run the agent on one user request
    pub async fn execute(&mut self, user_text: &str) -> Result<ExecutionOutcome> {
        self.refresh_system_prompt();
        self.memory.append_user(user_text);

        tracing::info!(
            provider = self.adapter.name(),
            model = self.adapter.model(),
            "Executing user request"
        );

        let max_turns = self.config.max_turns;
        let mut tools_used = Vec::new();
        let mut turns = 0;
        let mut finish_reason = None;

        while turns < max_turns {
            turns += 1;
            tracing::debug!(turn = turns, "Calling adapter");

            let response = self.call_adapter().await?;
            finish_reason = Some(response.finish_reason);

            // Calls are only recorded when they will be answered
            let tool_calls = if response.wants_tools() {
                response.tool_calls.clone()
            } else {
                None
            };
            self.memory.append_assistant(response.content.clone(), tool_calls);

            if !response.wants_tools() {
                tracing::info!(turns, tools = tools_used.len(), "Request finished");
                return Ok(ExecutionOutcome {
                    response: response.content,
                    tools_used,
                    turns,
                    completed: true,
                    finish_reason,
                });
            }

            self.run_tool_calls(response.calls(), &mut tools_used).await?;
        }

        tracing::warn!(max_turns, "Turn budget exhausted before a final answer");
        Ok(ExecutionOutcome {
            response: format!(
                "Stopped after reaching the limit of {max_turns} turns without finishing the task."
            ),
            tools_used,
            turns,
            completed: false,
            finish_reason,
        })
    }

    async fn call_adapter(&self) -> Result<LlmResponse> {
        let messages = self.memory.all();
        let request = self.adapter.chat(&messages, self.tools.list());
        let operation = format!("{} request", self.adapter.name());
        bounded(self.config.adapter_timeout(), operation, request)
            .await?
    }

    /// Dispatch every call in order, appending one tool message per call
    async fn run_tool_calls(&mut self, calls: &[ToolCall], tools_used: &mut Vec<String>) -> Result<()> {
        for (index, call) in calls.iter().enumerate() {
            if let Some(gate) = &self.gate {
                if !gate.confirm(&call.name, &call.arguments).await {
                    tracing::warn!(tool = %call.name, "Tool call declined");
                    self.memory.append_tool_result(&call.id, &ToolResult::failure(DECLINED_ERROR));
                    continue;
                }
            }

            tracing::debug!(tool = %call.name, id = %call.id, "Dispatching tool");
            tools_used.push(call.name.clone());

            let dispatch = self.tools.dispatch(&call.name, &call.arguments, &mut self.context);
            let operation = format!("tool '{}'", call.name);
            match bounded(self.config.tool_timeout(), operation, dispatch).await {
                Ok(result) => self.memory.append_tool_result(&call.id, &result),
                Err(e) => {
                    // Leave no call unanswered before aborting the request
                    self.memory.append_tool_result(&call.id, &ToolResult::failure(e.to_string()));
                    for skipped in &calls[index + 1..] {
                        self.memory.append_tool_result(
                            &skipped.id,
                            &ToolResult::failure("not executed: request aborted"),
                        );
                    }
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Clear the conversation, keeping the system message
    pub fn reset(&mut self) {
        self.memory.reset();
    }

    /// Names of registered tools
    pub fn tools(&self) -> Vec<String> {
        self.tools.names()
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn context(&self) -> &AgentContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut AgentContext {
        &mut self.context
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Await `future`, failing with [`AgentError::Timeout`] once `limit` elapses
async fn bounded<T>(limit: Option<Duration>, operation: String, future: impl Future<Output = T>) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| AgentError::timeout(operation, limit)),
        None => Ok(future.await),
    }
}

/// Builder for [`AgentExecutor`]
pub struct AgentBuilder {
    adapter: Option<Arc<dyn LlmAdapter>>,
    tools: Arc<ToolRegistry>,
    gate: Option<Arc<dyn ConfirmationGate>>,
    context: AgentContext,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            adapter: None,
            tools: Arc::new(ToolRegistry::new()),
            gate: None,
            context: AgentContext::default(),
            config: AgentConfig::default(),
        }
    }

    pub fn adapter(mut self, adapter: Arc<dyn LlmAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn gate(mut self, gate: Arc<dyn ConfirmationGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn context(mut self, context: AgentContext) -> Self {
        self.context = context;
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn max_turns(mut self, max: usize) -> Self {
        self.config.max_turns = max;
        self
    }

    pub fn build(self) -> Result<AgentExecutor> {
        let adapter = self.adapter
            .ok_or_else(|| AgentError::Config("An LLM adapter is required".into()))?;

        if self.config.max_turns == 0 {
            return Err(AgentError::Config("max_turns must be at least 1".into()));
        }
        if self.config.max_messages == 0 {
            return Err(AgentError::Config("max_messages must be at least 1".into()));
        }

        let mut executor = AgentExecutor::new(adapter, self.tools, self.config);
        executor.gate = self.gate;
        executor.context = self.context;
        executor.refresh_system_prompt();
        Ok(executor)
    }
}
