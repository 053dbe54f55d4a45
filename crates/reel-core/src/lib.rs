//! # reel-core
//!
//! Agentic orchestration core for the reel video-editing assistant: a
//! provider-agnostic turn loop that turns a user request into tool calls,
//! runs them against the project, and feeds the results back to the model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         AgentExecutor                            │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐   │
//! │  │ Conversation │  │    Tool      │  │      LlmAdapter       │   │
//! │  │    Memory    │──│   Registry   │──│  (one per provider)   │   │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘   │
//! │                  optional ConfirmationGate                       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmAdapter` trait lets OpenAI, Anthropic, Gemini or a local Ollama
//! model drive the same executor; concrete adapters live in `reel-runtime`.

pub mod confirm;
pub mod context;
pub mod error;
pub mod executor;
pub mod message;
pub mod provider;
pub mod tool;

pub use confirm::{ConfirmationGate, FnGate, StaticGate};
pub use context::AgentContext;
pub use error::{AgentError, Result};
pub use executor::{AgentBuilder, AgentConfig, AgentExecutor, ExecutionOutcome};
pub use message::{ConversationMemory, Message, Role};
pub use provider::{FinishReason, GenerationOptions, LlmAdapter, LlmResponse, TokenUsage};
pub use tool::{
    ParameterSchema, Tool, ToolArguments, ToolCall, ToolDefinition, ToolHandler, ToolRegistry,
    ToolResult,
};
