//! # reel-runtime
//!
//! Concrete `LlmAdapter`s for reel-core.
//!
//! ## Providers
//!
//! - **OpenAI**: Chat Completions with native function calling
//! - **Anthropic**: Messages API with `tool_use` blocks
//! - **Gemini**: `generateContent` with function declarations
//! - **Ollama**: local models, tool calls simulated through the prompt
//!
//! Each provider sits behind a cargo feature of the same name; all are on
//! by default.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reel_core::{AgentExecutor, ToolRegistry};
//! use reel_runtime::ProviderConfig;
//!
//! let config: ProviderConfig = toml::from_str(&settings)?;
//! let agent = AgentExecutor::builder()
//!     .adapter(config.build()?)
//!     .tools(Arc::new(registry))
//!     .build()?;
//! ```

mod http;
#[cfg(feature = "ollama")]
mod prompt_tools;

pub mod config;

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicAdapter, AnthropicConfig};
pub use config::ProviderConfig;
#[cfg(feature = "gemini")]
pub use gemini::{GeminiAdapter, GeminiConfig};
#[cfg(feature = "ollama")]
pub use ollama::{OllamaAdapter, OllamaConfig};
#[cfg(feature = "openai")]
pub use openai::{OpenAiAdapter, OpenAiConfig};

// Re-export core types for convenience
pub use reel_core::{AgentError, GenerationOptions, LlmAdapter, LlmResponse, Message, Result, Role};
