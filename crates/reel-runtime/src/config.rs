//! Provider selection from configuration

use std::sync::Arc;

use reel_core::{LlmAdapter, Result};
use serde::{Deserialize, Serialize};

#[cfg(feature = "anthropic")]
use crate::anthropic::{AnthropicAdapter, AnthropicConfig};
#[cfg(feature = "gemini")]
use crate::gemini::{GeminiAdapter, GeminiConfig};
#[cfg(feature = "ollama")]
use crate::ollama::{OllamaAdapter, OllamaConfig};
#[cfg(feature = "openai")]
use crate::openai::{OpenAiAdapter, OpenAiConfig};

/// Which provider drives the agent, with its settings.
///
/// Deserializes from a table tagged by `provider`:
///
/// ```toml
/// provider = "anthropic"
/// api_key = "sk-ant-..."
/// generation = { model = "sonnet", max_tokens = 2048 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderConfig {
    #[cfg(feature = "openai")]
    OpenAi(OpenAiConfig),
    #[cfg(feature = "anthropic")]
    Anthropic(AnthropicConfig),
    #[cfg(feature = "gemini")]
    Gemini(GeminiConfig),
    #[cfg(feature = "ollama")]
    Ollama(OllamaConfig),
}

impl ProviderConfig {
    /// Construct the configured adapter
    pub fn build(self) -> Result<Arc<dyn LlmAdapter>> {
        let adapter: Arc<dyn LlmAdapter> = match self {
            #[cfg(feature = "openai")]
            Self::OpenAi(config) => Arc::new(OpenAiAdapter::new(config)?),
            #[cfg(feature = "anthropic")]
            Self::Anthropic(config) => Arc::new(AnthropicAdapter::new(config)?),
            #[cfg(feature = "gemini")]
            Self::Gemini(config) => Arc::new(GeminiAdapter::new(config)?),
            #[cfg(feature = "ollama")]
            Self::Ollama(config) => Arc::new(OllamaAdapter::new(config)?),
        };

        tracing::info!(provider = adapter.name(), model = adapter.model(), "Adapter ready");
        Ok(adapter)
    }
}
