//! Chat-completion provider implementations.
//!
//! Use `create_provider()` to instantiate the appropriate provider based on config.

pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::{ConfigError, Result};
use std::sync::Arc;

pub use openai_compat::OpenAiCompatibleProvider;

/// Create a chat provider from configuration.
///
/// Every supported provider speaks the OpenAI chat completions format; the
/// provider name only selects defaults such as the base URL. Azure OpenAI
/// uses a different URL and auth scheme and is reachable only through an
/// OpenAI-compatible proxy configured as `openai-compatible`.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "openai" | "vllm" | "lmstudio" | "openai-compatible" => {
            Ok(Arc::new(OpenAiCompatibleProvider::new(config)?))
        }
        "ollama" => {
            let mut config = config.clone();
            config
                .base_url
                .get_or_insert_with(|| "http://localhost:11434/v1".to_string());
            Ok(Arc::new(OpenAiCompatibleProvider::new(&config)?))
        }
        other => Err(ConfigError::Invalid {
            message: format!("Unsupported LLM provider: '{other}'"),
        }
        .into()),
    }
}
