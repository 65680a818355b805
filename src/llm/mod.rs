//! LLM client abstraction.
//!
//! Provides a unified interface for chat-completion providers.

mod openai;

pub use openai::{GenerationParams, OpenAiClient};

use crate::Result;
use std::time::Duration;

/// Trait for LLM providers.
///
/// Implementations are called from several threads at once when a selection
/// is completed line by line.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt.
    ///
    /// Returns `Ok(None)` when the provider answered but produced no choice.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    fn complete(&self, prompt: &str) -> Result<Option<String>>;
}

impl<P: LlmProvider + ?Sized> LlmProvider for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn complete(&self, prompt: &str) -> Result<Option<String>> {
        (**self).complete(prompt)
    }
}

impl<P: LlmProvider + ?Sized> LlmProvider for std::sync::Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn complete(&self, prompt: &str) -> Result<Option<String>> {
        (**self).complete(prompt)
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from config file settings.
    #[must_use]
    pub const fn from_config(config: &crate::config::LlmConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            connect_timeout_ms: config.connect_timeout_ms,
        }
    }
}

/// Builds a blocking HTTP client for LLM requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}
