//! `OpenAI` chat-completion client.

use super::{LlmHttpConfig, LlmProvider, build_http_client};
use crate::config::{LlmConfig, Model};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Fixed generation parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum completion length in tokens.
    pub max_tokens: u32,
    /// Nucleus sampling mass.
    pub top_p: f32,
    /// Frequency penalty.
    pub frequency_penalty: f32,
    /// Presence penalty.
    pub presence_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

impl GenerationParams {
    /// Takes the generation parameters from the LLM configuration.
    #[must_use]
    pub const fn from_config(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
            frequency_penalty: config.frequency_penalty,
            presence_penalty: config.presence_penalty,
        }
    }
}

/// `OpenAI` LLM client.
pub struct OpenAiClient {
    /// API key.
    api_key: Option<SecretString>,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: Model,
    /// Generation parameters.
    params: GenerationParams,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = LlmConfig::DEFAULT_BASE_URL;

    /// Creates a client with default settings and no API key.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_key: None,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Model::default(),
            params: GenerationParams::default(),
            client: build_http_client(LlmHttpConfig::default()),
        }
    }

    /// Creates a client from configuration.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            endpoint: config.base_url.clone(),
            model: config.model,
            params: GenerationParams::from_config(config),
            client: build_http_client(LlmHttpConfig::from_config(config)),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets the generation parameters.
    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Returns the API key, or an error when none is configured.
    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_ref()
            .map(|k| k.expose_secret())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::operation(
                    "openai_request",
                    "API key not set (configure llm.api_key or OPENAI_API_KEY)",
                )
            })
    }

    /// Builds the request body for a prompt.
    fn build_request(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.as_str().to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
            top_p: self.params.top_p,
            frequency_penalty: self.params.frequency_penalty,
            presence_penalty: self.params.presence_penalty,
        }
    }

    /// Makes a request to the `OpenAI` API.
    fn request(&self, prompt: &str) -> Result<Option<String>> {
        let api_key = self.api_key()?;
        let request = self.build_request(prompt);

        tracing::debug!(
            model = %self.model,
            prompt_len = prompt.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.endpoint.trim_end_matches('/')
            ))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .map_err(|e| Error::operation("openai_request", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::operation(
                "openai_request",
                format!("API returned status: {status} - {body}"),
            ));
        }

        let response: ChatCompletionResponse = response
            .json()
            .map_err(|e| Error::operation("openai_response", e))?;

        Ok(first_choice_text(response))
    }
}

/// Extracts the first choice's message text, if any.
fn first_choice_text(response: ChatCompletionResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn complete(&self, prompt: &str) -> Result<Option<String>> {
        self.request(prompt)
    }
}

/// Request to the Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

/// A message in the chat.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response from the Chat Completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// A choice in the response.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

/// Message body of a choice; `content` is null for tool-call replies.
#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OpenAiClient::new();
        assert_eq!(client.name(), "openai");
        assert_eq!(client.model, Model::Gpt35Turbo);
        assert_eq!(client.endpoint, OpenAiClient::DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_client_from_config() {
        let config = LlmConfig {
            api_key: Some(SecretString::from("sk-test".to_string())),
            model: Model::Gpt4o,
            base_url: "https://proxy.local/v1".to_string(),
            temperature: 0.1,
            ..LlmConfig::default()
        };
        let client = OpenAiClient::from_config(&config);
        assert_eq!(client.model, Model::Gpt4o);
        assert_eq!(client.endpoint, "https://proxy.local/v1");
        assert_eq!(client.api_key().unwrap(), "sk-test");
        assert!((client.params.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_api_key_fails_before_request() {
        let client = OpenAiClient::new().with_endpoint("http://127.0.0.1:9");
        let err = client.complete("hello").unwrap_err();
        assert!(err.to_string().contains("API key not set"));
    }

    #[test]
    fn test_blank_api_key_rejected() {
        let client = OpenAiClient::new().with_api_key("   ");
        assert!(client.api_key().is_err());
    }

    #[test]
    fn test_request_body_carries_all_parameters() {
        let client = OpenAiClient::new()
            .with_model(Model::Gpt4)
            .with_params(GenerationParams {
                temperature: 0.5,
                max_tokens: 100,
                top_p: 0.9,
                frequency_penalty: 0.25,
                presence_penalty: 1.5,
            });

        let body = serde_json::to_value(client.build_request("Summarize")).unwrap();
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Summarize");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["top_p"], f64::from(0.9_f32));
        assert_eq!(body["frequency_penalty"], 0.25);
        assert_eq!(body["presence_penalty"], 1.5);
    }

    #[test]
    fn test_first_choice_text() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"one"}},{"message":{"content":"two"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice_text(response).as_deref(), Some("one"));

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(first_choice_text(empty).is_none());

        let missing: ChatCompletionResponse = serde_json::from_str("{}").unwrap();
        assert!(first_choice_text(missing).is_none());

        let null_content: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(first_choice_text(null_content).is_none());
    }
}
