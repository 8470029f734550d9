//! LLM clients used by the recommendation engine.
//!
//! Each client sends one prompt per call and returns the raw completion text.
//! Retries and fallback are the engine's concern.

pub mod anthropic;
pub mod openai;
pub mod response;

use crate::config::{AiProvider, Config};
use crate::error::Result;
use std::time::Duration;
use thiserror::Error;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

/// Failure of a single LLM call.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Transport(String),

    #[error("LLM authentication failed: {0}")]
    Authentication(String),

    #[error("LLM API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// A text-completion backend.
#[allow(async_fn_in_trait)]
pub trait LlmClient {
    /// Send `prompt` and return the completion text.
    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError>;

    /// Short provider/model label for logs.
    fn describe(&self) -> String;
}

/// The client selected by configuration.
#[derive(Debug)]
pub enum ConfiguredClient {
    Anthropic(AnthropicClient),
    OpenAi(OpenAiClient),
}

impl ConfiguredClient {
    /// Build the configured provider's client. Requires an API key.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_ai_key()?.to_string();
        let model = config.ai_model().to_string();
        let timeout = Duration::from_secs(config.ai.timeout_secs);
        let api_url = config.ai.api_url.as_deref();

        Ok(match config.ai.provider {
            AiProvider::Anthropic => {
                ConfiguredClient::Anthropic(AnthropicClient::new(api_key, model, api_url, timeout)?)
            }
            AiProvider::OpenAi => {
                ConfiguredClient::OpenAi(OpenAiClient::new(api_key, model, api_url, timeout)?)
            }
        })
    }
}

impl LlmClient for ConfiguredClient {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        match self {
            ConfiguredClient::Anthropic(client) => client.complete(prompt).await,
            ConfiguredClient::OpenAi(client) => client.complete(prompt).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            ConfiguredClient::Anthropic(client) => client.describe(),
            ConfiguredClient::OpenAi(client) => client.describe(),
        }
    }
}

/// Map a non-success HTTP response to an [`LlmError`].
pub(crate) fn status_error(status: reqwest::StatusCode, body: &str) -> LlmError {
    let message = extract_error_message(body).unwrap_or_else(|| {
        if !body.trim().is_empty() {
            body.trim().to_string()
        } else if status.as_u16() == 429 {
            "Rate limited".to_string()
        } else if status.is_server_error() {
            "Server error".to_string()
        } else {
            "request failed".to_string()
        }
    });

    match status.as_u16() {
        401 | 403 => LlmError::Authentication(message),
        code => LlmError::Status {
            status: code,
            message,
        },
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok()?;

    if let Some(msg) = parsed
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(|message| message.as_str())
    {
        return Some(msg.to_string());
    }

    parsed
        .get("message")
        .and_then(|message| message.as_str())
        .map(ToOwned::to_owned)
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_error_extracts_nested_message() {
        let err = status_error(
            StatusCode::UNAUTHORIZED,
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        );
        assert!(matches!(err, LlmError::Authentication(m) if m == "invalid x-api-key"));

        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(err, LlmError::Status { status: 429, message } if message == "Rate limited"));
    }

    #[test]
    fn test_client_requires_key() {
        let config = Config::default();
        assert!(ConfiguredClient::from_config(&config).is_err());

        let mut config = Config::default();
        config.ai.api_key = Some("sk-test".to_string());
        config.ai.provider = AiProvider::OpenAi;
        let client = ConfiguredClient::from_config(&config).unwrap();
        assert_eq!(client.describe(), "openai/gpt-4o");
    }
}
