use super::{build_http_client, status_error, LlmClient, LlmError};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4000;
const TEMPERATURE: f64 = 0.3;

/// Anthropic Messages API client.
pub struct AnthropicClient {
    api_key: String,
    model: String,
    api_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String, api_url: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key,
            model,
            api_url: api_url.unwrap_or(DEFAULT_API_URL).to_string(),
            client: build_http_client(timeout)?,
        })
    }
}

impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        log::debug!(
            "Sending {} character prompt to Anthropic ({})",
            prompt.len(),
            self.model
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text).map_err(|e| LlmError::Status {
            status: status.as_u16(),
            message: format!("unexpected response body: {}", e),
        })?;

        let completion = parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        if completion.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        log::debug!("Anthropic response length: {} characters", completion.len());
        Ok(completion)
    }

    fn describe(&self) -> String {
        format!("anthropic/{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::Server) -> AnthropicClient {
        AnthropicClient::new(
            "test-key".to_string(),
            "claude-test".to_string(),
            Some(&format!("{}/v1/messages", server.url())),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_returns_first_text_block() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "claude-test",
                "max_tokens": 4000,
                "messages": [{"role": "user", "content": "analyze"}]
            })))
            .with_status(200)
            .with_body(r#"{"content":[{"type":"text","text":"  [] "}],"stop_reason":"end_turn"}"#)
            .create_async()
            .await;

        let text = client(&server).complete("analyze").await.unwrap();
        assert_eq!(text, "[]");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body(r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#)
            .create_async()
            .await;

        let err = client(&server).complete("analyze").await.unwrap_err();
        assert!(matches!(err, LlmError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_empty_content_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"content":[]}"#)
            .create_async()
            .await;

        let err = client(&server).complete("analyze").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = AnthropicClient::new(
            "secret".to_string(),
            "m".to_string(),
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
