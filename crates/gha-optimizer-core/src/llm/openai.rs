use super::{build_http_client, status_error, LlmClient, LlmError};
use crate::error::Result;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI chat completions client, kept for configurations that still select it.
pub struct OpenAiClient {
    api_key: String,
    model: String,
    api_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, api_url: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key,
            model,
            api_url: api_url.unwrap_or(DEFAULT_API_URL).to_string(),
            client: build_http_client(timeout)?,
        })
    }
}

impl LlmClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 4000,
            "temperature": 0.3,
            "messages": [{
                "role": "user",
                "content": prompt
            }]
        });

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| LlmError::Status {
            status: status.as_u16(),
            message: format!("unexpected response body: {}", e),
        })?;

        let completion = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();

        if completion.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(completion)
    }

    fn describe(&self) -> String {
        format!("openai/{}", self.model)
    }
}
