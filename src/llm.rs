//! Chat-completion capability and the VibeRouter transport adapter.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.viberouter.dev/v1";

/// A chat message exchanged with the model.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Payload sent to the chat completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// A single completion alternative.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: String,
    #[serde(default)]
    pub index: u32,
}

/// The subset of the API response the radar consumes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// Capability to perform chat completions.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat_completion(&self, req: ChatCompletionRequest) -> Result<ChatCompletionResponse>;
}

/// Thin wrapper around the VibeRouter REST API.
pub struct Client {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl Client {
    /// `timeout` bounds the whole request; connects are capped at 4s.
    pub fn new(api_key: &str, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("news-radar/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("llm: build http client")?;
        Ok(Self {
            base_url: base_url
                .filter(|u| !u.is_empty())
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }
}

#[async_trait]
impl ChatClient for Client {
    async fn chat_completion(&self, req: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        if self.api_key.is_empty() {
            bail!("llm: missing API key");
        }

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("llm: request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(4096).collect();
            bail!("llm: api error {}: {}", status.as_u16(), excerpt);
        }

        resp.json::<ChatCompletionResponse>()
            .await
            .context("llm: decode response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_api_key_is_rejected_before_any_io() {
        let client = Client::new("", None, Duration::from_secs(30)).unwrap();
        let req = ChatCompletionRequest {
            model: "gemini-2.5-flash".into(),
            messages: vec![Message::new("user", "hi")],
            temperature: None,
            max_tokens: None,
            top_p: None,
        };
        let err = client.chat_completion(req).await.unwrap_err();
        assert!(err.to_string().contains("missing API key"));
    }

    #[test]
    fn response_decodes_with_missing_optional_fields() {
        let resp: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"hello"}}]}"#).unwrap();
        assert_eq!(resp.choices[0].message.content, "hello");
    }
}
