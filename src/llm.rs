//! Language-model responder
//!
//! Sends the cycle's message list to an OpenAI-compatible chat-completions
//! endpoint and returns the reply text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::prompt::ChatMessage;
use crate::{Error, Result};

/// Generates the robot's reply
#[async_trait]
pub trait Responder: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Chat-completions client
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

/// Chat-completions request
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

/// Chat-completions response
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatClient {
    /// Create a new chat client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, base_url: String, model: String, max_tokens: u32) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("API key required for chat completions".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens,
        })
    }

    /// Build a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the `OpenAI` key is missing
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.openai_key()?.to_string(),
            config.llm.base_url.clone(),
            config.llm.model.clone(),
            config.llm.max_tokens,
        )
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Responder for ChatClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        tracing::debug!(model = %self.model, messages = messages.len(), "requesting completion");

        let request = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("API error {status}: {body}")));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("failed to parse response: {e}")))?;

        reply_text(body)
    }
}

/// Extract the first non-empty reply
fn reply_text(response: CompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .find_map(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| Error::Generation("model returned an empty reply".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let request = CompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            max_tokens: 300,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 300);
    }

    #[test]
    fn test_reply_extraction() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Hello, I am Charlie. "}}]}"#;
        let response: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(reply_text(response).unwrap(), "Hello, I am Charlie.");
    }

    #[test]
    fn test_empty_reply_is_error() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let response: CompletionResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(reply_text(response), Err(Error::Generation(_))));

        let response: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(reply_text(response).is_err());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ChatClient::new(
            "sk-test".to_string(),
            "https://example.com/v1/".to_string(),
            "m".to_string(),
            10,
        )
        .unwrap();
        assert_eq!(client.base_url, "https://example.com/v1");
        assert_eq!(client.model(), "m");
    }
}
