use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;

/// Produces a reply to a user's free-text message.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, user_text: &str) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Wrap the user's complaint in the houseplant role-play prompt.
pub fn plant_prompt(user_text: &str) -> String {
    format!(
        "You are a houseplant. The user describes a problem, like yellow leaves or too much water.\n\
         Reply as if you're the plant: emotional, dramatic, or witty, but helpful.\n\
         End with a tip for plant care.\n\n\
         User: {user_text}"
    )
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    /// Send one completion request and return the first choice's text.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        debug!("Sending completion request to {} (model {})", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to the completion API")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion API error ({}): {}", status, error_body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("No choices in completion response")?;

        let trimmed = content.trim();
        if trimmed.is_empty() {
            anyhow::bail!("Completion API returned an empty reply");
        }
        Ok(trimmed.to_string())
    }
}

#[async_trait]
impl ReplyGenerator for LlmClient {
    async fn generate(&self, user_text: &str) -> Result<String> {
        let messages = vec![
            ChatMessage::new("system", self.config.system_prompt.clone()),
            ChatMessage::new("user", plant_prompt(user_text)),
        ];
        self.chat(messages).await
    }
}
