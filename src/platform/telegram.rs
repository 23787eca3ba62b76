use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TelegramConfig;
use crate::platform::{ChatId, Messenger};

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Standard Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct File {
    #[serde(default)]
    file_path: Option<String>,
}

#[derive(Serialize)]
struct GetFile<'a> {
    file_id: &'a str,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a ChatId,
    text: &'a str,
}

#[derive(Serialize)]
struct SetWebhook<'a> {
    url: &'a str,
}

/// Thin Bot API client over reqwest.
pub struct TelegramClient {
    client: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    fn api_base(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    // The token is part of every URL: log the method name only and strip
    // URLs from reqwest errors.
    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{}", self.api_base(), self.config.bot_token, method);
        debug!("Calling Telegram {}", method);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Failed to call Telegram {}", method))?;

        let status = response.status();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Failed to parse Telegram {} response ({})", method, status))?;

        if !envelope.ok {
            anyhow::bail!(
                "Telegram {} failed ({}): {}",
                method,
                status,
                envelope.description.unwrap_or_default()
            );
        }
        envelope
            .result
            .with_context(|| format!("Telegram {} returned no result", method))
    }

    /// Register `url` as this bot's webhook.
    pub async fn set_webhook(&self, url: &str) -> Result<()> {
        let _: bool = self.call("setWebhook", &SetWebhook { url }).await?;
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn get_file_path(&self, file_id: &str) -> Result<String> {
        let file: File = self.call("getFile", &GetFile { file_id }).await?;
        file.file_path
            .with_context(|| format!("Telegram file {} has no download path", file_id))
    }

    async fn download_file(&self, file_path: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/file/bot{}/{}",
            self.api_base(),
            self.config.bot_token,
            file_path
        );
        debug!("Downloading Telegram file {}", file_path);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to download Telegram file")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Telegram file download failed ({})", status);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to read Telegram file body")?;
        Ok(bytes.to_vec())
    }

    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<()> {
        let text = truncate_message(text, MAX_MESSAGE_LEN);
        let _: serde_json::Value = self
            .call("sendMessage", &SendMessage { chat_id, text })
            .await?;
        Ok(())
    }
}

/// Cut `text` to at most `max_chars` characters without splitting a char.
pub fn truncate_message(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
