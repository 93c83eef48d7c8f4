//! Thin Telegram Bot API adapter.
//!
//! Long-polled `getUpdates` with offset tracking, `sendMessage`, and a
//! multipart `sendPhoto`. Only messages from the configured chat are
//! surfaced; everything else is consumed and dropped.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::dispatcher::ChatTransport;
use crate::error::{BotError, Result};

/// Long-poll window passed to `getUpdates`.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Telegram Bot API client bound to one bot token and one chat.
#[derive(Debug)]
pub struct TelegramApi {
    http: reqwest::Client,
    base_url: String,
    chat_id: i64,
    offset: Mutex<i64>,
}

impl TelegramApi {
    /// Build a client for the given token and chat.
    pub fn new(bot_token: &str, chat_id: i64) -> Result<Self> {
        // The HTTP timeout must sit above the long-poll window.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 30))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("https://api.telegram.org/bot{bot_token}"),
            chat_id,
            offset: Mutex::new(0),
        })
    }

    /// `getMe`, returning the bot username.
    pub async fn get_me(&self) -> Result<Option<String>> {
        let result = self.call("getMe", &Value::Null).await?;
        Ok(result["username"].as_str().map(str::to_owned))
    }

    async fn call(&self, method: &str, payload: &Value) -> Result<Value> {
        let url = format!("{}/{method}", self.base_url);
        let request = self.http.post(url);
        let request = if payload.is_null() {
            request
        } else {
            request.json(payload)
        };
        let response: Value = request.send().await?.json().await?;
        if !response["ok"].as_bool().unwrap_or(false) {
            return Err(BotError::Api(response.to_string()));
        }
        Ok(response["result"].clone())
    }

    fn advance_offset(&self, update_id: i64) {
        let mut offset = self.offset.lock().expect("offset mutex poisoned");
        *offset = (*offset).max(update_id + 1);
    }

    fn extract_text(&self, update: &Value) -> Option<String> {
        let message = &update["message"];
        if message["chat"]["id"].as_i64() != Some(self.chat_id) {
            return None;
        }
        let text = message["text"].as_str()?.trim();
        (!text.is_empty()).then(|| text.to_owned())
    }
}

#[async_trait]
impl ChatTransport for TelegramApi {
    async fn poll_messages(&self) -> Result<Vec<String>> {
        let offset = *self.offset.lock().expect("offset mutex poisoned");
        let payload = serde_json::json!({
            "offset": offset,
            "timeout": POLL_TIMEOUT_SECS,
            "allowed_updates": ["message"],
        });
        let result = self.call("getUpdates", &payload).await?;
        let Some(updates) = result.as_array() else {
            return Ok(Vec::new());
        };
        let mut texts = Vec::new();
        for update in updates {
            if let Some(update_id) = update["update_id"].as_i64() {
                self.advance_offset(update_id);
            }
            if let Some(text) = self.extract_text(update) {
                debug!(len = text.len(), "Inbound chat message");
                texts.push(text);
            }
        }
        Ok(texts)
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let payload = serde_json::json!({"chat_id": self.chat_id, "text": text});
        self.call("sendMessage", &payload).await?;
        Ok(())
    }

    async fn send_photo(&self, image: &[u8], caption: &str) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("screenshot.png")
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", self.chat_id.to_string())
            .text("caption", caption.to_owned())
            .part("photo", part);
        let url = format!("{}/sendPhoto", self.base_url);
        let response: Value = self.http.post(url).multipart(form).send().await?.json().await?;
        if !response["ok"].as_bool().unwrap_or(false) {
            return Err(BotError::Api(response.to_string()));
        }
        Ok(())
    }
}
