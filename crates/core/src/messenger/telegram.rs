//! Telegram Bot API client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Body, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::types::{ChatId, Incoming, Keyboard, MessageRef, Messenger, MessengerError};
use crate::config::TelegramConfig;

const PARSE_MODE: &str = "HTML";

/// Telegram caps photo captions at 1024 characters.
const CAPTION_MAX_CHARS: usize = 1024;

/// Bot API client over plain HTTPS.
pub struct TelegramMessenger {
    client: Client,
    config: TelegramConfig,
}

impl TelegramMessenger {
    pub fn new(config: TelegramConfig) -> Result<Self, MessengerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| {
                MessengerError::ConnectionFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
    ) -> Result<T, MessengerError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(MessengerError::from_reqwest)?;

        parse_response(method, response).await
    }

    /// Long-poll for new updates after `offset`.
    ///
    /// Returns `(update_id, event)` pairs. Updates the bot does not handle are
    /// still acknowledged through their id so they are not delivered again.
    pub async fn get_updates(
        &self,
        offset: i64,
    ) -> Result<Vec<(i64, Option<Incoming>)>, MessengerError> {
        let long_poll = self.config.long_poll_secs as u64;
        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(
                long_poll + self.config.timeout_secs as u64,
            ))
            .json(&json!({
                "offset": offset,
                "timeout": long_poll,
                "allowed_updates": ["message", "callback_query"],
            }))
            .send()
            .await
            .map_err(MessengerError::from_reqwest)?;

        let updates: Vec<TgUpdate> = parse_response("getUpdates", response).await?;
        Ok(updates
            .into_iter()
            .map(|u| (u.update_id, u.into_incoming()))
            .collect())
    }
}

async fn parse_response<T: DeserializeOwned>(
    method: &str,
    response: reqwest::Response,
) -> Result<T, MessengerError> {
    let status = response.status();
    let text = response.text().await.map_err(MessengerError::from_reqwest)?;

    let envelope: TgResponse<T> = serde_json::from_str(&text).map_err(|e| {
        MessengerError::ParseError(format!("{} (HTTP {}): {}", method, status, e))
    })?;

    envelope.into_result(method)
}

fn reply_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Vec<Value>> = keyboard
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| json!({ "text": b.label, "callback_data": b.data }))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

fn truncate_caption(caption: &str) -> String {
    if caption.chars().count() <= CAPTION_MAX_CHARS {
        return caption.to_string();
    }
    let mut out: String = caption.chars().take(CAPTION_MAX_CHARS - 1).collect();
    out.push('…');
    out
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, MessengerError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": PARSE_MODE,
            "disable_web_page_preview": true,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = reply_markup(kb);
        }

        let message: TgMessage = self.call("sendMessage", body).await?;
        Ok(message.reference())
    }

    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError> {
        let mut body = json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
            "text": text,
            "parse_mode": PARSE_MODE,
            "disable_web_page_preview": true,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = reply_markup(kb);
        }

        // Returns the edited message, or `true` for inline messages.
        let _: Value = self.call("editMessageText", body).await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo_url: &str,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, MessengerError> {
        let mut body = json!({
            "chat_id": chat_id,
            "photo": photo_url,
            "caption": truncate_caption(caption),
            "parse_mode": PARSE_MODE,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = reply_markup(kb);
        }

        let message: TgMessage = self.call("sendPhoto", body).await?;
        Ok(message.reference())
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef, MessengerError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| MessengerError::Io(format!("{}: {}", path.display(), e)))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| MessengerError::Io(format!("{}: {}", path.display(), e)))?
            .len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        debug!(path = %path.display(), bytes = length, "Uploading document");

        let part = multipart::Part::stream_with_length(Body::from(file), length)
            .file_name(file_name);
        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", truncate_caption(caption))
            .text("parse_mode", PARSE_MODE)
            .part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .timeout(Duration::from_secs(self.config.upload_timeout_secs as u64))
            .multipart(form)
            .send()
            .await
            .map_err(MessengerError::from_reqwest)?;

        let message: TgMessage = parse_response("sendDocument", response).await?;
        Ok(message.reference())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), MessengerError> {
        let mut body = json!({
            "callback_query_id": callback_id,
            "show_alert": show_alert,
        });
        if let Some(text) = text {
            body["text"] = json!(text);
        }

        let _: bool = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }
}

// =============================================================================
// Bot API response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TgResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

impl<T> TgResponse<T> {
    fn into_result(self, method: &str) -> Result<T, MessengerError> {
        if !self.ok {
            let description = self.description.unwrap_or_default();
            if description.contains("message is not modified") {
                return Err(MessengerError::NotModified);
            }
            return Err(MessengerError::ApiError(format!(
                "{} failed ({}): {}",
                method,
                self.error_code.unwrap_or_default(),
                description
            )));
        }

        self.result
            .ok_or_else(|| MessengerError::ParseError(format!("{}: missing result", method)))
    }
}

#[derive(Debug, Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
    callback_query: Option<TgCallbackQuery>,
}

impl TgUpdate {
    fn into_incoming(self) -> Option<Incoming> {
        if let Some(cb) = self.callback_query {
            let message = cb.message?;
            return Some(Incoming::Callback {
                callback_id: cb.id,
                message: message.reference(),
                data: cb.data.unwrap_or_default(),
            });
        }

        let message = self.message?;
        let text = message.text.clone()?;
        Some(Incoming::Text {
            chat_id: message.chat.id,
            message_id: message.message_id,
            text,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    chat: TgChat,
    text: Option<String>,
}

impl TgMessage {
    fn reference(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat.id,
            message_id: self.message_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgCallbackQuery {
    id: String,
    message: Option<TgMessage>,
    data: Option<String>,
}
