//! Types for the messaging transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Conversation identifier. Doubles as the selection session id.
pub type ChatId = i64;

/// A message that can be edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// An inline button: visible label plus opaque callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Rows of inline buttons.
pub type Keyboard = Vec<Vec<Button>>;

/// Inbound event from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Plain text message.
    Text {
        chat_id: ChatId,
        message_id: i64,
        text: String,
    },
    /// Inline button press.
    Callback {
        callback_id: String,
        message: MessageRef,
        data: String,
    },
}

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum MessengerError {
    /// The edit would not change the message. Callers treat this as success.
    #[error("Message is not modified")]
    NotModified,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Failed to read file: {0}")]
    Io(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl MessengerError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MessengerError::Timeout
        } else if e.is_connect() {
            MessengerError::ConnectionFailed(e.to_string())
        } else {
            MessengerError::ApiError(e.to_string())
        }
    }
}

/// Outbound side of the messaging transport.
///
/// All text is HTML-formatted.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, MessengerError>;

    /// Replace the text (and keyboard) of an existing message.
    ///
    /// Returns [`MessengerError::NotModified`] when nothing would change.
    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError>;

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo_url: &str,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, MessengerError>;

    /// Upload a local file as a document.
    async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef, MessengerError>;

    /// Acknowledge a button press, optionally with a toast or alert.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), MessengerError>;
}
