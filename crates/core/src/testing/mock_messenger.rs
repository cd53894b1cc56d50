//! Mock messaging transport for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::messenger::{ChatId, Keyboard, MessageRef, Messenger, MessengerError};

/// What kind of call produced a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentKind {
    Text,
    Edit,
    Photo,
    Document,
}

/// A recorded outbound call for test assertions.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub kind: SentKind,
    pub message: MessageRef,
    /// Text, caption or document caption.
    pub text: String,
    pub keyboard: Keyboard,
    pub photo: Option<String>,
    pub document: Option<PathBuf>,
}

/// A recorded `answer_callback` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAnswer {
    pub callback_id: String,
    pub text: Option<String>,
    pub show_alert: bool,
}

/// Mock implementation of the Messenger trait.
///
/// Keeps the current content of every message it created, and answers an edit
/// that would not change anything with [`MessengerError::NotModified`], like
/// the real transport does.
#[derive(Debug, Default)]
pub struct MockMessenger {
    sent: Arc<RwLock<Vec<SentMessage>>>,
    answers: Arc<RwLock<Vec<RecordedAnswer>>>,
    contents: Arc<RwLock<HashMap<MessageRef, (String, Keyboard)>>>,
    next_error: Arc<RwLock<Option<MessengerError>>>,
    fail_documents: Arc<RwLock<bool>>,
    next_id: Arc<RwLock<i64>>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: MessengerError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every `send_document` fail.
    pub async fn fail_documents(&self, fail: bool) {
        *self.fail_documents.write().await = fail;
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().await.clone()
    }

    /// Text of every recorded call, in order.
    pub async fn texts(&self) -> Vec<String> {
        self.sent.read().await.iter().map(|m| m.text.clone()).collect()
    }

    /// Whether any recorded text contains `needle`.
    pub async fn saw(&self, needle: &str) -> bool {
        self.sent.read().await.iter().any(|m| m.text.contains(needle))
    }

    /// Current text of a message.
    pub async fn current_text(&self, message: MessageRef) -> Option<String> {
        self.contents
            .read()
            .await
            .get(&message)
            .map(|(text, _)| text.clone())
    }

    /// Paths uploaded through `send_document`, in order.
    pub async fn documents(&self) -> Vec<PathBuf> {
        self.sent
            .read()
            .await
            .iter()
            .filter_map(|m| m.document.clone())
            .collect()
    }

    pub async fn answers(&self) -> Vec<RecordedAnswer> {
        self.answers.read().await.clone()
    }

    async fn take_error(&self) -> Option<MessengerError> {
        self.next_error.write().await.take()
    }

    async fn allocate(&self, chat_id: ChatId) -> MessageRef {
        let mut id = self.next_id.write().await;
        *id += 1;
        MessageRef {
            chat_id,
            message_id: *id,
        }
    }

    async fn record(&self, sent: SentMessage) {
        if sent.kind != SentKind::Document {
            self.contents
                .write()
                .await
                .insert(sent.message, (sent.text.clone(), sent.keyboard.clone()));
        }
        self.sent.write().await.push(sent);
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, MessengerError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        let message = self.allocate(chat_id).await;
        self.record(SentMessage {
            kind: SentKind::Text,
            message,
            text: text.to_string(),
            keyboard: keyboard.cloned().unwrap_or_default(),
            photo: None,
            document: None,
        })
        .await;
        Ok(message)
    }

    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        let keyboard = keyboard.cloned().unwrap_or_default();
        if let Some((current, current_kb)) = self.contents.read().await.get(&message) {
            if current == text && *current_kb == keyboard {
                return Err(MessengerError::NotModified);
            }
        }

        self.record(SentMessage {
            kind: SentKind::Edit,
            message,
            text: text.to_string(),
            keyboard,
            photo: None,
            document: None,
        })
        .await;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo_url: &str,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, MessengerError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        let message = self.allocate(chat_id).await;
        self.record(SentMessage {
            kind: SentKind::Photo,
            message,
            text: caption.to_string(),
            keyboard: keyboard.cloned().unwrap_or_default(),
            photo: Some(photo_url.to_string()),
            document: None,
        })
        .await;
        Ok(message)
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef, MessengerError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        if *self.fail_documents.read().await {
            return Err(MessengerError::ApiError("Request Entity Too Large".to_string()));
        }

        let message = self.allocate(chat_id).await;
        self.record(SentMessage {
            kind: SentKind::Document,
            message,
            text: caption.to_string(),
            keyboard: Vec::new(),
            photo: None,
            document: Some(path.to_path_buf()),
        })
        .await;
        Ok(message)
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), MessengerError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        self.answers.write().await.push(RecordedAnswer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
            show_alert,
        });
        Ok(())
    }
}
