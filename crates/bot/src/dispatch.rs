//! Routes chat updates to the selection flow and the download manager.

use std::sync::Arc;

use tracing::{debug, info, warn};

use animedl_core::messenger::{ignore_not_modified, ChatId, Incoming, MessageRef, Messenger};
use animedl_core::selection::{CallbackAction, FlowOutcome, View, INVALID_TEXT};
use animedl_core::text::{escape_html, normalize_query};
use animedl_core::{DownloadLifecycleManager, SelectionFlow, TorrentRecord};

use crate::metrics::UPDATES_TOTAL;

pub const USAGE_TEXT: &str = "👋 Send me the name of an anime and I will look it up.\n\n\
Pick a title, then narrow the releases down by group, quality and audio. \
Confirmed downloads are uploaded here when they finish.";

pub const SEARCHING_TEXT: &str = "🔍 Searching for torrents...";
pub const STARTING_TEXT: &str = "⏳ Starting download...";

/// Handles one update at a time; cheap to share across tasks.
pub struct Dispatcher {
    messenger: Arc<dyn Messenger>,
    flow: Arc<SelectionFlow>,
    downloads: DownloadLifecycleManager,
}

impl Dispatcher {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        flow: Arc<SelectionFlow>,
        downloads: DownloadLifecycleManager,
    ) -> Self {
        Self {
            messenger,
            flow,
            downloads,
        }
    }

    pub async fn handle(&self, update: Incoming) {
        match update {
            Incoming::Text { chat_id, text, .. } => {
                UPDATES_TOTAL.with_label_values(&["text"]).inc();
                self.on_text(chat_id, &text).await;
            }
            Incoming::Callback {
                callback_id,
                message,
                data,
            } => {
                UPDATES_TOTAL.with_label_values(&["callback"]).inc();
                self.on_callback(&callback_id, message, &data).await;
            }
        }
    }

    async fn on_text(&self, chat_id: ChatId, text: &str) {
        let command = text.split_whitespace().next().unwrap_or_default();
        // Commands may carry the bot name: /start@animedlbot
        let command = command.split('@').next().unwrap_or_default();
        if command == "/start" || command == "/help" {
            self.send(chat_id, &View::text(USAGE_TEXT)).await;
            return;
        }

        let query = normalize_query(text);
        if query.is_empty() {
            self.send(chat_id, &View::text(USAGE_TEXT)).await;
            return;
        }

        debug!(chat_id = chat_id, query = %query, "Title search");
        let view = self.flow.search_titles(chat_id, &query).await;
        self.send(chat_id, &view).await;
    }

    async fn on_callback(&self, callback_id: &str, message: MessageRef, data: &str) {
        let action = match data.parse::<CallbackAction>() {
            Ok(action) => action,
            Err(e) => {
                warn!(chat_id = message.chat_id, error = %e, "Unrecognised callback");
                self.answer(callback_id, Some(INVALID_TEXT), false).await;
                return;
            }
        };

        // The details message is a photo; torrent options go to a fresh message.
        let target = if matches!(action, CallbackAction::ShowOptions(_)) {
            self.answer(callback_id, None, false).await;
            match self
                .messenger
                .send_text(message.chat_id, SEARCHING_TEXT, None)
                .await
            {
                Ok(sent) => sent,
                Err(e) => {
                    warn!(chat_id = message.chat_id, error = %e, "Failed to send search notice");
                    return;
                }
            }
        } else {
            message
        };

        let outcome = self.flow.handle(message.chat_id, &action).await;

        match outcome {
            FlowOutcome::Alert(text) => {
                self.answer(callback_id, Some(&text), true).await;
            }
            FlowOutcome::Render(view) => {
                if target == message {
                    self.answer(callback_id, None, false).await;
                }
                self.render(target, &view).await;
            }
            FlowOutcome::Download(record) => {
                self.answer(callback_id, None, false).await;
                self.start_download(target, &record).await;
            }
        }
    }

    async fn start_download(&self, target: MessageRef, record: &TorrentRecord) {
        if let Err(e) = ignore_not_modified(
            self.messenger.edit_text(target, STARTING_TEXT, None).await,
        ) {
            warn!(chat_id = target.chat_id, error = %e, "Failed to update message");
        }

        match self.downloads.submit(target.chat_id, target, record).await {
            Ok(job) => {
                info!(job_id = %job.id, chat_id = target.chat_id, "Download started");
            }
            Err(e) => {
                warn!(chat_id = target.chat_id, error = %e, "Failed to start download");
                let text = format!(
                    "❌ Could not start the download: {}",
                    escape_html(&e.to_string())
                );
                if let Err(e) =
                    ignore_not_modified(self.messenger.edit_text(target, &text, None).await)
                {
                    warn!(chat_id = target.chat_id, error = %e, "Failed to update message");
                }
            }
        }
    }

    /// Apply a view to an existing message.
    ///
    /// Photo views and messages that cannot be edited into text end up as a
    /// new message instead.
    async fn render(&self, target: MessageRef, view: &View) {
        if view.photo.is_some() {
            self.send(target.chat_id, view).await;
            return;
        }

        let keyboard = (!view.keyboard.is_empty()).then_some(&view.keyboard);
        let result = self.messenger.edit_text(target, &view.text, keyboard).await;
        if let Err(e) = ignore_not_modified(result) {
            debug!(chat_id = target.chat_id, error = %e, "Edit rejected, sending instead");
            self.send(target.chat_id, view).await;
        }
    }

    async fn send(&self, chat_id: ChatId, view: &View) {
        let keyboard = (!view.keyboard.is_empty()).then_some(&view.keyboard);
        let result = match &view.photo {
            Some(photo) => {
                self.messenger
                    .send_photo(chat_id, photo, &view.text, keyboard)
                    .await
            }
            None => self.messenger.send_text(chat_id, &view.text, keyboard).await,
        };

        if let Err(e) = result {
            warn!(chat_id = chat_id, error = %e, "Failed to send message");
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>, show_alert: bool) {
        if let Err(e) = self
            .messenger
            .answer_callback(callback_id, text, show_alert)
            .await
        {
            debug!(callback_id = callback_id, error = %e, "Failed to answer callback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use animedl_core::searcher::Aggregator;
    use animedl_core::testing::{
        fixtures, ManualScheduler, MockAgent, MockCatalog, MockIndex, MockMessenger, SentKind,
    };
    use animedl_core::{LifecycleConfig, SelectionCache};

    const CHAT: i64 = 77;

    struct TestHarness {
        messenger: Arc<MockMessenger>,
        index: Arc<MockIndex>,
        catalog: Arc<MockCatalog>,
        agent: Arc<MockAgent>,
        scheduler: Arc<ManualScheduler>,
        dispatcher: Dispatcher,
    }

    impl TestHarness {
        fn new() -> Self {
            let messenger = Arc::new(MockMessenger::new());
            let index = Arc::new(MockIndex::new());
            let catalog = Arc::new(MockCatalog::new());
            let agent = Arc::new(MockAgent::new());
            let scheduler = Arc::new(ManualScheduler::new());

            let flow = Arc::new(SelectionFlow::new(
                Aggregator::new(index.clone()),
                Arc::new(SelectionCache::new()),
                catalog.clone(),
            ));
            let downloads = DownloadLifecycleManager::new(
                agent.clone(),
                messenger.clone(),
                scheduler.clone(),
                LifecycleConfig::default(),
            );
            let dispatcher = Dispatcher::new(messenger.clone(), flow, downloads);

            Self {
                messenger,
                index,
                catalog,
                agent,
                scheduler,
                dispatcher,
            }
        }

        async fn text(&self, text: &str) {
            self.dispatcher
                .handle(Incoming::Text {
                    chat_id: CHAT,
                    message_id: 1,
                    text: text.to_string(),
                })
                .await;
        }

        /// Press the button starting with `label` on the last message that has one.
        async fn press(&self, label: &str) {
            let sent = self.messenger.sent().await;
            let (message, data) = sent
                .iter()
                .rev()
                .find_map(|s| {
                    s.keyboard
                        .iter()
                        .flatten()
                        .find(|b| b.label.starts_with(label))
                        .map(|b| (s.message, b.data.clone()))
                })
                .unwrap_or_else(|| panic!("no button {:?}", label));

            self.dispatcher
                .handle(Incoming::Callback {
                    callback_id: format!("cb-{}", label),
                    message,
                    data,
                })
                .await;
        }
    }

    #[tokio::test]
    async fn test_start_and_help_send_usage() {
        let h = TestHarness::new();
        h.text("/start").await;
        h.text("/help@animedlbot").await;

        assert_eq!(h.messenger.texts().await, vec![USAGE_TEXT, USAGE_TEXT]);
    }

    #[tokio::test]
    async fn test_text_searches_titles() {
        let h = TestHarness::new();
        h.catalog
            .set_titles(
                "frieren",
                vec![fixtures::catalog_title(1, "Frieren", &["Sousou no Frieren"])],
            )
            .await;

        h.text("@animedlbot frieren").await;

        let sent = h.messenger.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, SentKind::Text);
        assert_eq!(sent[0].text, "Select a title:");
        assert_eq!(sent[0].keyboard[0][0].label, "Frieren");
    }

    #[tokio::test]
    async fn test_updates_are_handled_on_spawned_tasks() {
        let h = TestHarness::new();
        h.index
            .set_rows(
                "Example",
                vec![fixtures::raw_row("[Grp] Example - 01 (720p)", "e1", "300 MiB", 5)],
            )
            .await;
        let view = h.dispatcher.flow.search(CHAT, &["Example".to_string()]).await;
        let target = h
            .messenger
            .send_text(CHAT, &view.text, Some(&view.keyboard))
            .await
            .unwrap();

        let dispatcher = Arc::new(h.dispatcher);
        let update = Incoming::Callback {
            callback_id: "cb-spawned".to_string(),
            message: target,
            data: view.keyboard[0][0].data.clone(),
        };
        let task = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.handle(update).await })
        };
        task.await.unwrap();

        assert_eq!(
            h.messenger.current_text(target).await.as_deref(),
            Some("✨ Select video quality:")
        );
    }

    #[tokio::test]
    async fn test_invalid_callback_is_answered() {
        let h = TestHarness::new();
        h.dispatcher
            .handle(Incoming::Callback {
                callback_id: "cb1".to_string(),
                message: fixtures::message_ref(CHAT, 5),
                data: "bogus".to_string(),
            })
            .await;

        let answers = h.messenger.answers().await;
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].text.as_deref(), Some(INVALID_TEXT));
        assert!(h.messenger.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_full_dialogue_submits_download() {
        let h = TestHarness::new();
        h.catalog
            .set_titles(
                "frieren",
                vec![fixtures::catalog_title(1, "Frieren", &["Sousou no Frieren"])],
            )
            .await;
        h.catalog.set_details(fixtures::media_details(1, "Frieren")).await;
        h.index
            .set_rows(
                "Sousou no Frieren",
                vec![fixtures::raw_row(
                    "[SubsPlease] Sousou no Frieren - 01 (1080p)",
                    "f1",
                    "1.4 GiB",
                    40,
                )],
            )
            .await;

        h.text("frieren").await;
        h.press("Frieren").await;

        let sent = h.messenger.sent().await;
        let photo = sent.last().unwrap();
        assert_eq!(photo.kind, SentKind::Photo);
        assert_eq!(photo.photo.as_deref(), Some("https://img.example/1.jpg"));

        h.press("📥 Show downloading options").await;
        assert!(h.messenger.saw(SEARCHING_TEXT).await);
        let groups = h.messenger.sent().await.last().unwrap().clone();
        assert_eq!(groups.kind, SentKind::Edit);
        assert_eq!(groups.text, "🎬 Select a release group:");

        h.press("📁 SubsPlease").await;
        h.press("💿 1080p").await;
        h.press("Sousou no Frieren - 01").await;
        h.press("✅ Yes").await;

        assert_eq!(
            h.agent.added_magnets().await,
            vec![fixtures::magnet(
                "f1",
                "[SubsPlease] Sousou no Frieren - 01 (1080p)"
            )]
        );
        assert_eq!(
            h.messenger.current_text(groups.message).await.as_deref(),
            Some("📥 Download added to queue: <b>[SubsPlease] Sousou no Frieren - 01 (1080p)</b>")
        );
        assert_eq!(h.scheduler.pending(), 1);
    }

    #[tokio::test]
    async fn test_bundle_info_is_an_alert() {
        let h = TestHarness::new();
        h.dispatcher
            .handle(Incoming::Callback {
                callback_id: "cb-info".to_string(),
                message: fixtures::message_ref(CHAT, 9),
                data: CallbackAction::Info.to_data(),
            })
            .await;

        let answers = h.messenger.answers().await;
        assert_eq!(answers.len(), 1);
        assert!(answers[0].show_alert);
        assert!(answers[0].text.is_some());
        assert!(h.messenger.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_submit_is_reported() {
        let h = TestHarness::new();
        h.index
            .set_rows(
                "Example",
                vec![fixtures::raw_row("[Grp] Example - 01 (720p)", "e1", "300 MiB", 5)],
            )
            .await;
        h.agent
            .set_next_error(animedl_core::AgentError::ConnectionFailed(
                "refused".to_string(),
            ))
            .await;

        // Seed the dialogue without a catalog step.
        let view = h_search(&h, "Example").await;
        let target = h
            .messenger
            .send_text(CHAT, &view.text, Some(&view.keyboard))
            .await
            .unwrap();

        h.press("📁 Grp").await;
        h.press("💿 720p").await;
        h.press("Example - 01").await;
        h.press("✅ Yes").await;

        let text = h.messenger.current_text(target).await.unwrap();
        assert!(text.starts_with("❌ Could not start the download"));
        assert_eq!(h.scheduler.pending(), 0);
    }

    async fn h_search(h: &TestHarness, query: &str) -> View {
        h.dispatcher.flow.search(CHAT, &[query.to_string()]).await
    }
}
