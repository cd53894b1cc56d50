//! Drives the narrowing dialogue: title -> release group -> quality -> audio
//! -> page -> item -> confirmation.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{
    CallbackAction, Payload, SelectionCache, SelectionError, SelectionToken, SessionId,
    SessionStore,
};
use crate::catalog::{CatalogLookup, MediaDetails};
use crate::messenger::{Button, Keyboard};
use crate::metrics;
use crate::searcher::{
    group_by_resolution, item_label, paginate, sort_by_episode, split_audio, Aggregator, AudioSplit,
    ResultGroup, SearchError, TorrentRecord,
};
use crate::text::{escape_html, sanitize_description};

pub const NO_TITLES_TEXT: &str = "No results found.";
pub const CATALOG_FAILED_TEXT: &str = "⚠️ Title lookup failed. Please try again later.";
pub const DETAILS_FAILED_TEXT: &str = "Could not fetch details. Please try another title.";
pub const NO_TORRENTS_TEXT: &str =
    "❌ No torrents found. Try a different anime or check the spelling.";
pub const INDEX_FAILED_TEXT: &str =
    "⚠️ The torrent index could not be reached. Please try again later.";
pub const EXPIRED_TEXT: &str = "Selection expired. Please search again.";
pub const INVALID_TEXT: &str = "Invalid selection.";
pub const CANCELED_TEXT: &str = "Canceled.";
pub const BUNDLE_INFO_TEXT: &str = "This icon indicates the torrent is an oversized bundle.";

/// Something to show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// HTML-formatted text, or the caption when `photo` is set.
    pub text: String,
    pub keyboard: Keyboard,
    /// Photo URL; the view is then sent as a new photo message.
    pub photo: Option<String>,
}

impl View {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
            photo: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard,
            photo: None,
        }
    }

    /// Every button, row by row.
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.keyboard.iter().flatten()
    }
}

/// Result of one user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Replace the interaction's message with this view.
    Render(View),
    /// The user confirmed a release.
    Download(TorrentRecord),
    /// Answer the button press with an alert; the message stays as is.
    Alert(String),
}

/// Turns text searches and button presses into views.
pub struct SelectionFlow {
    aggregator: Aggregator,
    cache: Arc<SelectionCache>,
    catalog: Arc<dyn CatalogLookup>,
}

impl SelectionFlow {
    pub fn new(
        aggregator: Aggregator,
        cache: Arc<SelectionCache>,
        catalog: Arc<dyn CatalogLookup>,
    ) -> Self {
        Self {
            aggregator,
            cache,
            catalog,
        }
    }

    pub fn cache(&self) -> &Arc<SelectionCache> {
        &self.cache
    }

    /// Offer catalog titles for free text.
    pub async fn search_titles(&self, session: SessionId, text: &str) -> View {
        let titles = match self.catalog.search_titles(text).await {
            Ok(titles) => titles,
            Err(e) => {
                warn!(catalog = self.catalog.name(), error = %e, "Title lookup failed");
                return View::text(CATALOG_FAILED_TEXT);
            }
        };

        if titles.is_empty() {
            debug!(text = %text, "No catalog titles");
            return View::text(NO_TITLES_TEXT);
        }

        let mut store = self.cache.lock(session).await;
        let keyboard = titles
            .into_iter()
            .map(|title| {
                let token = SelectionToken::for_key(&format!("title:{}", title.id));
                let button = Button::new(
                    title.display.clone(),
                    CallbackAction::PickTitle(token.clone()).to_data(),
                );
                store.put(token, Payload::Title(title));
                vec![button]
            })
            .collect();

        View::with_keyboard("Select a title:", keyboard)
    }

    /// Search the index directly with a query list.
    pub async fn search(&self, session: SessionId, queries: &[String]) -> View {
        let mut store = self.cache.lock(session).await;
        self.search_into(&mut store, queries).await
    }

    /// Parse raw button data and handle it.
    pub async fn handle_data(&self, session: SessionId, data: &str) -> FlowOutcome {
        match data.parse::<CallbackAction>() {
            Ok(action) => self.handle(session, &action).await,
            Err(e) => {
                warn!(session = session, error = %e, "Unrecognised callback");
                FlowOutcome::Render(View::text(INVALID_TEXT))
            }
        }
    }

    /// Handle a button press.
    ///
    /// Never fails: a missing token renders as expired, a mismatched payload
    /// as an invalid selection.
    pub async fn handle(&self, session: SessionId, action: &CallbackAction) -> FlowOutcome {
        let mut store = self.cache.lock(session).await;

        match self.dispatch(&mut store, action).await {
            Ok(outcome) => outcome,
            Err(SelectionError::Expired(token)) => {
                debug!(session = session, token = %token, "Selection expired");
                metrics::EXPIRED_SELECTIONS.inc();
                FlowOutcome::Render(View::text(EXPIRED_TEXT))
            }
            Err(e) => {
                warn!(session = session, error = %e, "Invalid selection");
                FlowOutcome::Render(View::text(INVALID_TEXT))
            }
        }
    }

    async fn dispatch(
        &self,
        store: &mut SessionStore,
        action: &CallbackAction,
    ) -> Result<FlowOutcome, SelectionError> {
        let view = match action {
            CallbackAction::PickTitle(token) => {
                let title = store.title(token)?;
                match self.catalog.fetch_details(title.id).await {
                    Ok(details) => {
                        let options = token.derive("xs");
                        store.put(options.clone(), Payload::Queries(title.queries));
                        View {
                            text: detail_caption(&details),
                            keyboard: vec![vec![Button::new(
                                "📥 Show downloading options",
                                CallbackAction::ShowOptions(options).to_data(),
                            )]],
                            photo: details.cover_image,
                        }
                    }
                    Err(e) => {
                        warn!(id = title.id, error = %e, "Detail lookup failed");
                        View::text(DETAILS_FAILED_TEXT)
                    }
                }
            }
            CallbackAction::ShowOptions(token) => {
                let queries = store.queries(token)?;
                self.search_into(store, &queries).await
            }
            CallbackAction::Group(token) => {
                let records = store.records(token)?;
                let keyboard = group_by_resolution(records)
                    .into_iter()
                    .map(|group| {
                        let child = token.derive(&group.label);
                        let button = Button::new(
                            bucket_label("💿", &group),
                            CallbackAction::Quality(child.clone()).to_data(),
                        );
                        store.put(child, Payload::Records(group.records));
                        vec![button]
                    })
                    .collect();
                View::with_keyboard("✨ Select video quality:", keyboard)
            }
            CallbackAction::Quality(token) => match split_audio(store.records(token)?) {
                AudioSplit::Mixed { sub, dub } => {
                    let sub_token = token.derive("sub");
                    let dub_token = token.derive("dub");
                    store.put(sub_token.clone(), Payload::Records(sub));
                    store.put(dub_token.clone(), Payload::Records(dub));
                    View::with_keyboard(
                        "🎤 Select audio type:",
                        vec![vec![
                            Button::new("Sub", CallbackAction::Audio(sub_token).to_data()),
                            Button::new("Dub", CallbackAction::Audio(dub_token).to_data()),
                        ]],
                    )
                }
                AudioSplit::Single(records) => list_items(store, token, records),
            },
            CallbackAction::Audio(token) => {
                let records = store.records(token)?;
                list_items(store, token, records)
            }
            CallbackAction::Page { token, page } => {
                let records = store.records(token)?;
                render_page(store, token, &records, *page)
            }
            CallbackAction::Item(token) => {
                let record = store.record(token)?;
                confirmation(token, &record)
            }
            CallbackAction::Confirm(token) => {
                return Ok(FlowOutcome::Download(store.record(token)?));
            }
            CallbackAction::Cancel => View::text(CANCELED_TEXT),
            CallbackAction::Info => return Ok(FlowOutcome::Alert(BUNDLE_INFO_TEXT.to_string())),
        };

        Ok(FlowOutcome::Render(view))
    }

    async fn search_into(&self, store: &mut SessionStore, queries: &[String]) -> View {
        let result = match self.aggregator.search(queries).await {
            Ok(result) => result,
            Err(SearchError::NoResults) => {
                debug!(queries = ?queries, "No torrents found");
                return View::text(NO_TORRENTS_TEXT);
            }
            Err(e) => {
                warn!(queries = ?queries, error = %e, "Torrent search failed");
                return View::text(INDEX_FAILED_TEXT);
            }
        };

        let root = queries.first().map(String::as_str).unwrap_or_default();
        let keyboard = result
            .groups
            .into_iter()
            .map(|group| {
                let token = SelectionToken::for_key(&format!("{}|{}", root, group.label));
                let button = Button::new(
                    bucket_label("📁", &group),
                    CallbackAction::Group(token.clone()).to_data(),
                );
                store.put(token, Payload::Records(group.records));
                vec![button]
            })
            .collect();

        View::with_keyboard("🎬 Select a release group:", keyboard)
    }
}

/// `{icon} {label} ({n} results[, {k} bundled])`
fn bucket_label(icon: &str, group: &ResultGroup) -> String {
    let mut label = format!("{} {} ({} results", icon, group.label, group.len());
    let bundled = group.bundled_count();
    if bundled > 0 {
        label.push_str(&format!(", {} bundled", bundled));
    }
    label.push(')');
    label
}

fn list_items(
    store: &mut SessionStore,
    token: &SelectionToken,
    records: Vec<TorrentRecord>,
) -> View {
    let records = sort_by_episode(records);
    let page_token = token.derive("p");
    store.put(page_token.clone(), Payload::Records(records.clone()));
    render_page(store, &page_token, &records, 0)
}

fn render_page(
    store: &mut SessionStore,
    page_token: &SelectionToken,
    records: &[TorrentRecord],
    number: usize,
) -> View {
    let page = paginate(records, number);

    let mut keyboard: Keyboard = Vec::with_capacity(page.items.len() + 2);
    let has_bundle = page.items.iter().any(|r| r.is_oversized);

    for item in page.items {
        let token = SelectionToken::for_key(&item.magnet_uri);
        keyboard.push(vec![Button::new(
            item_label(&item),
            CallbackAction::Item(token.clone()).to_data(),
        )]);
        store.put(token, Payload::Record(item));
    }

    let mut nav = Vec::new();
    if page.has_prev {
        nav.push(Button::new(
            "« Prev",
            CallbackAction::Page {
                token: page_token.clone(),
                page: page.number - 1,
            }
            .to_data(),
        ));
    }
    if page.has_next {
        nav.push(Button::new(
            "Next »",
            CallbackAction::Page {
                token: page_token.clone(),
                page: page.number + 1,
            }
            .to_data(),
        ));
    }
    if !nav.is_empty() {
        keyboard.push(nav);
    }
    if has_bundle {
        keyboard.push(vec![Button::new(
            "ℹ️ What does 📦 mean?",
            CallbackAction::Info.to_data(),
        )]);
    }

    View::with_keyboard(format!("🔍 Found {} torrents:", page.total_items), keyboard)
}

fn confirmation(token: &SelectionToken, record: &TorrentRecord) -> View {
    let mut text = format!(
        "❓ Are you sure you want to download this?\n\n<code>{}</code>\n💾 Size: {}",
        escape_html(&record.title),
        escape_html(record.size_text.as_deref().unwrap_or("Unknown")),
    );
    if record.is_oversized {
        text.push_str("\n\n📦 This is a bundle. Files larger than 2 GiB will be skipped.");
    }

    View::with_keyboard(
        text,
        vec![vec![
            Button::new("✅ Yes", CallbackAction::Confirm(token.clone()).to_data()),
            Button::new("❌ No", CallbackAction::Cancel.to_data()),
        ]],
    )
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

/// HTML caption for the title detail view.
pub fn detail_caption(d: &MediaDetails) -> String {
    let mut lines = vec![
        format!("🎬 <b>{}</b>", escape_html(&d.title)),
        format!(
            "🗂️ Format: {} | 📺 Status: {}",
            escape_html(&or_na(d.format.as_deref())),
            escape_html(&or_na(d.status.as_deref()))
        ),
        format!(
            "🎞️ Episodes: {} | ⏱️ Duration: {} min",
            or_na(d.episodes),
            or_na(d.duration)
        ),
        format!(
            "📅 Season: {} {}",
            escape_html(&or_na(d.season.as_deref())),
            d.season_year.map(|y| y.to_string()).unwrap_or_default()
        )
        .trim_end()
        .to_string(),
        format!("⭐ Score: {}", or_na(d.score)),
    ];

    if !d.genres.is_empty() {
        lines.push(format!("🏷️ Genres: {}", escape_html(&d.genres.join(", "))));
    }
    if let Some(desc) = d.description.as_deref().map(sanitize_description) {
        if !desc.is_empty() {
            lines.push(format!("📝 {}", escape_html(&desc)));
        }
    }
    if let Some(url) = &d.site_url {
        lines.push(format!("🔗 More: {}", escape_html(url)));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_label() {
        let record = |oversized| TorrentRecord {
            title: "[G] Show".to_string(),
            magnet_uri: "magnet:?xt=urn:btih:1".to_string(),
            size_text: None,
            size_bytes: None,
            resolution: None,
            seeders: 0,
            is_oversized: oversized,
        };

        let plain = ResultGroup::new("SubsPlease", vec![record(false), record(false)]);
        assert_eq!(bucket_label("📁", &plain), "📁 SubsPlease (2 results)");

        let bundled = ResultGroup::new("1080p", vec![record(true), record(false)]);
        assert_eq!(bucket_label("💿", &bundled), "💿 1080p (2 results, 1 bundled)");
    }

    #[test]
    fn test_detail_caption() {
        let details = MediaDetails {
            id: 1,
            title: "Tom & Jerry".to_string(),
            format: Some("TV".to_string()),
            episodes: Some(12),
            season: Some("FALL".to_string()),
            season_year: Some(2023),
            score: Some(85),
            genres: vec!["Comedy".to_string()],
            description: Some("Cat<br>Mouse".to_string()),
            site_url: Some("https://anilist.co/anime/1".to_string()),
            ..Default::default()
        };

        let caption = detail_caption(&details);
        let lines: Vec<_> = caption.lines().collect();

        assert_eq!(lines[0], "🎬 <b>Tom &amp; Jerry</b>");
        assert_eq!(lines[1], "🗂️ Format: TV | 📺 Status: N/A");
        assert_eq!(lines[2], "🎞️ Episodes: 12 | ⏱️ Duration: N/A min");
        assert_eq!(lines[3], "📅 Season: FALL 2023");
        assert_eq!(lines[4], "⭐ Score: 85");
        assert_eq!(lines[5], "🏷️ Genres: Comedy");
        assert_eq!(lines[6], "📝 Cat");
        assert_eq!(lines[7], "Mouse");
        assert_eq!(lines[8], "🔗 More: https://anilist.co/anime/1");
    }

    #[test]
    fn test_confirmation_view() {
        let record = TorrentRecord {
            title: "[G] Show <01>".to_string(),
            magnet_uri: "magnet:?xt=urn:btih:1".to_string(),
            size_text: Some("20.1 GiB".to_string()),
            size_bytes: Some(21_582_312_653),
            resolution: None,
            seeders: 0,
            is_oversized: true,
        };
        let token = SelectionToken::for_key(&record.magnet_uri);
        let view = confirmation(&token, &record);

        assert!(view.text.contains("<code>[G] Show &lt;01&gt;</code>"));
        assert!(view.text.contains("📦"));
        let data: Vec<_> = view.buttons().map(|b| b.data.as_str()).collect();
        assert_eq!(data, vec![format!("dl::{}", token), "cancel_dl".to_string()]);
    }
}
