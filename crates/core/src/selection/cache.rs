//! Per-session token store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::{SelectionError, SelectionToken};
use crate::catalog::CatalogTitle;
use crate::searcher::TorrentRecord;

/// Conversation scope for cached selections.
pub type SessionId = i64;

/// What a token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A catalog title offered after a free-text search.
    Title(CatalogTitle),
    /// Index queries to run when the user asks for download options.
    Queries(Vec<String>),
    /// A group, quality bucket, audio track or page source.
    Records(Vec<TorrentRecord>),
    /// One pickable item.
    Record(TorrentRecord),
}

impl Payload {
    fn kind(&self) -> &'static str {
        match self {
            Payload::Title(_) => "title",
            Payload::Queries(_) => "queries",
            Payload::Records(_) => "records",
            Payload::Record(_) => "record",
        }
    }
}

/// Token entries of one session. No TTL; entries live as long as the session.
#[derive(Debug, Default)]
pub struct SessionStore {
    entries: HashMap<SelectionToken, Payload>,
}

impl SessionStore {
    /// Store or overwrite.
    pub fn put(&mut self, token: SelectionToken, payload: Payload) {
        self.entries.insert(token, payload);
    }

    /// Absence is normal (stale button, restart) and not an error.
    pub fn get(&self, token: &SelectionToken) -> Option<&Payload> {
        self.entries.get(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, token: &SelectionToken) -> Result<&Payload, SelectionError> {
        self.get(token)
            .ok_or_else(|| SelectionError::Expired(token.to_string()))
    }

    fn mismatch(token: &SelectionToken, expected: &str, found: &Payload) -> SelectionError {
        SelectionError::InvalidPayload {
            token: token.to_string(),
            expected: expected.to_string(),
            found: found.kind().to_string(),
        }
    }

    pub fn title(&self, token: &SelectionToken) -> Result<CatalogTitle, SelectionError> {
        match self.lookup(token)? {
            Payload::Title(t) => Ok(t.clone()),
            other => Err(Self::mismatch(token, "title", other)),
        }
    }

    pub fn queries(&self, token: &SelectionToken) -> Result<Vec<String>, SelectionError> {
        match self.lookup(token)? {
            Payload::Queries(q) if !q.is_empty() => Ok(q.clone()),
            other => Err(Self::mismatch(token, "queries", other)),
        }
    }

    pub fn records(&self, token: &SelectionToken) -> Result<Vec<TorrentRecord>, SelectionError> {
        match self.lookup(token)? {
            Payload::Records(r) if !r.is_empty() => Ok(r.clone()),
            other => Err(Self::mismatch(token, "records", other)),
        }
    }

    pub fn record(&self, token: &SelectionToken) -> Result<TorrentRecord, SelectionError> {
        match self.lookup(token)? {
            Payload::Record(r) => Ok(r.clone()),
            other => Err(Self::mismatch(token, "record", other)),
        }
    }
}

/// Session-scoped selection cache shared by every interaction.
///
/// Each session has its own lock; holding it via [`SelectionCache::lock`]
/// serialises interactions of one conversation while other conversations
/// proceed.
#[derive(Debug, Default)]
pub struct SelectionCache {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<SessionStore>>>>,
}

impl SelectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn session(&self, session: SessionId) -> Arc<Mutex<SessionStore>> {
        if let Some(store) = self.sessions.read().await.get(&session) {
            return Arc::clone(store);
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(session).or_default())
    }

    /// Exclusive access to one session's store.
    pub async fn lock(&self, session: SessionId) -> OwnedMutexGuard<SessionStore> {
        self.session(session).await.lock_owned().await
    }

    pub async fn put(&self, session: SessionId, token: SelectionToken, payload: Payload) {
        self.lock(session).await.put(token, payload);
    }

    /// Look a payload up without creating the session.
    pub async fn get(&self, session: SessionId, token: &SelectionToken) -> Option<Payload> {
        let store = self.sessions.read().await.get(&session).map(Arc::clone)?;
        let store = store.lock().await;
        store.get(token).cloned()
    }

    /// Drop a whole session.
    pub async fn clear(&self, session: SessionId) {
        self.sessions.write().await.remove(&session);
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> TorrentRecord {
        TorrentRecord {
            title: title.to_string(),
            magnet_uri: format!("magnet:?xt=urn:btih:{}", title),
            size_text: None,
            size_bytes: Some(1),
            resolution: None,
            seeders: 0,
            is_oversized: false,
        }
    }

    #[tokio::test]
    async fn test_put_get() {
        let cache = SelectionCache::new();
        let token = SelectionToken::for_key("a");

        cache
            .put(1, token.clone(), Payload::Queries(vec!["q".to_string()]))
            .await;

        assert_eq!(
            cache.get(1, &token).await,
            Some(Payload::Queries(vec!["q".to_string()]))
        );
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let cache = SelectionCache::new();
        let token = SelectionToken::for_key("a");

        cache.put(1, token.clone(), Payload::Record(record("x"))).await;

        assert!(cache.get(2, &token).await.is_none());
        assert_eq!(cache.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let cache = SelectionCache::new();
        let token = SelectionToken::for_key("a");

        cache.put(1, token.clone(), Payload::Record(record("old"))).await;
        cache.put(1, token.clone(), Payload::Record(record("new"))).await;

        let store = cache.lock(1).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.record(&token).unwrap().title, "new");
    }

    #[tokio::test]
    async fn test_unknown_token_is_expired() {
        let cache = SelectionCache::new();
        let store = cache.lock(7).await;
        let token = SelectionToken::for_key("never stored");

        assert!(store.get(&token).is_none());
        assert!(matches!(
            store.records(&token),
            Err(SelectionError::Expired(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_payload_kind() {
        let cache = SelectionCache::new();
        let token = SelectionToken::for_key("a");
        cache.put(1, token.clone(), Payload::Record(record("x"))).await;

        let store = cache.lock(1).await;
        match store.records(&token) {
            Err(SelectionError::InvalidPayload { expected, found, .. }) => {
                assert_eq!(expected, "records");
                assert_eq!(found, "record");
            }
            other => panic!("expected invalid payload, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = SelectionCache::new();
        let token = SelectionToken::for_key("a");
        cache.put(1, token.clone(), Payload::Record(record("x"))).await;

        cache.clear(1).await;
        assert_eq!(cache.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_get_does_not_create_sessions() {
        let cache = SelectionCache::new();
        let token = SelectionToken::for_key("a");

        for session in 10..20 {
            assert!(cache.get(session, &token).await.is_none());
        }
        assert_eq!(cache.session_count().await, 0);
    }
}
