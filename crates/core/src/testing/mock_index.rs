//! Mock torrent index for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::searcher::{IndexSearcher, RawRow, SearchError};

/// Mock implementation of the IndexSearcher trait.
///
/// Rows are configured per query; unknown queries return no rows.
///
/// # Example
///
/// ```rust,ignore
/// let index = MockIndex::new();
/// index.set_rows("frieren", vec![fixtures::raw_row("[SubsPlease] Frieren - 01 (1080p)", "aa", "1.4 GiB", 10)]).await;
/// index.fail_query("sousou no frieren", "connection refused").await;
/// ```
#[derive(Debug, Default)]
pub struct MockIndex {
    rows: Arc<RwLock<HashMap<String, Vec<RawRow>>>>,
    failures: Arc<RwLock<HashMap<String, String>>>,
    queries: Arc<RwLock<Vec<String>>>,
}

impl MockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rows returned for a query.
    pub async fn set_rows(&self, query: &str, rows: Vec<RawRow>) {
        self.rows.write().await.insert(query.to_string(), rows);
    }

    /// Make every search for `query` fail.
    pub async fn fail_query(&self, query: &str, message: &str) {
        self.failures
            .write()
            .await
            .insert(query.to_string(), message.to_string());
    }

    /// Queries received, in call order.
    pub async fn recorded_queries(&self) -> Vec<String> {
        self.queries.read().await.clone()
    }
}

#[async_trait]
impl IndexSearcher for MockIndex {
    fn name(&self) -> &str {
        "mock-index"
    }

    async fn search(&self, query: &str) -> Result<Vec<RawRow>, SearchError> {
        self.queries.write().await.push(query.to_string());

        if let Some(message) = self.failures.read().await.get(query) {
            return Err(SearchError::ConnectionFailed(message.clone()));
        }

        Ok(self
            .rows
            .read()
            .await
            .get(query)
            .cloned()
            .unwrap_or_default())
    }
}
