//! Mock catalog for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::{CatalogError, CatalogLookup, CatalogTitle, MediaDetails};

/// Mock implementation of the CatalogLookup trait.
#[derive(Debug, Default)]
pub struct MockCatalog {
    titles: Arc<RwLock<HashMap<String, Vec<CatalogTitle>>>>,
    details: Arc<RwLock<HashMap<u64, MediaDetails>>>,
    next_error: Arc<RwLock<Option<CatalogError>>>,
    detail_requests: Arc<RwLock<Vec<u64>>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Titles returned for a search text (matched case-insensitively).
    pub async fn set_titles(&self, text: &str, titles: Vec<CatalogTitle>) {
        self.titles
            .write()
            .await
            .insert(text.to_lowercase(), titles);
    }

    pub async fn set_details(&self, details: MediaDetails) {
        self.details.write().await.insert(details.id, details);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: CatalogError) {
        *self.next_error.write().await = Some(error);
    }

    /// Ids passed to `fetch_details`, in call order.
    pub async fn detail_requests(&self) -> Vec<u64> {
        self.detail_requests.read().await.clone()
    }

    async fn take_error(&self) -> Option<CatalogError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl CatalogLookup for MockCatalog {
    fn name(&self) -> &str {
        "mock-catalog"
    }

    async fn search_titles(&self, text: &str) -> Result<Vec<CatalogTitle>, CatalogError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        Ok(self
            .titles
            .read()
            .await
            .get(&text.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_details(&self, id: u64) -> Result<MediaDetails, CatalogError> {
        self.detail_requests.write().await.push(id);

        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        self.details
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("Media {}", id)))
    }
}
