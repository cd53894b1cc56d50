//! Types for catalog title lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A candidate title for free-text input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTitle {
    /// Catalog id, used to fetch details.
    pub id: u64,
    /// Preferred display name.
    pub display: String,
    /// Every known name for the title, each usable as an index query.
    pub queries: Vec<String>,
}

/// Descriptive metadata for the detail view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDetails {
    pub id: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Large cover image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    /// TV, MOVIE, OVA, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// FINISHED, RELEASING, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episodes: Option<u32>,
    /// Minutes per episode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_year: Option<u32>,
    /// Average score, falling back to the mean score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Errors that can occur when querying the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CatalogError::Timeout
        } else if e.is_connect() {
            CatalogError::ConnectionFailed(e.to_string())
        } else {
            CatalogError::Internal(e.to_string())
        }
    }
}

/// Resolves free text into canonical titles.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    fn name(&self) -> &str;

    /// Ranked candidate titles for the text. Empty when nothing matched.
    async fn search_titles(&self, text: &str) -> Result<Vec<CatalogTitle>, CatalogError>;

    async fn fetch_details(&self, id: u64) -> Result<MediaDetails, CatalogError>;
}
