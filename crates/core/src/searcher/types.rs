//! Types for the torrent search system.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Video resolution recognised in release titles.
///
/// Ordering follows pixel height, so sorting descending puts the sharpest
/// release first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "2160p")]
    P2160,
}

impl Resolution {
    /// Returns the label used in titles and buttons.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P480 => "480p",
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
            Resolution::P1440 => "1440p",
            Resolution::P2160 => "2160p",
        }
    }

    /// Parse a label such as `1080p` (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "480p" => Some(Resolution::P480),
            "720p" => Some(Resolution::P720),
            "1080p" => Some(Resolution::P1080),
            "1440p" => Some(Resolution::P1440),
            "2160p" => Some(Resolution::P2160),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row scraped from the index, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub title: String,
    pub magnet_uri: String,
    pub size_text: Option<String>,
    pub seeders_text: Option<String>,
}

/// A candidate release (single file or bundle).
///
/// `magnet_uri` is the identity key and is unique within one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentRecord {
    /// Display title including release-group tag and episode markers.
    pub title: String,
    /// Magnet URI handed to the download agent.
    pub magnet_uri: String,
    /// Size as printed by the index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_text: Option<String>,
    /// Parsed size; `None` when the size text was not understood.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// Seeder count at scrape time. Only used as a tie-break.
    pub seeders: u32,
    /// Unknown size or above the upload ceiling. Only bundles keep this flag;
    /// oversized single releases never make it into a result set.
    #[serde(default)]
    pub is_oversized: bool,
}

/// A named bucket of records (release group, quality or audio track).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultGroup {
    pub label: String,
    pub records: Vec<TorrentRecord>,
}

impl ResultGroup {
    pub fn new(label: impl Into<String>, records: Vec<TorrentRecord>) -> Self {
        Self {
            label: label.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of oversized bundles in this group.
    pub fn bundled_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_oversized).count()
    }
}

/// Outcome of a multi-query search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Release groups, largest first.
    pub groups: Vec<ResultGroup>,
    /// Records left after both deduplication passes.
    pub total: usize,
    /// Queries that failed (query -> error message).
    pub query_errors: HashMap<String, String>,
    /// How long the search took in milliseconds.
    pub duration_ms: u64,
}

/// Errors that can occur during search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Index connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Index returned an error: {0}")]
    ApiError(String),

    #[error("Failed to parse index response: {0}")]
    ParseError(String),

    #[error("Request timeout")]
    Timeout,

    /// Every query ran, none produced a usable record.
    #[error("No results")]
    NoResults,

    /// Every query failed; nothing was searched.
    #[error("All queries failed")]
    AllQueriesFailed(HashMap<String, String>),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SearchError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_connect() {
            SearchError::ConnectionFailed(e.to_string())
        } else {
            SearchError::ApiError(e.to_string())
        }
    }
}

/// A torrent index that can be queried with free text.
#[async_trait]
pub trait IndexSearcher: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Fetch the raw listing rows for one query.
    async fn search(&self, query: &str) -> Result<Vec<RawRow>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, oversized: bool) -> TorrentRecord {
        TorrentRecord {
            title: title.to_string(),
            magnet_uri: format!("magnet:?xt=urn:btih:{}", title.len()),
            size_text: Some("1.0 GiB".to_string()),
            size_bytes: Some(1 << 30),
            resolution: Some(Resolution::P1080),
            seeders: 1,
            is_oversized: oversized,
        }
    }

    #[test]
    fn test_resolution_ordering() {
        assert!(Resolution::P2160 > Resolution::P1080);
        assert!(Resolution::P720 > Resolution::P480);
        assert!(Some(Resolution::P480) > None);
    }

    #[test]
    fn test_resolution_labels() {
        assert_eq!(Resolution::P1080.to_string(), "1080p");
        assert_eq!(Resolution::from_label("2160P"), Some(Resolution::P2160));
        assert_eq!(Resolution::from_label("4k"), None);
    }

    #[test]
    fn test_resolution_serialization() {
        assert_eq!(
            serde_json::to_string(&Resolution::P720).unwrap(),
            "\"720p\""
        );
    }

    #[test]
    fn test_record_serialization_skips_unknowns() {
        let mut r = record("[A] Show - 01", false);
        r.size_bytes = None;
        r.resolution = None;

        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("size_bytes"));
        assert!(!json.contains("resolution"));

        let parsed: TorrentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, r);
    }

    #[test]
    fn test_group_bundled_count() {
        let group = ResultGroup::new(
            "A",
            vec![record("one", true), record("two", false), record("three", true)],
        );
        assert_eq!(group.len(), 3);
        assert_eq!(group.bundled_count(), 2);
    }
}
