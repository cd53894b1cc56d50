//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of all external service traits,
//! allowing the selection flow and the download lifecycle to be exercised
//! without a chat service, an index, a catalog or a download agent.
//!
//! # Example
//!
//! ```rust,ignore
//! use animedl_core::testing::{fixtures, MockAgent, MockIndex, MockMessenger};
//!
//! let index = MockIndex::new();
//! index.set_rows("frieren", vec![fixtures::raw_row("[SubsPlease] Frieren - 01 (1080p)", "aa", "1.4 GiB", 10)]).await;
//!
//! let agent = MockAgent::new();
//! agent.push_status("gid-1", fixtures::job_status("gid-1", 50.0)).await;
//! ```

mod manual_scheduler;
mod mock_agent;
mod mock_catalog;
mod mock_index;
mod mock_messenger;

pub use manual_scheduler::ManualScheduler;
pub use mock_agent::{MockAgent, RecordedRemove};
pub use mock_catalog::MockCatalog;
pub use mock_index::MockIndex;
pub use mock_messenger::{MockMessenger, RecordedAnswer, SentKind, SentMessage};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::agent::{AgentFile, AgentJobState, JobStatus};
    use crate::catalog::{CatalogTitle, MediaDetails};
    use crate::messenger::MessageRef;
    use crate::searcher::{extract_resolution, RawRow, TorrentRecord};
    use crate::text::format_bytes;

    /// Magnet URI for a fake info hash, with the title as display name.
    pub fn magnet(hash: &str, title: &str) -> String {
        format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            hash,
            urlencoding::encode(title)
        )
    }

    /// Create a scraped row as the index would return it.
    pub fn raw_row(title: &str, hash: &str, size_text: &str, seeders: u32) -> RawRow {
        RawRow {
            title: title.to_string(),
            magnet_uri: magnet(hash, title),
            size_text: Some(size_text.to_string()),
            seeders_text: Some(seeders.to_string()),
        }
    }

    /// Create a normalized record with reasonable defaults.
    pub fn record(title: &str, hash: &str, size_bytes: u64) -> TorrentRecord {
        TorrentRecord {
            title: title.to_string(),
            magnet_uri: magnet(hash, title),
            size_text: Some(format_bytes(size_bytes)),
            size_bytes: Some(size_bytes),
            resolution: extract_resolution(title),
            seeders: 10,
            is_oversized: false,
        }
    }

    pub fn catalog_title(id: u64, display: &str, queries: &[&str]) -> CatalogTitle {
        CatalogTitle {
            id,
            display: display.to_string(),
            queries: queries.iter().map(|q| q.to_string()).collect(),
        }
    }

    pub fn media_details(id: u64, title: &str) -> MediaDetails {
        MediaDetails {
            id,
            title: title.to_string(),
            description: Some(format!("The story of {}.", title)),
            cover_image: Some(format!("https://img.example/{}.jpg", id)),
            site_url: Some(format!("https://anilist.co/anime/{}", id)),
            format: Some("TV".to_string()),
            status: Some("FINISHED".to_string()),
            episodes: Some(12),
            duration: Some(24),
            season: Some("FALL".to_string()),
            season_year: Some(2023),
            score: Some(90),
            genres: vec!["Adventure".to_string(), "Fantasy".to_string()],
        }
    }

    pub fn message_ref(chat_id: i64, message_id: i64) -> MessageRef {
        MessageRef {
            chat_id,
            message_id,
        }
    }

    pub fn agent_file(path: impl AsRef<Path>, length: u64) -> AgentFile {
        AgentFile {
            path: PathBuf::from(path.as_ref()),
            length,
            completed_length: length,
        }
    }

    /// An active job at the given progress.
    pub fn job_status(external_id: &str, percent: f64) -> JobStatus {
        let total: u64 = 1 << 30;
        let completed = (total as f64 * percent / 100.0) as u64;
        JobStatus {
            external_id: external_id.to_string(),
            name: "download".to_string(),
            state: AgentJobState::Active,
            is_complete: false,
            progress_percent: percent,
            total_length: total,
            completed_length: completed,
            download_speed: 1 << 20,
            seeders: 12,
            eta_secs: Some((total - completed) >> 20),
            files: Vec::new(),
            error_message: None,
        }
    }

    /// A finished job with the given files.
    pub fn completed_status(external_id: &str, files: Vec<AgentFile>) -> JobStatus {
        let total = files.iter().map(|f| f.length).sum();
        JobStatus {
            external_id: external_id.to_string(),
            name: "download".to_string(),
            state: AgentJobState::Complete,
            is_complete: true,
            progress_percent: 100.0,
            total_length: total,
            completed_length: total,
            download_speed: 0,
            seeders: 0,
            eta_secs: None,
            files,
            error_message: None,
        }
    }

    /// A job the agent gave up on.
    pub fn errored_status(external_id: &str, message: &str) -> JobStatus {
        JobStatus {
            state: AgentJobState::Error,
            error_message: Some(message.to_string()),
            ..job_status(external_id, 0.0)
        }
    }
}
