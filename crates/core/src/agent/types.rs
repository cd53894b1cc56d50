//! Types for download agent operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent connection failed: {0}")]
    ConnectionFailed(String),

    /// The agent no longer knows the job.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Agent RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Failed to parse agent response: {0}")]
    ParseError(String),

    #[error("File cleanup failed: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AgentError::Timeout
        } else if e.is_connect() {
            AgentError::ConnectionFailed(e.to_string())
        } else {
            AgentError::ParseError(e.to_string())
        }
    }
}

/// Agent-side state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentJobState {
    Active,
    Waiting,
    Paused,
    Error,
    Complete,
    Removed,
    Unknown,
}

impl AgentJobState {
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => AgentJobState::Active,
            "waiting" => AgentJobState::Waiting,
            "paused" => AgentJobState::Paused,
            "error" => AgentJobState::Error,
            "complete" => AgentJobState::Complete,
            "removed" => AgentJobState::Removed,
            _ => AgentJobState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentJobState::Active => "active",
            AgentJobState::Waiting => "waiting",
            AgentJobState::Paused => "paused",
            AgentJobState::Error => "error",
            AgentJobState::Complete => "complete",
            AgentJobState::Removed => "removed",
            AgentJobState::Unknown => "unknown",
        }
    }
}

/// Returned by [`DownloadAgent::add_magnet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub external_id: String,
    /// Best-effort name; the real one is known once metadata arrives.
    pub name: String,
}

/// One file of a job as the agent sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFile {
    pub path: PathBuf,
    pub length: u64,
    pub completed_length: u64,
}

/// Snapshot of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Id of the job that actually carries the payload. May differ from the
    /// id that was queried when the agent hands a job over to a follow-up.
    pub external_id: String,
    pub name: String,
    pub state: AgentJobState,
    pub is_complete: bool,
    /// 0.0 - 100.0
    pub progress_percent: f64,
    pub total_length: u64,
    pub completed_length: u64,
    /// Bytes per second.
    pub download_speed: u64,
    pub seeders: u32,
    /// `None` while the speed is zero or the size unknown.
    pub eta_secs: Option<u64>,
    pub files: Vec<AgentFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A download agent reachable over RPC.
#[async_trait]
pub trait DownloadAgent: Send + Sync {
    fn name(&self) -> &str;

    /// Queue a magnet URI.
    async fn add_magnet(&self, magnet_uri: &str) -> Result<JobHandle, AgentError>;

    /// Current status, following any hand-over to a follow-up job.
    async fn get_job(&self, external_id: &str) -> Result<JobStatus, AgentError>;

    /// Stop and forget the job, optionally deleting its files from disk.
    async fn remove_job(&self, external_id: &str, delete_files: bool) -> Result<(), AgentError>;
}
