//! Types for the download lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::agent::{AgentError, AgentFile};
use crate::messenger::{ChatId, MessageRef};

/// Lifecycle state of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Submitted to the agent, first check pending.
    Queued,
    /// Downloading; re-checked on a fixed interval.
    Polling,
    /// Reported complete; waiting for the file layout to settle.
    Completing,
    /// Sending files to the user.
    Uploading,
    /// Removing the job and its files from the agent.
    CleaningUp,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Polling => "polling",
            JobState::Completing => "completing",
            JobState::Uploading => "uploading",
            JobState::CleaningUp => "cleaning_up",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

/// One in-flight download.
///
/// Only the scheduled step that currently owns the job mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub id: Uuid,
    /// Agent-side id. Replaced when the agent hands the job over.
    pub external_id: String,
    pub display_name: String,
    pub chat_id: ChatId,
    /// Status message updated in place.
    pub target: MessageRef,
    pub state: JobState,
    /// Files selected for upload, set when leaving `Completing`.
    #[serde(default)]
    pub files: Vec<AgentFile>,
    /// Why the job failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of one lifecycle step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Run the next step after `delay`.
    Continue { job: DownloadJob, delay: Duration },
    /// Terminal state reached.
    Finished(DownloadJob),
}

impl Step {
    pub fn job(&self) -> &DownloadJob {
        match self {
            Step::Continue { job, .. } => job,
            Step::Finished(job) => job,
        }
    }
}

/// Errors returned to the caller of the lifecycle manager.
///
/// Failures after submission never surface here; they end the job in
/// [`JobState::Failed`] and are reported to the user.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to submit download: {0}")]
    Submit(#[from] AgentError),
}
