//! Mock download agent for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::agent::{delete_job_files, AgentError, DownloadAgent, JobHandle, JobStatus};

/// A recorded `remove_job` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRemove {
    pub external_id: String,
    pub delete_files: bool,
}

/// Mock implementation of the DownloadAgent trait.
///
/// Statuses are queued per job: each `get_job` pops the front of the queue
/// and the last status sticks once the queue has a single entry left.
///
/// # Example
///
/// ```rust,ignore
/// let agent = MockAgent::new();
/// agent.push_status("gid-1", fixtures::job_status("gid-1", 40.0)).await;
/// agent.push_status("gid-1", fixtures::completed_status("gid-1", files)).await;
/// ```
#[derive(Debug, Default)]
pub struct MockAgent {
    added: Arc<RwLock<Vec<String>>>,
    statuses: Arc<RwLock<HashMap<String, VecDeque<JobStatus>>>>,
    removed: Arc<RwLock<Vec<RecordedRemove>>>,
    next_error: Arc<RwLock<Option<AgentError>>>,
    remove_error: Arc<RwLock<Option<AgentError>>>,
    counter: Arc<RwLock<u32>>,
}

impl MockAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a status for a job.
    pub async fn push_status(&self, external_id: &str, status: JobStatus) {
        self.statuses
            .write()
            .await
            .entry(external_id.to_string())
            .or_default()
            .push_back(status);
    }

    /// Forget a job so the next `get_job` reports it as not found.
    pub async fn forget(&self, external_id: &str) {
        self.statuses.write().await.remove(external_id);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: AgentError) {
        *self.next_error.write().await = Some(error);
    }

    /// Configure the next `remove_job` to fail.
    pub async fn set_remove_error(&self, error: AgentError) {
        *self.remove_error.write().await = Some(error);
    }

    /// Magnet URIs passed to `add_magnet`.
    pub async fn added_magnets(&self) -> Vec<String> {
        self.added.read().await.clone()
    }

    pub async fn removed_jobs(&self) -> Vec<RecordedRemove> {
        self.removed.read().await.clone()
    }

    async fn take_error(&self) -> Option<AgentError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl DownloadAgent for MockAgent {
    fn name(&self) -> &str {
        "mock-agent"
    }

    async fn add_magnet(&self, magnet_uri: &str) -> Result<JobHandle, AgentError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        let mut counter = self.counter.write().await;
        *counter += 1;
        self.added.write().await.push(magnet_uri.to_string());

        Ok(JobHandle {
            external_id: format!("gid-{}", *counter),
            name: crate::agent::magnet_display_name(magnet_uri)
                .unwrap_or_else(|| magnet_uri.to_string()),
        })
    }

    async fn get_job(&self, external_id: &str) -> Result<JobStatus, AgentError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        let mut statuses = self.statuses.write().await;
        let queue = statuses
            .get_mut(external_id)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| AgentError::JobNotFound(external_id.to_string()))?;

        if queue.len() > 1 {
            if let Some(status) = queue.pop_front() {
                return Ok(status);
            }
        }
        queue
            .front()
            .cloned()
            .ok_or_else(|| AgentError::JobNotFound(external_id.to_string()))
    }

    /// Deletes the files of the job's last known status when asked to.
    async fn remove_job(&self, external_id: &str, delete_files: bool) -> Result<(), AgentError> {
        self.removed.write().await.push(RecordedRemove {
            external_id: external_id.to_string(),
            delete_files,
        });

        if let Some(error) = self.remove_error.write().await.take() {
            return Err(error);
        }

        let last = self
            .statuses
            .write()
            .await
            .remove(external_id)
            .and_then(|mut q| q.pop_back());

        if delete_files {
            if let Some(status) = last {
                let paths: Vec<PathBuf> = status.files.iter().map(|f| f.path.clone()).collect();
                delete_job_files(None, None, &paths).await?;
            }
        }
        Ok(())
    }
}
