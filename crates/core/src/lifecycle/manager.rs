//! Download lifecycle manager.
//!
//! Drives each job through the state machine one step at a time:
//! - every step is a separate scheduled task that re-submits itself
//! - the job value travels with the task, so there is a single writer per job
//! - step failures are logged and shown to the user, never raised

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agent::{AgentError, AgentFile, AgentJobState, DownloadAgent, JobStatus};
use crate::messenger::{ignore_not_modified, ChatId, MessageRef, Messenger};
use crate::metrics;
use crate::searcher::TorrentRecord;
use crate::text::{escape_html, format_bytes, format_eta};
use crate::UPLOAD_LIMIT_BYTES;

use super::config::LifecycleConfig;
use super::scheduler::Scheduler;
use super::types::{DownloadJob, JobState, LifecycleError, Step};

/// File extensions uploaded after a download completes.
pub const MEDIA_EXTENSIONS: [&str; 6] = ["mkv", "mp4", "avi", "mov", "m4v", "webm"];

pub const NO_MEDIA_TEXT: &str = "⚠️ No media files found in the completed download.";
pub const NOT_FOUND_REASON: &str = "Download not found.";
pub const CLEANUP_STARTED_TEXT: &str = "🧹 Cleaning up downloaded files from the server...";
pub const CLEANUP_DONE_TEXT: &str = "✅ Cleanup complete.";
pub const CLEANUP_FAILED_TEXT: &str = "⚠️ Could not clean up files automatically.";

const PROGRESS_BAR_WIDTH: usize = 10;

/// Whether the path has an allowed media extension (case-insensitive).
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MEDIA_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Media files with a non-zero size, in path order.
pub fn eligible_files(files: &[AgentFile]) -> Vec<AgentFile> {
    let mut eligible: Vec<AgentFile> = files
        .iter()
        .filter(|f| f.length > 0 && is_media_file(&f.path))
        .cloned()
        .collect();
    eligible.sort_by(|a, b| a.path.cmp(&b.path));
    eligible
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn progress_bar(percent: f64) -> String {
    let filled = ((percent / 100.0) * PROGRESS_BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(PROGRESS_BAR_WIDTH);
    format!(
        "{}{}",
        "█".repeat(filled),
        "░".repeat(PROGRESS_BAR_WIDTH - filled)
    )
}

/// Status message while downloading.
pub fn progress_text(job: &DownloadJob, status: &JobStatus) -> String {
    format!(
        "⬇️ Downloading <b>{}</b>...\n\n<code>{} {:.1}%</code>\n<code>⚡ {}/s | 🌱 {} seeders | ⏳ ETA {}</code>",
        escape_html(&job.display_name),
        progress_bar(status.progress_percent),
        status.progress_percent,
        format_bytes(status.download_speed),
        status.seeders,
        format_eta(status.eta_secs),
    )
}

struct ManagerInner {
    agent: Arc<dyn DownloadAgent>,
    messenger: Arc<dyn Messenger>,
    scheduler: Arc<dyn Scheduler>,
    config: LifecycleConfig,
    jobs: RwLock<HashMap<Uuid, DownloadJob>>,
}

/// Submits downloads and runs their poll loops.
#[derive(Clone)]
pub struct DownloadLifecycleManager {
    inner: Arc<ManagerInner>,
}

impl DownloadLifecycleManager {
    pub fn new(
        agent: Arc<dyn DownloadAgent>,
        messenger: Arc<dyn Messenger>,
        scheduler: Arc<dyn Scheduler>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                agent,
                messenger,
                scheduler,
                config,
                jobs: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Hand a confirmed record to the agent and start polling.
    ///
    /// The returned job is in [`JobState::Queued`]; the first step runs after
    /// the configured initial delay.
    pub async fn submit(
        &self,
        chat_id: ChatId,
        target: MessageRef,
        record: &TorrentRecord,
    ) -> Result<DownloadJob, LifecycleError> {
        let handle = self.inner.agent.add_magnet(&record.magnet_uri).await?;

        let job = DownloadJob {
            id: Uuid::new_v4(),
            external_id: handle.external_id,
            display_name: record.title.clone(),
            chat_id,
            target,
            state: JobState::Queued,
            files: Vec::new(),
            failure: None,
            created_at: Utc::now(),
        };

        info!(
            job_id = %job.id,
            external_id = %job.external_id,
            agent = self.inner.agent.name(),
            name = %job.display_name,
            "Download submitted"
        );
        metrics::DOWNLOADS.with_label_values(&["started"]).inc();
        metrics::ACTIVE_DOWNLOADS.inc();

        let text = format!(
            "📥 Download added to queue: <b>{}</b>",
            escape_html(&job.display_name)
        );
        if let Err(e) = self.render(&job, &text).await {
            warn!(job_id = %job.id, error = %e, "Failed to update status message");
        }

        self.record(&job).await;
        self.schedule(job.clone(), self.inner.config.initial_delay());
        Ok(job)
    }

    /// Snapshot of every job that has not finished yet.
    pub async fn jobs(&self) -> Vec<DownloadJob> {
        self.inner.jobs.read().await.values().cloned().collect()
    }

    pub async fn job(&self, id: Uuid) -> Option<DownloadJob> {
        self.inner.jobs.read().await.get(&id).cloned()
    }

    pub async fn active_count(&self) -> usize {
        self.inner.jobs.read().await.len()
    }

    /// Run one step of the state machine.
    pub async fn advance(&self, mut job: DownloadJob) -> Step {
        let from = job.state;
        let step = match job.state {
            JobState::Queued => {
                job.state = JobState::Polling;
                Step::Continue {
                    job,
                    delay: Duration::ZERO,
                }
            }
            JobState::Polling => self.poll(job).await,
            JobState::Completing => self.complete(job).await,
            JobState::Uploading => self.upload(job).await,
            JobState::CleaningUp => self.clean_up(job).await,
            JobState::Done | JobState::Failed => Step::Finished(job),
        };

        let to = step.job().state;
        if from != to {
            debug!(
                job_id = %step.job().id,
                from = from.as_str(),
                to = to.as_str(),
                "Download state transition"
            );
        }
        step
    }

    fn schedule(&self, job: DownloadJob, delay: Duration) {
        let manager = self.clone();
        self.inner
            .scheduler
            .schedule(delay, Box::pin(async move { manager.tick(job).await }));
    }

    async fn tick(&self, job: DownloadJob) {
        match self.advance(job).await {
            Step::Continue { job, delay } => {
                self.record(&job).await;
                self.schedule(job, delay);
            }
            Step::Finished(job) => self.finish(job).await,
        }
    }

    async fn record(&self, job: &DownloadJob) {
        self.inner.jobs.write().await.insert(job.id, job.clone());
    }

    async fn finish(&self, job: DownloadJob) {
        self.inner.jobs.write().await.remove(&job.id);
        metrics::ACTIVE_DOWNLOADS.dec();

        match job.state {
            JobState::Done => {
                metrics::DOWNLOADS.with_label_values(&["completed"]).inc();
                info!(job_id = %job.id, name = %job.display_name, "Download finished");
            }
            _ => {
                metrics::DOWNLOADS.with_label_values(&["failed"]).inc();
                warn!(
                    job_id = %job.id,
                    name = %job.display_name,
                    failure = job.failure.as_deref().unwrap_or("unknown"),
                    "Download failed"
                );
            }
        }
    }

    /// Edit the status message. "Not modified" counts as success.
    async fn render(
        &self,
        job: &DownloadJob,
        text: &str,
    ) -> Result<(), crate::messenger::MessengerError> {
        ignore_not_modified(self.inner.messenger.edit_text(job.target, text, None).await)
    }

    /// Send a separate message to the job's chat.
    async fn notify(&self, job: &DownloadJob, text: &str) -> Option<MessageRef> {
        match self.inner.messenger.send_text(job.chat_id, text, None).await {
            Ok(msg) => Some(msg),
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Failed to send message");
                None
            }
        }
    }

    fn adopt(&self, job: &mut DownloadJob, status: &JobStatus) {
        if status.external_id != job.external_id {
            info!(
                job_id = %job.id,
                from = %job.external_id,
                to = %status.external_id,
                "Agent handed the job over"
            );
            job.external_id = status.external_id.clone();
        }
    }

    async fn fail(&self, mut job: DownloadJob, reason: &str) -> Step {
        error!(job_id = %job.id, external_id = %job.external_id, reason = %reason, "Download job failed");
        if let Err(e) = self.render(&job, &format!("❌ {}", escape_html(reason))).await {
            warn!(job_id = %job.id, error = %e, "Failed to update status message");
        }
        job.state = JobState::Failed;
        job.failure = Some(reason.to_string());
        Step::Finished(job)
    }

    async fn poll(&self, mut job: DownloadJob) -> Step {
        let poll_interval = self.inner.config.poll_interval();

        let status = match self.inner.agent.get_job(&job.external_id).await {
            Ok(status) => status,
            Err(AgentError::JobNotFound(_)) => {
                return self.fail(job, NOT_FOUND_REASON).await;
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Agent status check failed");
                let text = format!(
                    "⚠️ Could not reach the download agent for <b>{}</b>. Retrying...",
                    escape_html(&job.display_name)
                );
                if let Err(e) = self.render(&job, &text).await {
                    warn!(job_id = %job.id, error = %e, "Failed to update status message");
                }
                return Step::Continue {
                    job,
                    delay: poll_interval,
                };
            }
        };

        self.adopt(&mut job, &status);

        match status.state {
            AgentJobState::Error => {
                let reason = format!(
                    "The download failed: {}",
                    status.error_message.as_deref().unwrap_or("unknown error")
                );
                warn!(job_id = %job.id, reason = %reason, "Agent reported an error");
                if let Err(e) = self.render(&job, &format!("❌ {}", escape_html(&reason))).await {
                    warn!(job_id = %job.id, error = %e, "Failed to update status message");
                }
                job.failure = Some(reason);
                job.state = JobState::CleaningUp;
                return Step::Continue {
                    job,
                    delay: Duration::ZERO,
                };
            }
            AgentJobState::Removed => {
                return self.fail(job, "The download was removed from the agent.").await;
            }
            _ => {}
        }

        if status.is_complete {
            let text = format!(
                "✅ Download complete for <b>{}</b>! Preparing to upload...",
                escape_html(&job.display_name)
            );
            if let Err(e) = self.render(&job, &text).await {
                warn!(job_id = %job.id, error = %e, "Failed to update status message");
            }
            job.state = JobState::Completing;
            return Step::Continue {
                job,
                delay: self.inner.config.completion_grace(),
            };
        }

        if let Err(e) = self.render(&job, &progress_text(&job, &status)).await {
            warn!(job_id = %job.id, error = %e, "Failed to update status message");
        }
        Step::Continue {
            job,
            delay: poll_interval,
        }
    }

    async fn complete(&self, mut job: DownloadJob) -> Step {
        let status = match self.inner.agent.get_job(&job.external_id).await {
            Ok(status) => status,
            Err(AgentError::JobNotFound(_)) => {
                return self.fail(job, NOT_FOUND_REASON).await;
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Failed to read final file list, retrying");
                return Step::Continue {
                    job,
                    delay: self.inner.config.poll_interval(),
                };
            }
        };

        self.adopt(&mut job, &status);
        let files = eligible_files(&status.files);

        if files.is_empty() {
            debug!(job_id = %job.id, "No media files in completed download");
            self.notify(&job, NO_MEDIA_TEXT).await;
            job.state = JobState::CleaningUp;
        } else {
            debug!(job_id = %job.id, files = files.len(), "Media files ready for upload");
            job.files = files;
            job.state = JobState::Uploading;
        }

        Step::Continue {
            job,
            delay: Duration::ZERO,
        }
    }

    async fn upload(&self, mut job: DownloadJob) -> Step {
        let total = job.files.len();

        for (i, file) in job.files.iter().enumerate() {
            let name = escape_html(&file_name(&file.path));

            let on_disk = match tokio::fs::metadata(&file.path).await {
                Ok(meta) if meta.is_file() => meta.len(),
                _ => {
                    warn!(job_id = %job.id, path = %file.path.display(), "File missing on disk");
                    metrics::UPLOADS.with_label_values(&["failed"]).inc();
                    self.notify(&job, &format!("❌ File not found on disk: <code>{}</code>", name))
                        .await;
                    continue;
                }
            };

            if on_disk.max(file.length) > UPLOAD_LIMIT_BYTES {
                debug!(job_id = %job.id, path = %file.path.display(), "File over upload limit");
                metrics::UPLOADS.with_label_values(&["skipped"]).inc();
                self.notify(
                    &job,
                    &format!(
                        "⚠️ Skipping <code>{}</code> because it exceeds the 2 GiB upload limit.",
                        name
                    ),
                )
                .await;
                continue;
            }

            self.notify(
                &job,
                &format!("⬆️ Uploading file {}/{}: <code>{}</code>", i + 1, total, name),
            )
            .await;

            match self
                .inner
                .messenger
                .send_document(job.chat_id, &file.path, &name)
                .await
            {
                Ok(_) => {
                    metrics::UPLOADS.with_label_values(&["ok"]).inc();
                }
                Err(e) => {
                    warn!(job_id = %job.id, path = %file.path.display(), error = %e, "Upload failed");
                    metrics::UPLOADS.with_label_values(&["failed"]).inc();
                    self.notify(
                        &job,
                        &format!(
                            "❌ Failed to upload <code>{}</code>: {}",
                            name,
                            escape_html(&e.to_string())
                        ),
                    )
                    .await;
                }
            }
        }

        job.state = JobState::CleaningUp;
        Step::Continue {
            job,
            delay: Duration::ZERO,
        }
    }

    async fn clean_up(&self, mut job: DownloadJob) -> Step {
        let notice = self.notify(&job, CLEANUP_STARTED_TEXT).await;

        let text = match self.inner.agent.remove_job(&job.external_id, true).await {
            Ok(()) => {
                job.state = if job.failure.is_some() {
                    JobState::Failed
                } else {
                    JobState::Done
                };
                CLEANUP_DONE_TEXT
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Cleanup failed");
                job.failure.get_or_insert_with(|| format!("Cleanup failed: {}", e));
                job.state = JobState::Failed;
                CLEANUP_FAILED_TEXT
            }
        };

        match notice {
            Some(msg) => {
                let result = self.inner.messenger.edit_text(msg, text, None).await;
                if let Err(e) = ignore_not_modified(result) {
                    warn!(job_id = %job.id, error = %e, "Failed to update cleanup message");
                }
            }
            None => {
                self.notify(&job, text).await;
            }
        }

        Step::Finished(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(path: &str, length: u64) -> AgentFile {
        AgentFile {
            path: PathBuf::from(path),
            length,
            completed_length: length,
        }
    }

    #[test]
    fn test_is_media_file() {
        assert!(is_media_file(Path::new("/d/Show - 01.mkv")));
        assert!(is_media_file(Path::new("/d/Show - 01.MP4")));
        assert!(!is_media_file(Path::new("/d/Show - 01.mkv.aria2")));
        assert!(!is_media_file(Path::new("/d/readme.txt")));
        assert!(!is_media_file(Path::new("/d/noext")));
    }

    #[test]
    fn test_eligible_files_filters_and_sorts() {
        let files = vec![
            file("/d/Show/Show - 02.mkv", 100),
            file("/d/Show/Show - 01.mkv", 100),
            file("/d/Show/cover.jpg", 10),
            file("/d/Show/empty.mp4", 0),
        ];
        let eligible = eligible_files(&files);
        let paths: Vec<_> = eligible.iter().map(|f| f.path.to_str().unwrap()).collect();
        assert_eq!(paths, vec!["/d/Show/Show - 01.mkv", "/d/Show/Show - 02.mkv"]);
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0), "░░░░░░░░░░");
        assert_eq!(progress_bar(50.0), "█████░░░░░");
        assert_eq!(progress_bar(100.0), "██████████");
        assert_eq!(progress_bar(140.0), "██████████");
    }

    #[test]
    fn test_progress_text() {
        let job = DownloadJob {
            id: Uuid::new_v4(),
            external_id: "gid".to_string(),
            display_name: "[G] Show & Friends - 01".to_string(),
            chat_id: 1,
            target: MessageRef {
                chat_id: 1,
                message_id: 2,
            },
            state: JobState::Polling,
            files: Vec::new(),
            failure: None,
            created_at: Utc::now(),
        };
        let status = JobStatus {
            external_id: "gid".to_string(),
            name: "Show".to_string(),
            state: AgentJobState::Active,
            is_complete: false,
            progress_percent: 42.0,
            total_length: 1000,
            completed_length: 420,
            download_speed: 2048,
            seeders: 12,
            eta_secs: Some(95),
            files: Vec::new(),
            error_message: None,
        };

        let text = progress_text(&job, &status);
        assert!(text.contains("<b>[G] Show &amp; Friends - 01</b>"));
        assert!(text.contains("42.0%"));
        assert!(text.contains("2.0 KiB/s"));
        assert!(text.contains("12 seeders"));
        assert!(text.contains("ETA 1m 35s"));
    }
}
