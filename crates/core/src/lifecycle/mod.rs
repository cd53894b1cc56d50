//! Download lifecycle: from a confirmed release to files in the chat.
//!
//! ```text
//! Queued -> Polling -> Completing -> Uploading -> CleaningUp -> Done
//!              |            |                         |
//!              +------------+-------------------------+-> Failed
//! ```

mod config;
mod manager;
mod scheduler;
mod types;

pub use config::LifecycleConfig;
pub use manager::{
    eligible_files, is_media_file, progress_text, DownloadLifecycleManager, CLEANUP_DONE_TEXT,
    CLEANUP_FAILED_TEXT, CLEANUP_STARTED_TEXT, MEDIA_EXTENSIONS, NOT_FOUND_REASON, NO_MEDIA_TEXT,
};
pub use scheduler::{Scheduler, Task, TokioScheduler};
pub use types::*;
