//! Download agent abstraction.
//!
//! A `DownloadAgent` fetches a magnet URI into local files and reports
//! progress when asked. It offers no completion callback; callers poll.

mod aria2;
mod types;

pub use aria2::{delete_job_files, magnet_display_name, Aria2Client};
pub use types::*;
