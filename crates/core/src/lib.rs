pub mod agent;
pub mod catalog;
pub mod config;
pub mod lifecycle;
pub mod messenger;
pub mod metrics;
pub mod searcher;
pub mod selection;
pub mod testing;
pub mod text;

/// Largest file the messaging transport accepts (2 GiB).
pub const UPLOAD_LIMIT_BYTES: u64 = 2_147_483_648;

pub use agent::{AgentError, Aria2Client, DownloadAgent, JobStatus};
pub use catalog::{AniListClient, CatalogError, CatalogLookup, CatalogTitle, MediaDetails};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use lifecycle::{
    DownloadJob, DownloadLifecycleManager, JobState, LifecycleConfig, LifecycleError, Scheduler,
    TokioScheduler,
};
pub use messenger::{Incoming, MessageRef, Messenger, MessengerError, TelegramMessenger};
pub use searcher::{Aggregator, IndexSearcher, NyaaScraper, SearchError, TorrentRecord};
pub use selection::{CallbackAction, FlowOutcome, SelectionCache, SelectionFlow, View};
