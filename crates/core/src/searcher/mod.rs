//! Torrent search and result shaping.
//!
//! An [`IndexSearcher`] fetches raw listing rows for one query. The
//! [`Aggregator`] fans a set of queries out to it, normalizes and
//! deduplicates the merged rows, and groups them for selection.

mod aggregator;
mod dedup;
mod normalizer;
mod nyaa;
mod title;
mod types;

pub use aggregator::{
    group_by_release, group_by_resolution, paginate, sort_by_episode, split_audio, Aggregator,
    AudioSplit, Page, PAGE_SIZE, UNKNOWN_QUALITY,
};
pub use dedup::{dedup_by_content, dedup_by_magnet, deduplicate};
pub use normalizer::{extract_resolution, is_likely_bundle, normalize, parse_size};
pub use nyaa::{parse_listing, NyaaScraper};
pub use title::{
    content_key, episode_number, is_dub, item_label, release_group, strip_tags, ContentKey,
    UNKNOWN_EPISODE, UNKNOWN_GROUP,
};
pub use types::*;
