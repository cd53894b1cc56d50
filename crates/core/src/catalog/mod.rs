//! Catalog lookup: free text to canonical titles and their alternate names.
//!
//! The alternate names feed the index search as separate queries, which is how
//! releases tagged with a romanised or abbreviated name are still found.

mod anilist;
mod types;

pub use anilist::AniListClient;
pub use types::*;
