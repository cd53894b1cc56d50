//! Multi-query aggregation and the grouping cascade.
//!
//! `search` merges the listings of several query strings into release groups.
//! The remaining functions narrow a record list one step at a time:
//! release group -> resolution -> audio track -> page.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::dedup::deduplicate;
use super::normalizer::normalize;
use super::title::{episode_number, is_dub, release_group};
use super::{IndexSearcher, Resolution, ResultGroup, SearchError, SearchResult, TorrentRecord};
use crate::metrics;

/// Records per page in the item list.
pub const PAGE_SIZE: usize = 10;

/// Label for records without a recognised resolution.
pub const UNKNOWN_QUALITY: &str = "Unknown";

/// Index requests allowed in flight for one search.
const MAX_CONCURRENT_QUERIES: usize = 3;

/// Runs queries against an index and shapes the merged listing.
pub struct Aggregator {
    searcher: Arc<dyn IndexSearcher>,
}

impl Aggregator {
    pub fn new(searcher: Arc<dyn IndexSearcher>) -> Self {
        Self { searcher }
    }

    /// Search every query, merge, deduplicate and group by release group.
    ///
    /// A failing query contributes nothing and does not abort the others.
    /// An empty merged list is [`SearchError::NoResults`] unless every query
    /// failed, which is [`SearchError::AllQueriesFailed`].
    pub async fn search(&self, queries: &[String]) -> Result<SearchResult, SearchError> {
        let start = Instant::now();

        let mut seen = HashSet::new();
        let queries: Vec<&str> = queries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
            .collect();

        if queries.is_empty() {
            metrics::SEARCHES.with_label_values(&["no_results"]).inc();
            return Err(SearchError::NoResults);
        }

        debug!(
            backend = self.searcher.name(),
            queries = ?queries,
            "Starting index search"
        );

        // `buffered` keeps the results in query order
        let owned: Vec<String> = queries.iter().map(|q| q.to_string()).collect();
        let outcomes: Vec<(String, Result<_, SearchError>)> =
            stream::iter(owned)
                .map(|query| async move {
                    let outcome = self.searcher.search(&query).await;
                    (query, outcome)
                })
                .buffered(MAX_CONCURRENT_QUERIES)
                .collect()
                .await;

        let mut records = Vec::new();
        let mut query_errors = HashMap::new();

        for (query, outcome) in outcomes {
            match outcome {
                Ok(rows) => {
                    records.extend(rows.into_iter().filter_map(normalize));
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "Index query failed");
                    metrics::INDEX_QUERY_FAILURES.inc();
                    query_errors.insert(query, e.to_string());
                }
            }
        }

        let records = deduplicate(records);
        let duration_ms = start.elapsed().as_millis() as u64;

        if records.is_empty() {
            if query_errors.len() == queries.len() {
                metrics::SEARCHES.with_label_values(&["failed"]).inc();
                return Err(SearchError::AllQueriesFailed(query_errors));
            }
            metrics::SEARCHES.with_label_values(&["no_results"]).inc();
            return Err(SearchError::NoResults);
        }

        let total = records.len();
        let groups = group_by_release(records);

        debug!(
            results = total,
            groups = groups.len(),
            duration_ms = duration_ms,
            "Search complete"
        );
        metrics::SEARCHES.with_label_values(&["ok"]).inc();

        Ok(SearchResult {
            groups,
            total,
            query_errors,
            duration_ms,
        })
    }
}

/// Bucket records by key, keeping first-appearance order of the buckets and
/// encounter order inside each bucket.
fn bucket<K, F>(records: Vec<TorrentRecord>, key: F) -> Vec<(K, Vec<TorrentRecord>)>
where
    K: Eq + std::hash::Hash + Clone,
    F: Fn(&TorrentRecord) -> K,
{
    let mut slot_by_key: HashMap<K, usize> = HashMap::new();
    let mut buckets: Vec<(K, Vec<TorrentRecord>)> = Vec::new();

    for r in records {
        let k = key(&r);
        match slot_by_key.get(&k) {
            Some(&slot) => buckets[slot].1.push(r),
            None => {
                slot_by_key.insert(k.clone(), buckets.len());
                buckets.push((k, vec![r]));
            }
        }
    }

    buckets
}

/// Group by release-group tag, largest group first.
pub fn group_by_release(records: Vec<TorrentRecord>) -> Vec<ResultGroup> {
    let mut groups: Vec<ResultGroup> = bucket(records, |r| release_group(&r.title))
        .into_iter()
        .map(|(label, records)| ResultGroup::new(label, records))
        .collect();
    groups.sort_by(|a, b| b.len().cmp(&a.len()));
    groups
}

/// Group by resolution, highest first, unknown last.
pub fn group_by_resolution(records: Vec<TorrentRecord>) -> Vec<ResultGroup> {
    let mut buckets: Vec<(Option<Resolution>, Vec<TorrentRecord>)> =
        bucket(records, |r| r.resolution);
    buckets.sort_by(|a, b| b.0.cmp(&a.0));
    buckets
        .into_iter()
        .map(|(res, records)| {
            let label = res.map_or(UNKNOWN_QUALITY, |r| r.as_str());
            ResultGroup::new(label, records)
        })
        .collect()
}

/// Result of splitting a quality bucket by audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSplit {
    /// Both tracks present: the user has to choose.
    Mixed {
        sub: Vec<TorrentRecord>,
        dub: Vec<TorrentRecord>,
    },
    /// Only one kind present, no choice needed.
    Single(Vec<TorrentRecord>),
}

pub fn split_audio(records: Vec<TorrentRecord>) -> AudioSplit {
    let (dub, sub): (Vec<_>, Vec<_>) = records.into_iter().partition(|r| is_dub(&r.title));
    match (sub.is_empty(), dub.is_empty()) {
        (false, false) => AudioSplit::Mixed { sub, dub },
        (true, _) => AudioSplit::Single(dub),
        (false, true) => AudioSplit::Single(sub),
    }
}

/// Stable sort by episode number; unknown episodes go last.
pub fn sort_by_episode(mut records: Vec<TorrentRecord>) -> Vec<TorrentRecord> {
    records.sort_by_key(|r| episode_number(&r.title));
    records
}

/// One page of the episode-ordered item list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Zero-based page number (clamped to the last page).
    pub number: usize,
    pub items: Vec<TorrentRecord>,
    pub total_items: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Sort by episode and cut out page `number`.
pub fn paginate(records: &[TorrentRecord], number: usize) -> Page {
    let sorted = sort_by_episode(records.to_vec());
    let total_items = sorted.len();
    let last_page = total_items.saturating_sub(1) / PAGE_SIZE;
    let number = number.min(last_page);

    let start = number * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(total_items);

    Page {
        number,
        items: sorted[start..end].to_vec(),
        total_items,
        has_prev: number > 0,
        has_next: end < total_items,
    }
}
