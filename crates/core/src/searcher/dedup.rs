//! Deduplication of torrent records.
//!
//! Two passes: exact duplicates by magnet URI, then re-uploads of the same
//! content by [`ContentKey`]. For the second pass the record with the most
//! seeders wins; seeders are a health heuristic, not a quality guarantee.

use std::collections::{HashMap, HashSet};

use super::title::{content_key, ContentKey};
use super::TorrentRecord;

/// Drop records whose magnet URI was already seen. First occurrence wins.
pub fn dedup_by_magnet(records: Vec<TorrentRecord>) -> Vec<TorrentRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.magnet_uri.clone()))
        .collect()
}

/// Collapse records sharing a content key into the one with the most seeders.
///
/// Only a strictly greater seeder count replaces the current pick, so ties keep
/// the earliest record. Output order follows the first appearance of each key.
pub fn dedup_by_content(records: Vec<TorrentRecord>) -> Vec<TorrentRecord> {
    let mut slot_by_key: HashMap<ContentKey, usize> = HashMap::new();
    let mut kept: Vec<TorrentRecord> = Vec::new();

    for r in records {
        let key = content_key(&r.title);
        match slot_by_key.get(&key) {
            Some(&slot) => {
                if r.seeders > kept[slot].seeders {
                    kept[slot] = r;
                }
            }
            None => {
                slot_by_key.insert(key, kept.len());
                kept.push(r);
            }
        }
    }

    kept
}

/// Both passes, in order.
pub fn deduplicate(records: Vec<TorrentRecord>) -> Vec<TorrentRecord> {
    dedup_by_content(dedup_by_magnet(records))
}
