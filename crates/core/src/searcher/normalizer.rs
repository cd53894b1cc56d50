//! Turns scraped rows into [`TorrentRecord`]s.
//!
//! Pure functions, no I/O. Malformed rows are skipped rather than reported.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::title::EPISODE_RANGE;
use super::{RawRow, Resolution, TorrentRecord};
use crate::UPLOAD_LIMIT_BYTES;

static SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(kib|mib|gib|tib)\s*$").unwrap());

static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(2160p|1440p|1080p|720p|480p)").unwrap());

static SEASON_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bs0\d").unwrap());

const BUNDLE_WORDS: [&str; 4] = ["batch", "season", "complete", "episodes"];

/// Parse a binary-unit size such as `1.4 GiB`. Unknown units yield `None`.
pub fn parse_size(text: &str) -> Option<u64> {
    let caps = SIZE.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier: u64 = match caps.get(2)?.as_str().to_ascii_lowercase().as_str() {
        "kib" => 1 << 10,
        "mib" => 1 << 20,
        "gib" => 1 << 30,
        "tib" => 1 << 40,
        _ => return None,
    };
    Some((value * multiplier as f64) as u64)
}

/// First resolution label found anywhere in the title.
pub fn extract_resolution(title: &str) -> Option<Resolution> {
    RESOLUTION
        .find(title)
        .and_then(|m| Resolution::from_label(m.as_str()))
}

/// Whether a title looks like a multi-episode bundle. `movie` always wins.
pub fn is_likely_bundle(title: &str) -> bool {
    let lower = title.to_lowercase();
    if lower.contains("movie") {
        return false;
    }
    BUNDLE_WORDS.iter().any(|w| lower.contains(w))
        || SEASON_MARKER.is_match(&lower)
        || EPISODE_RANGE.is_match(&lower)
}

/// Build a record from a scraped row.
///
/// Returns `None` for rows without a title or magnet link, and for single
/// releases whose size is unknown or above [`UPLOAD_LIMIT_BYTES`]. Oversized
/// bundles are kept and flagged so the user can be warned.
pub fn normalize(row: RawRow) -> Option<TorrentRecord> {
    let title = row.title.trim();
    let magnet = row.magnet_uri.trim();
    if title.is_empty() || !magnet.starts_with("magnet:") {
        return None;
    }

    let size_text = row
        .size_text
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let size_bytes = size_text.as_deref().and_then(parse_size);
    let is_oversized = size_bytes.map_or(true, |b| b > UPLOAD_LIMIT_BYTES);

    if is_oversized && !is_likely_bundle(title) {
        return None;
    }

    let seeders = row
        .seeders_text
        .as_deref()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(0);

    Some(TorrentRecord {
        title: title.to_string(),
        magnet_uri: magnet.to_string(),
        size_text,
        size_bytes,
        resolution: extract_resolution(title),
        seeders,
        is_oversized,
    })
}
