//! Heuristics over release titles: release group, audio track, episode number,
//! and the content key used for cross-release deduplication.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::TorrentRecord;

/// Sort key for titles without a recognisable episode number.
pub const UNKNOWN_EPISODE: u32 = 9999;

/// Group label for titles without a bracketed tag.
pub const UNKNOWN_GROUP: &str = "Unknown";

static BRACKET_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]").unwrap());

/// `12-24`, `01 ~ 13`: a run of episodes.
pub(crate) static EPISODE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,4})\s*[-~]\s*\d{1,4}").unwrap());

static EPISODE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:e|ep|episode\s?|\s-\s)(\d{1,4})").unwrap());

static PAREN_OR_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)|v\d").unwrap());

static EXTENSION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\w+$").unwrap());

const DUB_MARKERS: [&str; 3] = ["dub", "dubbed", "dual audio"];

/// Release group from the first bracketed tag, or `Unknown`.
pub fn release_group(title: &str) -> String {
    BRACKET_TAG
        .captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| UNKNOWN_GROUP.to_string())
}

/// Whether the title advertises an English (or dual) audio track.
pub fn is_dub(title: &str) -> bool {
    let lower = title.to_lowercase();
    DUB_MARKERS.iter().any(|m| lower.contains(m))
}

/// Episode number used for ordering and deduplication.
///
/// A range yields its first number (the bundle starts there); otherwise an
/// explicit marker (`e`, `ep`, `episode`, ` - `) is used; otherwise
/// [`UNKNOWN_EPISODE`].
pub fn episode_number(title: &str) -> u32 {
    let lower = title.to_lowercase();

    let from = |re: &Regex| {
        re.captures(&lower)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
    };

    from(&EPISODE_RANGE)
        .or_else(|| from(&EPISODE_MARKER))
        .unwrap_or(UNKNOWN_EPISODE)
}

/// Identity of the content behind a title, ignoring who uploaded it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub normalized_title: String,
    pub episode: u32,
}

/// Lower-cased title without bracket tags, parenthesised or version suffixes
/// and a trailing file extension, paired with the episode number.
pub fn content_key(title: &str) -> ContentKey {
    let lower = title.to_lowercase();
    let stripped = BRACKET_TAG.replace_all(&lower, "");
    let stripped = PAREN_OR_VERSION.replace_all(&stripped, "");
    let stripped = EXTENSION_SUFFIX.replace(&stripped, "");

    ContentKey {
        normalized_title: stripped.trim().to_string(),
        episode: episode_number(title),
    }
}

/// Title with all bracketed tags removed.
pub fn strip_tags(title: &str) -> String {
    BRACKET_TAG.replace_all(title, "").trim().to_string()
}

/// Button label for a single record: `[📦 ]title | size`.
pub fn item_label(record: &TorrentRecord) -> String {
    let prefix = if record.is_oversized { "📦 " } else { "" };
    format!(
        "{}{} | {}",
        prefix,
        strip_tags(&record.title),
        record.size_text.as_deref().unwrap_or("Unknown")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_group() {
        assert_eq!(release_group("[SubsPlease] Show - 01 (1080p)"), "SubsPlease");
        assert_eq!(release_group("Show - 01 [ Erai-raws ]"), "Erai-raws");
        assert_eq!(release_group("Show - 01 (1080p)"), "Unknown");
    }

    #[test]
    fn test_is_dub() {
        assert!(is_dub("[Group] Show - 01 [English Dub]"));
        assert!(is_dub("[Group] Show S01 DUAL AUDIO"));
        assert!(!is_dub("[Group] Show - 01 [Multi-Subs]"));
    }

    #[test]
    fn test_episode_number_range_takes_first() {
        assert_eq!(episode_number("[Group] Show 01-12 [Batch]"), 1);
        assert_eq!(episode_number("[Group] Show (13 ~ 24)"), 13);
    }

    #[test]
    fn test_episode_number_markers() {
        assert_eq!(episode_number("[SubsPlease] Show - 07 (1080p)"), 7);
        assert_eq!(episode_number("Show EP05 1080p"), 5);
        assert_eq!(episode_number("Show Episode 3"), 3);
        assert_eq!(episode_number("Show.S01E11.1080p"), 11);
    }

    #[test]
    fn test_episode_number_unknown() {
        assert_eq!(episode_number("[Group] Show The Movie [BD]"), UNKNOWN_EPISODE);
    }

    #[test]
    fn test_content_key_ignores_group_version_and_extension() {
        let a = content_key("[SubsPlease] Show - 05v2 (1080p) [ABCD1234].mkv");
        let b = content_key("[Other] Show - 05 (1080p)");
        assert_eq!(a, b);
        assert_eq!(a.episode, 5);
        assert_eq!(a.normalized_title, "show - 05");
    }

    #[test]
    fn test_content_key_differs_by_episode() {
        let a = content_key("[A] Show - 05");
        let b = content_key("[A] Show - 06");
        assert_ne!(a, b);
    }

    #[test]
    fn test_item_label() {
        let record = TorrentRecord {
            title: "[Group] Show 01-12 [1080p]".to_string(),
            magnet_uri: "magnet:?xt=urn:btih:1".to_string(),
            size_text: Some("14.2 GiB".to_string()),
            size_bytes: Some(15_247_230_566),
            resolution: None,
            seeders: 3,
            is_oversized: true,
        };
        assert_eq!(item_label(&record), "📦 Show 01-12 | 14.2 GiB");

        let plain = TorrentRecord {
            is_oversized: false,
            size_text: None,
            ..record
        };
        assert_eq!(item_label(&plain), "Show 01-12 | Unknown");
    }
}
