//! Text helpers for user input and HTML-formatted output.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Words dropped from search input unless nothing else remains.
const STOPWORDS: [&str; 5] = ["search", "find", "please", "pls", "download"];

/// Maximum characters of a catalog description shown in the detail view.
pub const DESCRIPTION_MAX_CHARS: usize = 900;

static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").unwrap());
static BR_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*br\s*/?>").unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\x0C\x0B]+").unwrap());

/// Clean free-text search input.
///
/// Trims surrounding quotes, removes `@mentions` and stopwords, and collapses
/// whitespace. If only stopwords are left they are kept.
pub fn normalize_query(raw: &str) -> String {
    let text = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    let text = MENTION.replace_all(text, "");

    let parts: Vec<&str> = text.split_whitespace().collect();
    let filtered: Vec<&str> = parts
        .iter()
        .copied()
        .filter(|w| !STOPWORDS.contains(&w.to_lowercase().as_str()))
        .collect();

    if filtered.is_empty() {
        parts.join(" ")
    } else {
        filtered.join(" ")
    }
}

/// Escape text for HTML parse mode. Quotes are left alone.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Turn a catalog description into plain text fit for a caption.
pub fn sanitize_description(text: &str) -> String {
    let cleaned = BR_TAG.replace_all(text, "\n");
    let cleaned = ANY_TAG.replace_all(&cleaned, "");
    let cleaned = cleaned.replace('\r', "");
    let cleaned = HORIZONTAL_WS.replace_all(&cleaned, " ");

    let cleaned = cleaned
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.chars().count() > DESCRIPTION_MAX_CHARS {
        let mut truncated: String = cleaned.chars().take(DESCRIPTION_MAX_CHARS).collect();
        truncated.push('…');
        truncated
    } else {
        cleaned
    }
}

/// Human-readable binary size, e.g. `1.4 GiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Compact remaining time, e.g. `4m 05s`. `None` means unknown.
pub fn format_eta(secs: Option<u64>) -> String {
    match secs {
        None => "unknown".to_string(),
        Some(s) if s < 60 => format!("{}s", s),
        Some(s) if s < 3600 => format!("{}m {:02}s", s / 60, s % 60),
        Some(s) => format!("{}h {:02}m", s / 3600, (s % 3600) / 60),
    }
}

/// Levenshtein edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Similarity in `0.0..=1.0`: one minus the edit distance over the longer length.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  \"Frieren\"  "), "Frieren");
        assert_eq!(normalize_query("@animedlbot please find  one   piece"), "one piece");
        assert_eq!(normalize_query("Download Bleach pls"), "Bleach");
    }

    #[test]
    fn test_normalize_query_only_stopwords() {
        assert_eq!(normalize_query("search please"), "search please");
        assert_eq!(normalize_query(""), "");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("Tom & Jerry <3 \"quotes\""),
            "Tom &amp; Jerry &lt;3 \"quotes\""
        );
    }

    #[test]
    fn test_sanitize_description() {
        let raw = "First line.<br><br>\r\nSecond   <i>line</i>.<BR />\n\n   (Source: X)";
        assert_eq!(
            sanitize_description(raw),
            "First line.\nSecond line.\n(Source: X)"
        );
    }

    #[test]
    fn test_sanitize_description_truncates() {
        let raw = "a".repeat(DESCRIPTION_MAX_CHARS + 50);
        let out = sanitize_description(&raw);
        assert_eq!(out.chars().count(), DESCRIPTION_MAX_CHARS + 1);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(1_503_238_553), "1.4 GiB");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(None), "unknown");
        assert_eq!(format_eta(Some(42)), "42s");
        assert_eq!(format_eta(Some(245)), "4m 05s");
        assert_eq!(format_eta(Some(3 * 3600 + 7 * 60 + 9)), "3h 07m");
    }

    #[test]
    fn test_similarity() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert!((similarity("naruto", "boruto") - 2.0 / 3.0).abs() < 1e-9);
    }
}
