//! Small shared helpers: content hashing, whitespace normalization,
//! excerpt computation, and loose date parsing.
//!
//! The content hash is the unit of change detection for the whole pipeline:
//! two fetches of an article are "the same" exactly when the SHA-256 of their
//! normalized body text matches.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// SHA-256 of a text, as a lowercase hex string.
///
/// No normalization happens here; callers hash text the parser has already
/// whitespace-collapsed. Text that differs in anything other than whitespace
/// hashes differently and is treated as a change.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Collapse all runs of whitespace to single spaces and trim.
pub fn collapse_ws(text: &str) -> String {
    WS.replace_all(text, " ").trim().to_string()
}

/// First 25-40 words of a body, proportional to its length.
///
/// Word count is `total_words / 25` clamped to `25..=40`, so a 1000-word
/// article gets the full 40 and short pieces still get a readable 25.
/// Quote characters are stripped, whitespace collapsed.
pub fn excerpt(body_text: &str) -> String {
    let words: Vec<&str> = body_text.split_whitespace().collect();
    let take = (words.len() / 25).clamp(25, 40);
    let cut = words
        .iter()
        .take(take)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    cut.replace(
        ['"', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}', '\''],
        "",
    )
}

/// Parse a publication date in any of the formats sources actually emit:
/// RFC 3339 (meta tags, JSON-LD, sitemap lastmod), RFC 2822 (RSS pubDate),
/// or a bare `YYYY-MM-DD`.
pub fn parse_date_loose(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(
            date.and_hms_opt(0, 0, 0)?
                .and_local_timezone(Utc)
                .single()?,
        );
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_stable() {
        let a = sha256_hex("hello world");
        let b = sha256_hex("hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, sha256_hex("hello worlds"));
    }

    #[test]
    fn test_collapse_ws() {
        assert_eq!(collapse_ws("  a\n\tb   c "), "a b c");
        assert_eq!(collapse_ws(""), "");
    }

    #[test]
    fn test_excerpt_bounds_long_body() {
        let body = vec!["word"; 1000].join(" ");
        let words = excerpt(&body).split_whitespace().count();
        assert!((25..=40).contains(&words), "got {} words", words);
    }

    #[test]
    fn test_excerpt_bounds_short_body() {
        let body = vec!["word"; 100].join(" ");
        let words = excerpt(&body).split_whitespace().count();
        assert_eq!(words, 25);
    }

    #[test]
    fn test_excerpt_strips_quotes() {
        let body = "He said \u{201c}hello\u{201d} and 'left' again ".repeat(20);
        let ex = excerpt(&body);
        assert!(!ex.contains('"'));
        assert!(!ex.contains('\''));
        assert!(!ex.contains('\u{201c}'));
    }

    #[test]
    fn test_parse_date_loose_formats() {
        assert!(parse_date_loose("2025-05-06T14:30:00Z").is_some());
        assert!(parse_date_loose("Tue, 06 May 2025 14:30:00 GMT").is_some());
        assert!(parse_date_loose("2025-05-06").is_some());
        assert!(parse_date_loose("yesterday-ish").is_none());
    }
}
