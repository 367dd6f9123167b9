//! Data models for discovered candidates, parsed articles, and the records
//! the pipeline persists.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`Candidate`]: a URL discovered via feed or sitemap, not yet fetched
//! - [`ParsedArticle`]: structured output of the HTML extractor
//! - [`ArticleRecord`]: one line of `rage_articles.jsonl`
//! - [`PromptRecord`]: one line of `prompts/rage_prompts.jsonl`
//! - [`RunMetrics`]: per-run yield summary emitted at the end of ingestion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A URL discovered via feed or sitemap, not yet fetched or parsed.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Absolute article URL.
    pub url: String,
    /// Publication timestamp, when the feed carried one. Sitemaps rarely do.
    pub published_at: Option<DateTime<Utc>>,
    /// Media source id this URL was discovered from.
    pub source: Option<String>,
}

/// Structured article data extracted from raw HTML.
///
/// Every field except `url`, `body_text` and `excerpt` is best-effort: the
/// extractor walks a cascade of selectors per field and leaves `None` when
/// nothing matches.
#[derive(Debug, Clone)]
pub struct ParsedArticle {
    pub url: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub image: Option<String>,
    /// Whitespace-collapsed main body text. Never empty; extraction returns
    /// `None` instead of producing an empty-bodied article.
    pub body_text: String,
    /// First 25-40 words of the body.
    pub excerpt: String,
}

/// One article as persisted to `rage_articles.jsonl`.
///
/// `hash` is the SHA-256 of `body_text` and forms the composite append key
/// `(url, hash)`. The upsert path keeps a one-step change trail via
/// `changed_from`/`prev_hash` when a URL is re-ingested with a new hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub url: String,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub fetched_at: String,
    /// URL of the prior record this one replaced (upsert path only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_from: Option<String>,
    /// Body hash of the prior record this one replaced (upsert path only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
}

/// One derived summary/chunk line as persisted to `prompts/rage_prompts.jsonl`.
///
/// Composite identity key is `(url, hash, chunk_index)`; `chunk_index` values
/// for a given `(url, hash)` are contiguous from 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRecord {
    pub url: String,
    pub hash: String,
    pub title: String,
    pub summary: String,
    pub bullets: Vec<String>,
    pub chunk_index: usize,
    pub chunk_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created_at: String,
}

/// Yield counters for one ingestion run, logged and printed as JSON at exit.
#[derive(Debug, Default, Serialize)]
pub struct RunMetrics {
    pub discovered: usize,
    pub fetched_ok: usize,
    pub not_modified: usize,
    pub failed: usize,
    pub skipped_non_html: usize,
    pub new_articles: usize,
    pub new_chunks: usize,
}
