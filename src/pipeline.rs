//! Ingestion orchestrator: one pass from discovery to persisted records.
//!
//! The run is a single sequential loop; candidates are processed one at a
//! time so the global rate limiter stays trivially correct. Per-URL problems
//! (network failures, non-HTML responses, empty parses) are logged, counted,
//! and skipped; they degrade the run's yield, never its completion. The only
//! fatal failures are configuration validation (handled before this module
//! runs) and I/O during the final batch persistence.

use std::error::Error;
use std::path::Path;

use chrono::{Duration, Utc};
use itertools::Itertools;
use tracing::{info, instrument, warn};

use crate::cli::Cli;
use crate::client::{FetchOptions, PoliteClient};
use crate::config::Config;
use crate::discovery::{feeds, sitemaps};
use crate::extract::parse_article;
use crate::fetch_index::FetchIndex;
use crate::models::{ArticleRecord, Candidate, PromptRecord, RunMetrics};
use crate::prompts::build_prompt_records;
use crate::sources::{self, MediaSource};
use crate::store::{append_if_new, upsert_by_match};
use crate::utils::sha256_hex;

pub const ARTICLES_FILE: &str = "rage_articles.jsonl";
pub const PROMPTS_FILE: &str = "prompts/rage_prompts.jsonl";

/// Run one full ingestion pass. Returns the run's yield metrics.
#[instrument(level = "info", skip_all)]
pub async fn run(config: &Config, args: &Cli) -> Result<RunMetrics, Box<dyn Error>> {
    let media_sources = sources::load_media_sources(config);
    info!(count = media_sources.len(), "Loaded media sources");

    let index = FetchIndex::new(&config.storage_dir);
    let client = PoliteClient::new(&config.user_agent, config.rate_limit_rps, index)?;

    // ---- Discover ----
    let mut candidates: Vec<Candidate> = Vec::new();
    if !args.sitemap_only {
        candidates.extend(feeds::discover_from_feeds(&client, &media_sources, config).await);
    }
    if !args.feed_only {
        candidates.extend(sitemaps::discover_from_sitemaps(&client, &media_sources).await);
    }
    // Candidates a discovery path could not tag get a source inferred from
    // their URL host against the configured base URLs.
    for candidate in &mut candidates {
        if candidate.source.is_none() {
            candidate.source = sources::source_for_url(&media_sources, &candidate.url);
        }
    }
    info!(count = candidates.len(), "Discovery complete");
    let mut metrics = RunMetrics {
        discovered: candidates.len(),
        ..Default::default()
    };

    // ---- Filter, dedupe, cap ----
    let candidates = filter_candidates(candidates, args);
    info!(count = candidates.len(), "Candidates after filter/dedupe/limit");

    // ---- Fetch, parse, hash ----
    let fetch_opts = FetchOptions {
        no_robots: args.no_robots,
        no_cache: false,
    };
    let mut articles: Vec<ArticleRecord> = Vec::new();
    let mut prompts: Vec<PromptRecord> = Vec::new();

    for candidate in &candidates {
        match ingest_one(&client, candidate, fetch_opts).await {
            Ok(Outcome::Article(article, chunk_records)) => {
                metrics.fetched_ok += 1;
                articles.push(article);
                prompts.extend(chunk_records);
            }
            Ok(Outcome::NotModified) => metrics.not_modified += 1,
            Ok(Outcome::NonHtml) => metrics.skipped_non_html += 1,
            Ok(Outcome::Unusable) => metrics.failed += 1,
            Err(e) => {
                warn!(url = %candidate.url, error = %e, "Candidate failed; continuing");
                metrics.failed += 1;
            }
        }
    }

    // ---- Persist ----
    let storage = Path::new(&config.storage_dir);
    let articles_path = storage.join(ARTICLES_FILE);
    let mut articles_replaced = 0usize;
    let mut articles_skipped = 0usize;
    if args.upsert {
        // Latest version wins per URL, with a one-step change trail when
        // the body hash moved.
        let stats = upsert_by_match(
            &articles_path,
            articles,
            |r| r.url.clone(),
            |prev, mut next| {
                if prev.hash != next.hash {
                    next.changed_from = Some(prev.url.clone());
                    next.prev_hash = Some(prev.hash.clone());
                }
                next
            },
        )?;
        metrics.new_articles = stats.appended;
        articles_replaced = stats.replaced;
    } else {
        let stats = append_if_new(&articles_path, &articles, |r| {
            (r.url.clone(), r.hash.clone())
        })?;
        metrics.new_articles = stats.added;
        articles_skipped = stats.skipped;
    }
    let prompt_stats = append_if_new(&storage.join(PROMPTS_FILE), &prompts, |r| {
        (r.url.clone(), r.hash.clone(), r.chunk_index)
    })?;
    metrics.new_chunks = prompt_stats.added;

    info!(
        discovered = metrics.discovered,
        fetched_ok = metrics.fetched_ok,
        not_modified = metrics.not_modified,
        failed = metrics.failed,
        skipped_non_html = metrics.skipped_non_html,
        new_articles = metrics.new_articles,
        new_chunks = metrics.new_chunks,
        articles_replaced,
        articles_skipped_as_seen = articles_skipped,
        "Ingestion run complete"
    );
    Ok(metrics)
}

enum Outcome {
    Article(ArticleRecord, Vec<PromptRecord>),
    NotModified,
    NonHtml,
    Unusable,
}

async fn ingest_one(
    client: &PoliteClient,
    candidate: &Candidate,
    opts: FetchOptions,
) -> Result<Outcome, Box<dyn Error>> {
    let fetched = client.fetch_text(&candidate.url, opts).await?;
    if fetched.status == 304 {
        return Ok(Outcome::NotModified);
    }
    if fetched.status >= 400 {
        warn!(url = %candidate.url, status = fetched.status, "Fetch returned error status");
        return Ok(Outcome::Unusable);
    }
    if !fetched.content_type.is_empty() && !fetched.content_type.contains("html") {
        return Ok(Outcome::NonHtml);
    }

    let Some(parsed) = parse_article(&candidate.url, &fetched.text) else {
        return Ok(Outcome::Unusable);
    };
    let hash = sha256_hex(&parsed.body_text);
    let prompt_records = build_prompt_records(&parsed, &hash, candidate.source.as_deref());

    // A feed-supplied date wins over whatever the page markup claims;
    // the feed is the fresher authority at discovery time.
    let published_at = candidate
        .published_at
        .or(parsed.published_at)
        .map(|dt| dt.to_rfc3339());

    let article = ArticleRecord {
        url: parsed.url,
        hash,
        published_at,
        title: parsed.title,
        author: parsed.author,
        category: parsed.category,
        body_text: Some(parsed.body_text),
        excerpt: Some(parsed.excerpt),
        image: parsed.image,
        source: candidate.source.clone(),
        fetched_at: Utc::now().to_rfc3339(),
        changed_from: None,
        prev_hash: None,
    };
    Ok(Outcome::Article(article, prompt_records))
}

/// Apply the time window, source filter, URL dedupe, and limit cap, in that
/// order. Candidates with no known publication date are kept by the time
/// window: sitemaps rarely carry dates, and exclusion only applies where a
/// date is known.
fn filter_candidates(candidates: Vec<Candidate>, args: &Cli) -> Vec<Candidate> {
    let cutoff = args.since.map(|hours| Utc::now() - Duration::hours(hours));

    let filtered = candidates
        .into_iter()
        .filter(|c| match (cutoff, c.published_at) {
            (Some(cutoff), Some(published)) => published >= cutoff,
            _ => true,
        })
        .filter(|c| match (&args.source, &c.source) {
            (Some(wanted), Some(have)) => wanted == have,
            (Some(_), None) => false,
            (None, _) => true,
        })
        .unique_by(|c| c.url.clone());

    match args.limit {
        Some(limit) => filtered.take(limit).collect(),
        None => filtered.collect(),
    }
}

/// Resolve the media sources a run would use; surfaced for `--dry` output.
pub fn resolve_sources(config: &Config) -> Vec<MediaSource> {
    sources::load_media_sources(config)
}
