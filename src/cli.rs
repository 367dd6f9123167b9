//! Command-line interface definitions for the ingestion pipeline.
//!
//! This module defines the CLI flags using the `clap` crate. The camelCase
//! aliases (`--feedOnly`, `--sitemapOnly`, `--noRobots`) are kept for
//! compatibility with existing cron entries.

use clap::Parser;
use serde::Serialize;

/// Command-line flags for one ingestion run.
///
/// Process configuration (base URL, rate limit, storage directory, user
/// agent) comes from the environment; these flags only shape a single run.
/// The run-shaping options also read `RAGE_SINCE`, `RAGE_LIMIT` and
/// `RAGE_SOURCE` as environment fallbacks, with explicit flags winning.
///
/// # Examples
///
/// ```sh
/// # Preview the resolved configuration without any network I/O
/// ingest-rage --dry
///
/// # Feeds only, last 24 hours, at most 50 articles
/// ingest-rage --feed-only --since 24 --limit 50
///
/// # Re-ingest one source, ignoring robots.txt
/// ingest-rage --source alpha --no-robots
/// ```
#[derive(Parser, Debug, Serialize)]
#[command(author, version, about)]
pub struct Cli {
    /// Print the resolved configuration and flags as JSON and exit
    #[arg(long)]
    pub dry: bool,

    /// Discover candidates from RSS feeds only
    #[arg(long, alias = "feedOnly")]
    pub feed_only: bool,

    /// Discover candidates from sitemaps only
    #[arg(long, alias = "sitemapOnly")]
    pub sitemap_only: bool,

    /// Skip robots.txt compliance checks for article fetches
    #[arg(long, alias = "noRobots")]
    pub no_robots: bool,

    /// Replace article records in place when a URL's content hash changes
    /// (latest-version-wins with a one-step change trail) instead of
    /// appending revisions
    #[arg(long)]
    pub upsert: bool,

    /// Drop candidates whose known publication date is older than this many
    /// hours (candidates without a date are kept)
    #[arg(long, env = "RAGE_SINCE")]
    pub since: Option<i64>,

    /// Cap the number of candidates fetched this run
    #[arg(long, env = "RAGE_LIMIT")]
    pub limit: Option<usize>,

    /// Only ingest candidates from this media source id
    #[arg(long, env = "RAGE_SOURCE")]
    pub source: Option<String>,
}
