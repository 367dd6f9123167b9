//! # ingest-rage
//!
//! A polite content ingestion pipeline: discovers article URLs from RSS
//! feeds and XML sitemaps across configured media sources, fetches them
//! respectfully (rate-limited, robots-aware, with ETag/Last-Modified
//! revalidation), extracts structured article data from arbitrary HTML,
//! deduplicates by content hash, and persists results as append-only JSONL
//! logs.
//!
//! ## Usage
//!
//! ```sh
//! RAGE_BASE_URL=https://news.example.com \
//! RAGE_FEED_PATH=/feed \
//! RAGE_SITEMAP_PATH=/sitemap.xml \
//! RAGE_RATE_LIMIT_RPS=2 \
//! RAGE_STORAGE_DIR=./data/rage \
//! RAGE_USER_AGENT="rage-ingest/0.3" \
//! ingest-rage --since 24 --limit 50
//! ```
//!
//! ## Architecture
//!
//! One run is a single sequential pass:
//! 1. **Discovery**: feed and sitemap indexes yield candidate URLs
//! 2. **Filtering**: time window, source filter, dedupe, limit cap
//! 3. **Fetching**: conditional GETs through the polite HTTP client
//! 4. **Extraction**: selector-cascade parsing of article HTML
//! 5. **Persistence**: dedupe-on-append to the JSONL stores
//!
//! The run always completes with a metrics summary; per-URL failures reduce
//! yield, not completion. Only configuration validation and final-persistence
//! I/O are fatal.

use clap::Parser;
use std::error::Error;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod client;
mod config;
mod discovery;
mod extract;
mod fetch_index;
mod models;
mod pipeline;
mod prompts;
mod ratelimit;
mod robots;
mod sources;
mod store;
mod utils;

use cli::Cli;
use config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ingest-rage starting up");

    let args = Cli::parse();

    // --- Config validation: fatal before any I/O ---
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            for problem in &e.problems {
                error!(%problem, "Configuration invalid");
            }
            std::process::exit(1);
        }
    };

    // --- Dry run: print resolved configuration and flags, no network ---
    if args.dry {
        let resolved = serde_json::json!({
            "config": config,
            "flags": args,
            "sources": pipeline::resolve_sources(&config),
        });
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    let metrics = pipeline::run(&config, &args).await?;
    println!("{}", serde_json::to_string(&metrics)?);

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        new_articles = metrics.new_articles,
        new_chunks = metrics.new_chunks,
        failed = metrics.failed,
        "Execution complete"
    );

    Ok(())
}
