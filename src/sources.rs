//! Media source configuration.
//!
//! Sources are maintained externally (an admin surface writes
//! `data/media-sources.json`); this module only reads them at the start of a
//! run. When the file is missing or holds no enabled sources, discovery falls
//! back to a single synthetic source built from the environment configuration,
//! so a fresh deployment still ingests something.
//!
//! Source tagging for discovered URLs is derived from each source's `baseUrl`
//! host rather than a hardcoded domain table, so adding a source in the
//! config is enough for its URLs to be tagged correctly.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;

/// One configured media source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSource {
    pub id: String,
    pub name: String,
    /// Absolute base URL; feed/sitemap paths resolve against it.
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    /// One or more sitemap (or feed) paths, comma-separated.
    #[serde(rename = "sitemapIndex")]
    pub sitemap_index: String,
    pub enabled: bool,
    #[serde(rename = "addedAt", skip_serializing_if = "Option::is_none")]
    pub added_at: Option<String>,
}

impl MediaSource {
    /// Host of `baseUrl`, used for URL-to-source tagging.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }

    /// The configured paths, split on commas and trimmed.
    pub fn paths(&self) -> Vec<String> {
        self.sitemap_index
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Heuristic: does this source's configured path look like an RSS feed?
    pub fn looks_like_feed(&self) -> bool {
        let lower = self.sitemap_index.to_lowercase();
        lower.contains("feed") || lower.contains("rss")
    }
}

/// Load enabled media sources, degrading to the config-derived default.
///
/// A missing file is not an error; a present-but-unreadable file is warned
/// about and treated the same way. Disabled sources are dropped here so the
/// rest of the pipeline never sees them.
pub fn load_media_sources(config: &Config) -> Vec<MediaSource> {
    let path = Path::new(&config.sources_file);
    let configured: Vec<MediaSource> = match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<Vec<MediaSource>>(&raw) {
            Ok(sources) => sources,
            Err(e) => {
                warn!(path = %config.sources_file, error = %e, "Unparseable media sources file; using default source");
                Vec::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %config.sources_file, "No media sources file; using default source");
            Vec::new()
        }
        Err(e) => {
            warn!(path = %config.sources_file, error = %e, "Failed reading media sources file; using default source");
            Vec::new()
        }
    };

    let enabled: Vec<MediaSource> = configured.into_iter().filter(|s| s.enabled).collect();
    if enabled.is_empty() {
        vec![default_source(config)]
    } else {
        enabled
    }
}

/// Synthetic source built from the environment configuration.
pub fn default_source(config: &Config) -> MediaSource {
    MediaSource {
        id: "default".to_string(),
        name: "Default".to_string(),
        base_url: config.base_url.clone(),
        sitemap_index: format!("{},{}", config.feed_path, config.sitemap_path),
        enabled: true,
        added_at: None,
    }
}

/// Tag a URL with the id of the source whose `baseUrl` host matches it.
pub fn source_for_url(sources: &[MediaSource], url: &str) -> Option<String> {
    let host = Url::parse(url).ok()?.host_str()?.to_string();
    sources
        .iter()
        .find(|s| s.host().is_some_and(|h| h == host))
        .map(|s| s.id.clone())
}
