//! Polite HTTP client: robots compliance, global rate limiting, conditional
//! requests, and retry with backoff.
//!
//! Every outbound article/index fetch goes through [`PoliteClient::fetch_text`],
//! which in order:
//! 1. consults the per-origin robots.txt cache (unless bypassed),
//! 2. waits its turn on the global rate limiter,
//! 3. attaches `If-None-Match`/`If-Modified-Since` from the fetch-state index,
//! 4. retries 429/5xx with exponential backoff (1s doubling, 16s cap, 5
//!    attempts total), returning the last failing response instead of erroring,
//! 5. records the response validators back into the fetch-state index.
//!
//! A 304 short-circuits with empty text; callers must inspect `status` since
//! a returned response is not guaranteed successful.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::fetch_index::{FetchHead, FetchIndex};
use crate::ratelimit::RateLimiter;
use crate::robots::{RobotsCache, RobotsRules};

/// Retry budget for 429/5xx responses: 5 attempts total, sleeping
/// 1s, 2s, 4s, 8s between them (doubling, capped at 16s).
const MAX_ATTEMPTS: usize = 5;
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(16);

/// A fetch denied by the target origin's robots.txt.
#[derive(Debug)]
pub struct RobotsDenied {
    pub url: String,
}

impl fmt::Display for RobotsDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "robots.txt disallows fetching {}", self.url)
    }
}

impl Error for RobotsDenied {}

/// Result of a text fetch. `text` is empty on 304.
#[derive(Debug)]
pub struct FetchedText {
    pub text: String,
    pub content_type: String,
    pub status: u16,
}

/// Per-request knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Skip the robots.txt check (discovery's own index fetches).
    pub no_robots: bool,
    /// Skip conditional headers and always fetch fresh (feeds).
    pub no_cache: bool,
}

/// HTTP client that owns the robots cache and shares the process-wide
/// rate limiter and fetch-state index.
pub struct PoliteClient {
    http: reqwest::Client,
    limiter: RateLimiter,
    robots: RobotsCache,
    index: FetchIndex,
    user_agent: String,
}

impl PoliteClient {
    pub fn new(
        user_agent: &str,
        rate_limit_rps: f64,
        index: FetchIndex,
    ) -> Result<Self, Box<dyn Error>> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .build()?;
        Ok(PoliteClient {
            http,
            limiter: RateLimiter::new(rate_limit_rps),
            robots: RobotsCache::new(),
            index,
            user_agent: user_agent.to_string(),
        })
    }

    /// Fetch a URL as text, politely.
    ///
    /// # Errors
    ///
    /// Returns [`RobotsDenied`] when the origin's robots.txt disallows the
    /// path, and propagates network/transport errors. HTTP error statuses
    /// after retry exhaustion are *not* errors here; inspect
    /// [`FetchedText::status`].
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_text(
        &self,
        url: &str,
        opts: FetchOptions,
    ) -> Result<FetchedText, Box<dyn Error>> {
        let parsed = Url::parse(url)?;

        if !opts.no_robots {
            let rules = self.rules_for_origin(&parsed).await;
            if !rules.allows(&self.user_agent, parsed.path()) {
                return Err(Box::new(RobotsDenied {
                    url: url.to_string(),
                }));
            }
        }

        let head = if opts.no_cache {
            None
        } else {
            self.index.read()?.remove(url)
        };

        let mut attempt = 1usize;
        let mut delay = BACKOFF_BASE;
        let response = loop {
            self.limiter.wait_turn().await;

            let mut request = self.http.get(parsed.clone());
            if let Some(ref head) = head {
                if let Some(ref etag) = head.etag {
                    request = request.header(IF_NONE_MATCH, etag);
                }
                if let Some(ref last_modified) = head.last_modified {
                    request = request.header(IF_MODIFIED_SINCE, last_modified);
                }
            }

            let response = request.send().await?;
            let status = response.status();
            let retryable = status.as_u16() == 429 || status.is_server_error();
            if retryable && attempt < MAX_ATTEMPTS {
                warn!(%url, status = status.as_u16(), attempt, "Retryable response; backing off");
                sleep(delay).await;
                delay = (delay * 2).min(BACKOFF_CAP);
                attempt += 1;
                continue;
            }
            if retryable {
                warn!(%url, status = status.as_u16(), attempts = attempt, "Retries exhausted; returning failing response");
            }
            break response;
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        self.index.upsert(
            url,
            FetchHead {
                etag,
                last_modified,
                last_seen_at: Utc::now().to_rfc3339(),
                last_status: status,
            },
        )?;

        if status == 304 {
            debug!(%url, "Not modified since last fetch");
            return Ok(FetchedText {
                text: String::new(),
                content_type,
                status,
            });
        }

        let text = response.text().await?;
        Ok(FetchedText {
            text,
            content_type,
            status,
        })
    }

    /// Cached robots rules for an origin, fetching and parsing on first use.
    ///
    /// Robots fetches bypass the robots check themselves and the conditional
    /// cache, but still wait on the rate limiter. Any failure (network,
    /// non-2xx) caches permissive rules for the rest of the process.
    async fn rules_for_origin(&self, url: &Url) -> std::sync::Arc<RobotsRules> {
        let origin = url.origin().ascii_serialization();
        if let Some(rules) = self.robots.get(&origin).await {
            return rules;
        }

        let robots_url = format!("{origin}/robots.txt");
        self.limiter.wait_turn().await;
        let rules = match self.http.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    info!(%origin, "Fetched and parsed robots.txt");
                    RobotsRules::parse(&body)
                }
                Err(e) => {
                    warn!(%origin, error = %e, "robots.txt body unreadable; treating as allow-all");
                    RobotsRules::permissive()
                }
            },
            Ok(response) => {
                debug!(%origin, status = response.status().as_u16(), "No usable robots.txt; treating as allow-all");
                RobotsRules::permissive()
            }
            Err(e) => {
                warn!(%origin, error = %e, "robots.txt fetch failed; treating as allow-all");
                RobotsRules::permissive()
            }
        };
        self.robots.insert(origin, rules).await
    }
}
