//! Environment configuration, validated at startup.
//!
//! Every ingestion run reads its configuration from environment variables and
//! refuses to start when any of them is missing or malformed. A misconfigured
//! run must never silently proceed with defaults: `main` prints one structured
//! diagnostic per invalid field and exits non-zero before any I/O happens.

use serde::Serialize;
use url::Url;

pub const ENV_BASE_URL: &str = "RAGE_BASE_URL";
pub const ENV_FEED_PATH: &str = "RAGE_FEED_PATH";
pub const ENV_SITEMAP_PATH: &str = "RAGE_SITEMAP_PATH";
pub const ENV_RATE_LIMIT_RPS: &str = "RAGE_RATE_LIMIT_RPS";
pub const ENV_STORAGE_DIR: &str = "RAGE_STORAGE_DIR";
pub const ENV_USER_AGENT: &str = "RAGE_USER_AGENT";
pub const ENV_SOURCES_FILE: &str = "RAGE_SOURCES_FILE";

pub const DEFAULT_SOURCES_FILE: &str = "data/media-sources.json";

/// Validated process configuration.
///
/// `base_url` is guaranteed to be an absolute http(s) URL, the paths start
/// with `/`, and `rate_limit_rps` is a positive number. Serialized as-is for
/// `--dry` output.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub base_url: String,
    pub feed_path: String,
    pub sitemap_path: String,
    pub rate_limit_rps: f64,
    pub storage_dir: String,
    pub user_agent: String,
    pub sources_file: String,
}

/// All validation problems found in the environment, reported together so an
/// operator can fix everything in one pass.
#[derive(Debug)]
pub struct ConfigError {
    pub problems: Vec<String>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid configuration: {}", self.problems.join("; "))
    }
}

impl std::error::Error for ConfigError {}

fn env_var(name: &str, problems: &mut Vec<String>) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => {
            problems.push(format!("{name} must be set to a non-empty value"));
            None
        }
    }
}

impl Config {
    /// Read and validate the full configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] listing every invalid field; the caller is
    /// expected to treat this as fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut problems = Vec::new();

        let base_url = env_var(ENV_BASE_URL, &mut problems);
        if let Some(ref raw) = base_url {
            match Url::parse(raw) {
                Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
                _ => problems.push(format!("{ENV_BASE_URL} must be an absolute http(s) URL, got {raw:?}")),
            }
        }

        let feed_path = env_var(ENV_FEED_PATH, &mut problems);
        if let Some(ref p) = feed_path {
            if !p.starts_with('/') {
                problems.push(format!("{ENV_FEED_PATH} must start with '/', got {p:?}"));
            }
        }

        let sitemap_path = env_var(ENV_SITEMAP_PATH, &mut problems);
        if let Some(ref p) = sitemap_path {
            // May be a comma-separated list of paths; each must be rooted.
            for part in p.split(',') {
                if !part.trim().starts_with('/') {
                    problems.push(format!("{ENV_SITEMAP_PATH} entries must start with '/', got {:?}", part.trim()));
                }
            }
        }

        let rate_limit_rps = env_var(ENV_RATE_LIMIT_RPS, &mut problems).and_then(|raw| {
            match raw.parse::<f64>() {
                Ok(n) if n > 0.0 && n.is_finite() => Some(n),
                _ => {
                    problems.push(format!("{ENV_RATE_LIMIT_RPS} must be a positive number, got {raw:?}"));
                    None
                }
            }
        });

        let storage_dir = env_var(ENV_STORAGE_DIR, &mut problems);
        let user_agent = env_var(ENV_USER_AGENT, &mut problems);

        let sources_file = std::env::var(ENV_SOURCES_FILE)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCES_FILE.to_string());

        if !problems.is_empty() {
            return Err(ConfigError { problems });
        }

        // Unwraps are safe: a None for any field pushed a problem above.
        Ok(Config {
            base_url: base_url.unwrap(),
            feed_path: feed_path.unwrap(),
            sitemap_path: sitemap_path.unwrap(),
            rate_limit_rps: rate_limit_rps.unwrap(),
            storage_dir: storage_dir.unwrap(),
            user_agent: user_agent.unwrap(),
            sources_file,
        })
    }
}
