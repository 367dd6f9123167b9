//! robots.txt parsing and per-origin caching.
//!
//! The parser handles the subset of the robots exclusion protocol the
//! pipeline enforces: `User-agent` groups with `Disallow` path-prefix rules.
//! Group selection prefers an exact (case-insensitive) user-agent match and
//! falls back to the `*` wildcard group; all groups matching the effective
//! agent are merged.
//!
//! The cache is owned by the HTTP client and lives for the process: the first
//! request to a new origin blocks on one robots.txt fetch, everything after
//! that hits the cache. An unreachable robots.txt is recorded as permissive —
//! progress is favored over strict compliance.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Parsed rules for one origin.
#[derive(Debug, Default)]
pub struct RobotsRules {
    groups: Vec<Group>,
}

#[derive(Debug, Default)]
struct Group {
    agents: Vec<String>,
    disallow: Vec<String>,
}

impl RobotsRules {
    /// Rules that allow everything; used when robots.txt can't be fetched.
    pub fn permissive() -> Self {
        RobotsRules::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group::default();
        let mut in_rules = false;

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    // A user-agent line after rule lines starts a new group;
                    // consecutive user-agent lines share one.
                    if in_rules {
                        if !current.agents.is_empty() {
                            groups.push(std::mem::take(&mut current));
                        }
                        in_rules = false;
                    }
                    current.agents.push(value.to_lowercase());
                }
                "disallow" => {
                    if !current.agents.is_empty() {
                        in_rules = true;
                        if !value.is_empty() {
                            current.disallow.push(value.to_string());
                        }
                    }
                }
                // Allow/crawl-delay/sitemap lines end the agent list for the
                // group but are otherwise not enforced here.
                "allow" | "crawl-delay" | "sitemap" => {
                    if !current.agents.is_empty() {
                        in_rules = true;
                    }
                }
                _ => {}
            }
        }
        if !current.agents.is_empty() {
            groups.push(current);
        }

        RobotsRules { groups }
    }

    /// Is `path` fetchable for `user_agent`?
    ///
    /// Exact agent groups win over `*`; within the winning set any
    /// `Disallow` rule that is a prefix of the path denies the fetch.
    pub fn allows(&self, user_agent: &str, path: &str) -> bool {
        let agent = user_agent.to_lowercase();

        let exact: Vec<&Group> = self
            .groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| *a == agent))
            .collect();
        let effective: Vec<&Group> = if exact.is_empty() {
            self.groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == "*"))
                .collect()
        } else {
            exact
        };

        !effective
            .iter()
            .flat_map(|g| g.disallow.iter())
            .any(|rule| path.starts_with(rule.as_str()))
    }
}

/// Per-origin cache of parsed rules, shared behind the HTTP client.
#[derive(Debug, Default)]
pub struct RobotsCache {
    inner: Mutex<HashMap<String, Arc<RobotsRules>>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        RobotsCache::default()
    }

    pub async fn get(&self, origin: &str) -> Option<Arc<RobotsRules>> {
        self.inner.lock().await.get(origin).cloned()
    }

    pub async fn insert(&self, origin: String, rules: RobotsRules) -> Arc<RobotsRules> {
        let rules = Arc::new(rules);
        self.inner.lock().await.insert(origin, Arc::clone(&rules));
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
# comments are ignored
User-agent: *
Disallow: /private/
Disallow: /tmp

User-agent: rage-ingest
Disallow: /staging/
";

    #[test]
    fn test_wildcard_group_applies_to_unknown_agent() {
        let rules = RobotsRules::parse(ROBOTS);
        assert!(!rules.allows("somebot", "/private/page"));
        assert!(!rules.allows("somebot", "/tmp-files/x"));
        assert!(rules.allows("somebot", "/public/page"));
    }

    #[test]
    fn test_exact_agent_group_preferred_over_wildcard() {
        let rules = RobotsRules::parse(ROBOTS);
        // The exact group only blocks /staging/, so /private/ is allowed.
        assert!(!rules.allows("rage-ingest", "/staging/x"));
        assert!(rules.allows("rage-ingest", "/private/page"));
    }

    #[test]
    fn test_agent_match_is_case_insensitive() {
        let rules = RobotsRules::parse(ROBOTS);
        assert!(!rules.allows("Rage-Ingest", "/staging/x"));
    }

    #[test]
    fn test_empty_disallow_allows_everything() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n");
        assert!(rules.allows("anybot", "/anything"));
    }

    #[test]
    fn test_permissive_rules_allow_everything() {
        let rules = RobotsRules::permissive();
        assert!(rules.allows("anybot", "/private/"));
    }

    #[test]
    fn test_consecutive_agent_lines_share_group() {
        let text = "User-agent: a\nUser-agent: b\nDisallow: /x\n";
        let rules = RobotsRules::parse(text);
        assert!(!rules.allows("a", "/x/y"));
        assert!(!rules.allows("b", "/x/y"));
        assert!(rules.allows("c", "/x/y"));
    }

    #[tokio::test]
    async fn test_cache_get_insert() {
        let cache = RobotsCache::new();
        assert!(cache.get("https://example.com").await.is_none());
        cache
            .insert("https://example.com".to_string(), RobotsRules::permissive())
            .await;
        assert!(cache.get("https://example.com").await.is_some());
    }
}
