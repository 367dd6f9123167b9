//! RSS 2.0 feed discovery.
//!
//! For each enabled media source whose configured path looks like a feed
//! (path contains `feed` or `rss`), fetch the path against the source's base
//! URL and pull `link` (falling back to `guid`) plus `pubDate` out of
//! `rss/channel/item` entries. Feed fetches always go out fresh, without
//! conditional headers: feed freshness matters more than the bandwidth saved
//! by a 304.

use std::error::Error;

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{info, instrument, warn};
use url::Url;

use crate::client::{FetchOptions, PoliteClient};
use crate::config::Config;
use crate::models::Candidate;
use crate::sources::{MediaSource, default_source};
use crate::utils::parse_date_loose;

/// One `<item>` worth of data.
#[derive(Debug, PartialEq)]
pub struct FeedItem {
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Parse an RSS 2.0 document into items with optional publication dates.
///
/// Items without a `link` fall back to their `guid` text; items with
/// neither are dropped. An unparseable `pubDate` degrades to `None`.
pub fn parse_rss(xml: &str) -> Result<Vec<FeedItem>, Box<dyn Error>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    #[derive(Clone, Copy, PartialEq)]
    enum Field {
        Link,
        Guid,
        PubDate,
    }

    let mut items = Vec::new();
    let mut in_item = false;
    let mut field: Option<Field> = None;
    let mut link = String::new();
    let mut guid = String::new();
    let mut pub_date = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"item" => {
                    in_item = true;
                    link.clear();
                    guid.clear();
                    pub_date.clear();
                }
                b"link" if in_item => field = Some(Field::Link),
                b"guid" if in_item => field = Some(Field::Guid),
                b"pubDate" if in_item => field = Some(Field::PubDate),
                _ => field = None,
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"item" => {
                    in_item = false;
                    let url = if !link.is_empty() {
                        link.clone()
                    } else {
                        guid.clone()
                    };
                    if !url.is_empty() {
                        items.push(FeedItem {
                            url,
                            published_at: parse_date_loose(&pub_date),
                        });
                    }
                }
                _ => field = None,
            },
            Event::Text(t) => {
                if let (true, Some(field), Some(text)) = (in_item, field, super::text_content(&t)) {
                    match field {
                        Field::Link => link.push_str(&text),
                        Field::Guid => guid.push_str(&text),
                        Field::PubDate => pub_date.push_str(&text),
                    }
                }
            }
            Event::CData(t) => {
                if let (true, Some(field)) = (in_item, field) {
                    let text = super::cdata_content(t);
                    match field {
                        Field::Link => link.push_str(&text),
                        Field::Guid => guid.push_str(&text),
                        Field::PubDate => pub_date.push_str(&text),
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(items)
}

/// Discover candidates from every source with a feed-looking path.
///
/// Per-source failures (network, non-XML content type, parse errors) are
/// warned about and skipped; they never abort discovery for other sources.
/// When no configured source qualifies as a feed, the config-derived default
/// source is used instead.
#[instrument(level = "info", skip_all)]
pub async fn discover_from_feeds(
    client: &PoliteClient,
    sources: &[MediaSource],
    config: &Config,
) -> Vec<Candidate> {
    let mut feed_sources: Vec<(String, String)> = Vec::new();
    for source in sources.iter().filter(|s| s.looks_like_feed()) {
        for path in source.paths() {
            let lower = path.to_lowercase();
            if lower.contains("feed") || lower.contains("rss") {
                feed_sources.push((source.id.clone(), join_path(&source.base_url, &path)));
            }
        }
    }
    if feed_sources.is_empty() {
        let fallback = default_source(config);
        feed_sources.push((
            fallback.id.clone(),
            join_path(&config.base_url, &config.feed_path),
        ));
    }

    let opts = FetchOptions {
        no_robots: true,
        no_cache: true,
    };

    let mut candidates = Vec::new();
    for (source_id, feed_url) in feed_sources {
        let fetched = match client.fetch_text(&feed_url, opts).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(source = %source_id, url = %feed_url, error = %e, "Feed fetch failed; skipping source");
                continue;
            }
        };
        if fetched.status >= 400 {
            warn!(source = %source_id, url = %feed_url, status = fetched.status, "Feed returned error status; skipping source");
            continue;
        }
        if !looks_like_xml(&fetched.content_type) {
            warn!(source = %source_id, url = %feed_url, content_type = %fetched.content_type, "Feed is not XML; skipping source");
            continue;
        }

        match parse_rss(&fetched.text) {
            Ok(items) => {
                info!(source = %source_id, count = items.len(), "Indexed feed items");
                candidates.extend(items.into_iter().map(|item| Candidate {
                    url: item.url,
                    published_at: item.published_at,
                    source: Some(source_id.clone()),
                }));
            }
            Err(e) => {
                warn!(source = %source_id, url = %feed_url, error = %e, "Feed parse failed; skipping source");
            }
        }
    }
    candidates
}

fn looks_like_xml(content_type: &str) -> bool {
    // Servers are sloppy about feed content types; accept anything XML-ish
    // and only reject when a decidedly different type is declared.
    content_type.is_empty()
        || content_type.contains("xml")
        || content_type.contains("rss")
}

fn join_path(base_url: &str, path: &str) -> String {
    match Url::parse(base_url).and_then(|b| b.join(path)) {
        Ok(u) => u.to_string(),
        Err(_) => format!("{}{}", base_url.trim_end_matches('/'), path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <item>
      <title>First story</title>
      <link>https://news.example.com/2025/first</link>
      <pubDate>Tue, 06 May 2025 14:30:00 GMT</pubDate>
    </item>
    <item>
      <title>Guid only</title>
      <guid isPermaLink="true">https://news.example.com/2025/second</guid>
    </item>
    <item>
      <title>No link at all</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_rss_links_and_dates() {
        let items = parse_rss(FEED).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://news.example.com/2025/first");
        assert!(items[0].published_at.is_some());
        assert_eq!(items[1].url, "https://news.example.com/2025/second");
        assert!(items[1].published_at.is_none());
    }

    #[test]
    fn test_parse_rss_cdata_link() {
        let xml = r#"<rss><channel><item>
            <link><![CDATA[https://news.example.com/cdata]]></link>
        </item></channel></rss>"#;
        let items = parse_rss(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://news.example.com/cdata");
    }

    #[test]
    fn test_parse_rss_unescapes_entities_in_link() {
        let xml = r#"<rss><channel><item>
            <link>https://news.example.com/story?id=7&amp;ref=rss</link>
        </item></channel></rss>"#;
        let items = parse_rss(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://news.example.com/story?id=7&ref=rss");
    }

    #[test]
    fn test_parse_rss_bad_pubdate_degrades_to_none() {
        let xml = r#"<rss><channel><item>
            <link>https://news.example.com/x</link>
            <pubDate>sometime last week</pubDate>
        </item></channel></rss>"#;
        let items = parse_rss(xml).unwrap();
        assert!(items[0].published_at.is_none());
    }

    #[test]
    fn test_parse_rss_empty_channel() {
        let items = parse_rss("<rss><channel></channel></rss>").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_looks_like_xml() {
        assert!(looks_like_xml("application/rss+xml; charset=utf-8"));
        assert!(looks_like_xml("text/xml"));
        assert!(looks_like_xml(""));
        assert!(!looks_like_xml("text/html; charset=utf-8"));
    }

    #[test]
    fn test_join_path() {
        assert_eq!(
            join_path("https://news.example.com", "/feed"),
            "https://news.example.com/feed"
        );
        assert_eq!(
            join_path("https://news.example.com/sub/", "/feed"),
            "https://news.example.com/feed"
        );
    }
}
