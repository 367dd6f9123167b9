//! XML sitemap discovery with bounded recursion.
//!
//! A configured sitemap path can point at either a direct URL set
//! (`<urlset>`) or a sitemap index (`<sitemapindex>`) whose entries are
//! themselves sitemaps. Indexes resolve recursively, but pathological inputs
//! are bounded: nesting stops at depth 3 and only the first 5 children of a
//! nested index are followed.
//!
//! For a source with several configured paths, the first path that yields
//! usable URLs wins and later paths are not attempted (documented behavior:
//! first success, not the union of all paths).

use std::error::Error;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{info, instrument, warn};
use url::Url;

use crate::client::{FetchOptions, PoliteClient};
use crate::models::Candidate;
use crate::sources::MediaSource;

/// Maximum index-nesting depth followed, counting the starting document as 1.
pub const MAX_DEPTH: usize = 3;
/// Maximum children followed per nested sitemap index.
pub const MAX_CHILDREN: usize = 5;

/// The two sitemap document shapes, plus everything else.
#[derive(Debug, PartialEq)]
pub enum SitemapDoc {
    /// `<sitemapindex>`: each loc is itself a sitemap.
    Index(Vec<String>),
    /// `<urlset>`: each loc is a content URL.
    UrlSet(Vec<String>),
    /// XML, but neither shape (e.g. an RSS feed configured on the same source).
    Other,
}

/// Parse one sitemap XML document, collecting `<loc>` values under whichever
/// root shape the document declares.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDoc, Box<dyn Error>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut is_index = false;
    let mut is_urlset = false;
    let mut in_loc = false;
    let mut locs = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = true,
                b"urlset" => is_urlset = true,
                b"loc" => in_loc = true,
                _ => {}
            },
            Event::End(e) => {
                if e.local_name().as_ref() == b"loc" {
                    in_loc = false;
                }
            }
            Event::Text(t) => {
                if in_loc {
                    if let Some(text) = super::text_content(&t) {
                        if !text.is_empty() {
                            locs.push(text);
                        }
                    }
                }
            }
            Event::CData(t) => {
                if in_loc {
                    let text = super::cdata_content(t);
                    if !text.is_empty() {
                        locs.push(text);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if is_index {
        Ok(SitemapDoc::Index(locs))
    } else if is_urlset {
        Ok(SitemapDoc::UrlSet(locs))
    } else {
        Ok(SitemapDoc::Other)
    }
}

/// Resolve a sitemap URL into content URLs through a caller-supplied fetch,
/// honoring the depth and fan-out bounds.
///
/// `fetch` returns the XML body for a sitemap URL, or `None` when the fetch
/// failed or returned something unusable; such entries are skipped.
pub(crate) async fn resolve_with<F, Fut>(start_url: String, fetch: F) -> Vec<String>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = Option<String>>,
{
    let mut urls = Vec::new();
    let mut queue = vec![(start_url, 1usize)];

    while let Some((sitemap_url, depth)) = queue.pop() {
        let Some(xml) = fetch(sitemap_url.clone()).await else {
            continue;
        };
        match parse_sitemap(&xml) {
            Ok(SitemapDoc::Index(children)) => {
                if depth >= MAX_DEPTH {
                    warn!(url = %sitemap_url, depth, "Sitemap index past depth bound; not recursing");
                    continue;
                }
                for child in children.into_iter().take(MAX_CHILDREN) {
                    queue.push((child, depth + 1));
                }
            }
            Ok(SitemapDoc::UrlSet(entries)) => urls.extend(entries),
            Ok(SitemapDoc::Other) => {
                warn!(url = %sitemap_url, "Document is neither sitemap index nor urlset; skipping");
            }
            Err(e) => {
                warn!(url = %sitemap_url, error = %e, "Sitemap parse failed; skipping");
            }
        }
    }
    urls
}

/// Discover candidates from every source's configured sitemap paths.
///
/// Candidates are tagged with their source id directly; sitemaps carry no
/// publication dates, so `published_at` is always `None` here.
#[instrument(level = "info", skip_all)]
pub async fn discover_from_sitemaps(
    client: &PoliteClient,
    sources: &[MediaSource],
) -> Vec<Candidate> {
    let opts = FetchOptions {
        no_robots: true,
        no_cache: true,
    };

    let fetch = |url: String| async move {
        match client.fetch_text(&url, opts).await {
            Ok(fetched) if fetched.status < 400 => {
                if fetched.content_type.is_empty() || fetched.content_type.contains("xml") {
                    Some(fetched.text)
                } else {
                    warn!(%url, content_type = %fetched.content_type, "Sitemap is not XML; skipping");
                    None
                }
            }
            Ok(fetched) => {
                warn!(%url, status = fetched.status, "Sitemap returned error status; skipping");
                None
            }
            Err(e) => {
                warn!(%url, error = %e, "Sitemap fetch failed; skipping");
                None
            }
        }
    };

    let mut candidates = Vec::new();
    for source in sources {
        for path in source.paths() {
            let lower = path.to_lowercase();
            if lower.contains("feed") || lower.contains("rss") {
                continue;
            }
            let sitemap_url = match Url::parse(&source.base_url).and_then(|b| b.join(&path)) {
                Ok(u) => u.to_string(),
                Err(e) => {
                    warn!(source = %source.id, %path, error = %e, "Unresolvable sitemap path; skipping");
                    continue;
                }
            };

            let urls = resolve_with(sitemap_url, &fetch).await;
            if urls.is_empty() {
                warn!(source = %source.id, %path, "Sitemap path yielded nothing usable; trying next path");
                continue;
            }

            info!(source = %source.id, %path, count = urls.len(), "Indexed sitemap URLs");
            candidates.extend(urls.into_iter().map(|url| Candidate {
                url,
                published_at: None,
                source: Some(source.id.clone()),
            }));
            // First path that yields usable sitemaps wins for this source.
            break;
        }
    }
    candidates
}
