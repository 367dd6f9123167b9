//! Article extraction from arbitrary HTML.
//!
//! Every field is pulled through a prioritized cascade of selectors (first
//! non-empty match wins), so the extractor copes with whatever markup a
//! source happens to publish:
//!
//! - title: `og:title` meta, first `<h1>`, `<title>`
//! - author: `meta[name=author]`, `[rel=author]`, common byline classes
//! - date: `article:published_time` meta, first `time[datetime]`, JSON-LD
//!   `datePublished` (object or array top level)
//! - category: category link classes, `rel="category tag"`, second breadcrumb
//! - image: `og:image`, `twitter:image`, first image in a content container,
//!   first image anywhere
//! - body root: `article`, `main`, `[class*=content]`, `[class*=post]`,
//!   `.entry-content`, `<body>`
//!
//! Boilerplate (share widgets, related-content blocks, nav, scripts, figures,
//! ARIA complementary regions) is detached from the chosen body root before
//! text extraction. An empty body or malformed URL yields `None` — callers
//! treat that as "skip this URL", never as an error.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::models::ParsedArticle;
use crate::utils::{collapse_ws, excerpt, parse_date_loose};

static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

static META_AUTHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="author"]"#).unwrap());
static REL_AUTHOR: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"[rel="author"]"#).unwrap());
static BYLINE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".byline, .author, .post-author, .article-author").unwrap());

static META_PUBLISHED: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="article:published_time"]"#).unwrap());
static TIME_DATETIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

static CATEGORY_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[class*="category"], [rel="category tag"]"#).unwrap());
static BREADCRUMB: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".breadcrumb a, .breadcrumbs a").unwrap());

static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).unwrap());
static TWITTER_IMAGE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[name="twitter:image"], meta[property="twitter:image"]"#).unwrap()
});
static CONTENT_IMG: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"article img, main img, [class*="content"] img"#).unwrap());
static ANY_IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

static BODY_ROOTS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article",
        "main",
        r#"[class*="content"]"#,
        r#"[class*="post"]"#,
        ".entry-content",
        "body",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

static BOILERPLATE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(concat!(
        r#"[class*="share"], [class*="social"], [class*="related"], "#,
        r#"nav, aside, script, style, iframe, figure, figcaption, [role="complementary"]"#
    ))
    .unwrap()
});

/// Extract a structured article from raw HTML.
///
/// Returns `None` when the URL is malformed or no body text survives
/// boilerplate removal; callers skip such URLs rather than treating them as
/// failures of the run.
pub fn parse_article(url: &str, html: &str) -> Option<ParsedArticle> {
    if Url::parse(url).is_err() {
        debug!(%url, "Malformed article URL; skipping");
        return None;
    }

    let mut document = Html::parse_document(html);

    // Metadata comes out before boilerplate removal mutates the tree
    // (JSON-LD lives in <script> blocks the removal pass deletes).
    let title = meta_content(&document, &OG_TITLE)
        .or_else(|| first_text(&document, &H1))
        .or_else(|| first_text(&document, &TITLE));
    let author = meta_content(&document, &META_AUTHOR)
        .or_else(|| first_text(&document, &REL_AUTHOR))
        .or_else(|| first_text(&document, &BYLINE));
    let published_raw = meta_content(&document, &META_PUBLISHED)
        .or_else(|| first_attr(&document, &TIME_DATETIME, "datetime"))
        .or_else(|| json_ld_date_published(&document));
    let category = first_text(&document, &CATEGORY_LINK).or_else(|| second_breadcrumb(&document));
    let image = meta_content(&document, &OG_IMAGE)
        .or_else(|| meta_content(&document, &TWITTER_IMAGE))
        .or_else(|| first_attr(&document, &CONTENT_IMG, "src"))
        .or_else(|| first_attr(&document, &ANY_IMG, "src"));

    let root_id = BODY_ROOTS
        .iter()
        .find_map(|sel| document.select(sel).next().map(|el| el.id()))?;

    // Detach boilerplate inside the chosen root, then re-wrap for text.
    let doomed: Vec<_> = {
        let root = ElementRef::wrap(document.tree.get(root_id)?)?;
        root.select(&BOILERPLATE).map(|el| el.id()).collect()
    };
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    let root = ElementRef::wrap(document.tree.get(root_id)?)?;
    let body_text = collapse_ws(&root.text().collect::<Vec<_>>().join(" "));
    if body_text.is_empty() {
        debug!(%url, "No body text after extraction; skipping");
        return None;
    }

    let excerpt = excerpt(&body_text);
    Some(ParsedArticle {
        url: url.to_string(),
        title,
        author,
        published_at: published_raw.as_deref().and_then(parse_date_loose),
        category,
        image,
        body_text,
        excerpt,
    })
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .find_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(|el| collapse_ws(&el.text().collect::<Vec<_>>().join(" ")))
        .find(|s| !s.is_empty())
}

fn first_attr(document: &Html, selector: &Selector, attr: &str) -> Option<String> {
    document
        .select(selector)
        .find_map(|el| el.value().attr(attr))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn second_breadcrumb(document: &Html) -> Option<String> {
    document
        .select(&BREADCRUMB)
        .nth(1)
        .map(|el| collapse_ws(&el.text().collect::<Vec<_>>().join(" ")))
        .filter(|s| !s.is_empty())
}

/// Scan every JSON-LD block for a `datePublished`, tolerating both a single
/// object and an array of objects at the top level.
fn json_ld_date_published(document: &Html) -> Option<String> {
    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            continue;
        };
        let objects: Vec<&serde_json::Value> = match &value {
            serde_json::Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for object in objects {
            if let Some(date) = object.get("datePublished").and_then(|d| d.as_str()) {
                return Some(date.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::sha256_hex;

    const ARTICLE: &str = r#"<!doctype html>
<html><head>
  <title>Fallback Title | Site</title>
  <meta property="og:title" content="Quake Shakes Coastal Town">
  <meta name="author" content="Jane Reporter">
  <meta property="article:published_time" content="2025-05-06T14:30:00Z">
  <meta property="og:image" content="https://img.example.com/hero.jpg">
</head><body>
  <nav><a href="/">Home</a><a href="/world">World</a></nav>
  <article>
    <h1>Quake Shakes Coastal Town</h1>
    <div class="share-buttons">Share on X Share on Facebook</div>
    <p>A strong earthquake struck the coast early Tuesday, residents said.</p>
    <p>Officials reported no casualties but warned of aftershocks.</p>
    <div class="related-stories"><a href="/other">You may also like this</a></div>
    <aside>Subscribe to our newsletter</aside>
  </article>
</body></html>"#;

    #[test]
    fn test_full_extraction() {
        let parsed = parse_article("https://news.example.com/quake", ARTICLE).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Quake Shakes Coastal Town"));
        assert_eq!(parsed.author.as_deref(), Some("Jane Reporter"));
        assert!(parsed.published_at.is_some());
        assert_eq!(
            parsed.image.as_deref(),
            Some("https://img.example.com/hero.jpg")
        );
        assert!(parsed.body_text.contains("strong earthquake"));
    }

    #[test]
    fn test_boilerplate_removed_from_body() {
        let parsed = parse_article("https://news.example.com/quake", ARTICLE).unwrap();
        assert!(!parsed.body_text.contains("Share on X"));
        assert!(!parsed.body_text.contains("You may also like"));
        assert!(!parsed.body_text.contains("Subscribe to our newsletter"));
        assert!(!parsed.body_text.contains("Home"));
    }

    #[test]
    fn test_title_cascade_falls_back_to_h1_then_title() {
        let html = "<html><head><title>Doc Title</title></head><body><article><h1>Heading</h1><p>x</p></article></body></html>";
        let parsed = parse_article("https://e.com/a", html).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Heading"));

        let html = "<html><head><title>Doc Title</title></head><body><article><p>x</p></article></body></html>";
        let parsed = parse_article("https://e.com/a", html).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Doc Title"));
    }

    #[test]
    fn test_json_ld_date_object_and_array() {
        let object = r#"<html><body><article>
            <script type="application/ld+json">{"@type":"NewsArticle","datePublished":"2025-04-01T09:00:00Z"}</script>
            <p>body</p></article></body></html>"#;
        let parsed = parse_article("https://e.com/a", object).unwrap();
        assert!(parsed.published_at.is_some());

        let array = r#"<html><body><article>
            <script type="application/ld+json">[{"@type":"Thing"},{"@type":"NewsArticle","datePublished":"2025-04-01T09:00:00Z"}]</script>
            <p>body</p></article></body></html>"#;
        let parsed = parse_article("https://e.com/a", array).unwrap();
        assert!(parsed.published_at.is_some());
    }

    #[test]
    fn test_category_from_second_breadcrumb() {
        let html = r#"<html><body>
            <ul class="breadcrumbs"><li><a href="/">Home</a></li><li><a href="/politics">Politics</a></li></ul>
            <article><p>body</p></article></body></html>"#;
        let parsed = parse_article("https://e.com/a", html).unwrap();
        assert_eq!(parsed.category.as_deref(), Some("Politics"));
    }

    #[test]
    fn test_empty_body_returns_none() {
        let html = "<html><body><article><nav>only nav here</nav></article></body></html>";
        assert!(parse_article("https://e.com/a", html).is_none());
    }

    #[test]
    fn test_malformed_url_returns_none() {
        assert!(parse_article("not a url", ARTICLE).is_none());
    }

    #[test]
    fn test_same_normalized_text_same_hash_across_markup() {
        let one = "<html><body><article><p>Alpha   beta\n gamma.</p></article></body></html>";
        let two = "<html><body><main><div>Alpha beta gamma.</div></main></body></html>";
        let a = parse_article("https://e.com/1", one).unwrap();
        let b = parse_article("https://e.com/2", two).unwrap();
        assert_eq!(a.body_text, b.body_text);
        assert_eq!(sha256_hex(&a.body_text), sha256_hex(&b.body_text));
    }
}
