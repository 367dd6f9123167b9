//! Candidate URL discovery.
//!
//! Discovery turns configured media sources into candidate URLs for the
//! ingestion loop, via two shapes of index document:
//!
//! | Shape | Module | Notes |
//! |-------|--------|-------|
//! | RSS 2.0 feed | [`feeds`] | carries `pubDate`, always fetched fresh |
//! | XML sitemap / sitemap index | [`sitemaps`] | recursive with depth and fan-out bounds |
//!
//! Both modules parse XML with a streaming `quick-xml` reader, never a DOM,
//! and both isolate per-source failures: one unreachable or malformed source
//! never aborts discovery for the rest.

pub mod feeds;
pub mod sitemaps;

use quick_xml::events::{BytesCData, BytesText};

/// Decode a text node, tolerating both escaped text and CDATA.
/// `xml_content` both decodes and resolves entity references, so an
/// `&amp;` inside a feed link comes out as a plain `&`.
pub(crate) fn text_content(t: &BytesText) -> Option<String> {
    t.xml_content().ok().map(|cow| cow.trim().to_string())
}

pub(crate) fn cdata_content(t: BytesCData) -> String {
    String::from_utf8_lossy(&t.into_inner()).trim().to_string()
}
