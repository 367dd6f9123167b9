//! Derived summary/chunk records for downstream consumption.
//!
//! One parsed article yields a short summary, a handful of bullet
//! highlights, and the body split into fixed-size chunks. Every chunk
//! becomes one [`PromptRecord`] carrying the same summary and bullets, with
//! `chunk_index` contiguous from 0 so a consumer can reassemble the body.

use chrono::Utc;

use crate::models::{ParsedArticle, PromptRecord};

/// Word budget for the summary.
const SUMMARY_MAX_WORDS: usize = 60;
/// Bullet highlights kept per article.
const MAX_BULLETS: usize = 5;
/// Chunk size budget in characters; chunks break on word boundaries so the
/// actual size can run slightly under.
const CHUNK_CHARS: usize = 1200;

/// Build every prompt record for one article.
pub fn build_prompt_records(
    article: &ParsedArticle,
    hash: &str,
    source: Option<&str>,
) -> Vec<PromptRecord> {
    let sentences = split_sentences(&article.body_text);
    let summary = summarize(&sentences);
    let bullets = highlight_bullets(&sentences);
    let title = article
        .title
        .clone()
        .unwrap_or_else(|| article.url.clone());
    let created_at = Utc::now().to_rfc3339();

    chunk_text(&article.body_text, CHUNK_CHARS)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, chunk_text)| PromptRecord {
            url: article.url.clone(),
            hash: hash.to_string(),
            title: title.clone(),
            summary: summary.clone(),
            bullets: bullets.clone(),
            chunk_index,
            chunk_text,
            image: article.image.clone(),
            source: source.map(|s| s.to_string()),
            created_at: created_at.clone(),
        })
        .collect()
}

/// Leading sentences of the body, stopping once the word budget is spent.
fn summarize(sentences: &[String]) -> String {
    let mut words = 0usize;
    let mut out: Vec<&str> = Vec::new();
    for sentence in sentences {
        if words >= SUMMARY_MAX_WORDS && !out.is_empty() {
            break;
        }
        words += sentence.split_whitespace().count();
        out.push(sentence);
    }
    out.join(" ")
}

/// Up to [`MAX_BULLETS`] sentence highlights following the lede.
fn highlight_bullets(sentences: &[String]) -> Vec<String> {
    sentences
        .iter()
        .take(MAX_BULLETS)
        .map(|s| s.to_string())
        .collect()
}

/// Split body text into sentences on terminal punctuation. Deliberately
/// simple: abbreviations over-split, which is harmless for highlights.
fn split_sentences(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split text into chunks of at most `max_chars`, breaking on word
/// boundaries. A single token longer than `max_chars` (a base64 blob, a long
/// URL) is hard-split on char boundaries so the bound holds regardless of
/// input. Indexes are implicit in order; the result is never empty for
/// non-empty input.
fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if word.len() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let mut rest = word;
            while rest.len() > max_chars {
                let mut cut = max_chars;
                while !rest.is_char_boundary(cut) {
                    cut -= 1;
                }
                chunks.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
            current.push_str(rest);
            continue;
        }
        if !current.is_empty() && current.len() + 1 + word.len() > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(body: &str) -> ParsedArticle {
        ParsedArticle {
            url: "https://e.com/a".to_string(),
            title: Some("Title".to_string()),
            author: None,
            published_at: None,
            category: None,
            image: None,
            body_text: body.to_string(),
            excerpt: String::new(),
        }
    }

    #[test]
    fn test_chunk_indexes_contiguous_from_zero() {
        let body = "word ".repeat(2000);
        let records = build_prompt_records(&article(&body), "hash", Some("src"));
        assert!(records.len() > 1);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.chunk_index, i);
        }
    }

    #[test]
    fn test_chunks_respect_size_budget() {
        let body = "word ".repeat(2000);
        for chunk in chunk_text(&body, CHUNK_CHARS) {
            assert!(chunk.len() <= CHUNK_CHARS);
        }
    }

    #[test]
    fn test_oversized_token_hard_split() {
        let blob = "a".repeat(3000);
        let chunks = chunk_text(&blob, CHUNK_CHARS);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= CHUNK_CHARS, "chunk of {} chars", chunk.len());
        }
        assert_eq!(chunks.concat(), blob);

        // Hard splits land on char boundaries for multi-byte text.
        let wide = "\u{00e9}".repeat(1000);
        for chunk in chunk_text(&wide, CHUNK_CHARS) {
            assert!(chunk.len() <= CHUNK_CHARS);
            assert!(chunk.chars().all(|c| c == '\u{00e9}'));
        }
    }

    #[test]
    fn test_short_body_single_chunk() {
        let records = build_prompt_records(&article("One short sentence."), "hash", None);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chunk_index, 0);
        assert_eq!(records[0].chunk_text, "One short sentence.");
    }

    #[test]
    fn test_summary_stops_at_word_budget() {
        let body = "This sentence has exactly six words. ".repeat(30);
        let records = build_prompt_records(&article(&body), "hash", None);
        let words = records[0].summary.split_whitespace().count();
        assert!(words >= SUMMARY_MAX_WORDS);
        assert!(words < SUMMARY_MAX_WORDS + 10);
    }

    #[test]
    fn test_bullets_capped() {
        let body = "One. Two. Three. Four. Five. Six. Seven.";
        let records = build_prompt_records(&article(body), "hash", None);
        assert_eq!(records[0].bullets.len(), MAX_BULLETS);
        assert_eq!(records[0].bullets[0], "One.");
    }

    #[test]
    fn test_title_falls_back_to_url() {
        let mut a = article("Body text.");
        a.title = None;
        let records = build_prompt_records(&a, "hash", None);
        assert_eq!(records[0].title, "https://e.com/a");
    }

    #[test]
    fn test_split_sentences() {
        let s = split_sentences("First. Second! Third? Fourth");
        assert_eq!(s, vec!["First.", "Second!", "Third?", "Fourth"]);
    }
}
