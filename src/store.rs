//! Append-only JSONL persistence.
//!
//! Two access patterns over newline-delimited JSON files:
//!
//! - **append-if-new**: only records whose caller-derived key is unseen get
//!   appended, which makes a full ingestion run idempotent with respect to
//!   unchanged content.
//! - **upsert-by-match**: the latest record per key wins and the whole file
//!   is rewritten; a merge callback can inspect the record being replaced
//!   (used to stamp `changed_from`/`prev_hash` lineage on hash changes).
//!
//! Files and parent directories are created on demand; a missing file reads
//! as empty. Unreadable lines are skipped with a warning so an interrupted
//! append cannot poison the whole file. Whole-file rewrites go through a
//! temp file plus rename, matching how the fetch-state index is persisted.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::hash::Hash;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Counts returned by [`append_if_new`].
#[derive(Debug, Default, PartialEq)]
pub struct AppendStats {
    pub added: usize,
    pub skipped: usize,
}

/// Counts returned by [`upsert_by_match`].
#[derive(Debug, Default, PartialEq)]
pub struct UpsertStats {
    pub replaced: usize,
    pub appended: usize,
}

/// Read every parseable record from a JSONL file. Missing file reads empty.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, Box<dyn Error>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut records = Vec::new();
    for (number, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(path = %path.display(), line = number + 1, error = %e, "Skipping unreadable JSONL line");
            }
        }
    }
    Ok(records)
}

/// Append only records whose key is not already present in the file.
///
/// The key function defines record identity (e.g. `(url, hash)` for
/// articles); duplicate keys within `records` are also collapsed, first one
/// wins.
pub fn append_if_new<T, K>(
    path: &Path,
    records: &[T],
    key_fn: impl Fn(&T) -> K,
) -> Result<AppendStats, Box<dyn Error>>
where
    T: Serialize + DeserializeOwned,
    K: Eq + Hash,
{
    let existing: Vec<T> = read_records(path)?;
    let mut seen: HashSet<K> = existing.iter().map(&key_fn).collect();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let mut stats = AppendStats::default();
    for record in records {
        if seen.insert(key_fn(record)) {
            let line = serde_json::to_string(record)?;
            writeln!(file, "{line}")?;
            stats.added += 1;
        } else {
            stats.skipped += 1;
        }
    }
    Ok(stats)
}

/// Replace the latest record matching each incoming record's key, or append.
///
/// `merge` receives the previous record and the incoming one and produces
/// what actually gets stored; the identity merge is `|_, next| next`. The
/// key map over existing records is built once per call, so the cost is one
/// pass over the file plus one over the incoming batch.
pub fn upsert_by_match<T, K>(
    path: &Path,
    records: Vec<T>,
    key_fn: impl Fn(&T) -> K,
    merge: impl Fn(&T, T) -> T,
) -> Result<UpsertStats, Box<dyn Error>>
where
    T: Serialize + DeserializeOwned,
    K: Eq + Hash,
{
    let mut existing: Vec<T> = read_records(path)?;
    let mut by_key: HashMap<K, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, record)| (key_fn(record), i))
        .collect();

    let mut stats = UpsertStats::default();
    for record in records {
        match by_key.get(&key_fn(&record)) {
            Some(&position) => {
                existing[position] = merge(&existing[position], record);
                stats.replaced += 1;
            }
            None => {
                by_key.insert(key_fn(&record), existing.len());
                existing.push(record);
                stats.appended += 1;
            }
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = String::new();
    for record in &existing {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    let tmp = path.with_extension("jsonl.tmp");
    std::fs::write(&tmp, out)?;
    std::fs::rename(&tmp, path)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleRecord;
    use tempfile::TempDir;

    fn record(url: &str, hash: &str) -> ArticleRecord {
        ArticleRecord {
            url: url.to_string(),
            hash: hash.to_string(),
            published_at: None,
            title: Some("T".to_string()),
            author: None,
            category: None,
            body_text: Some("body".to_string()),
            excerpt: None,
            image: None,
            source: None,
            fetched_at: "2025-05-06T15:00:00Z".to_string(),
            changed_from: None,
            prev_hash: None,
        }
    }

    fn key(r: &ArticleRecord) -> (String, String) {
        (r.url.clone(), r.hash.clone())
    }

    #[test]
    fn test_append_if_new_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("articles.jsonl");
        let records = vec![record("https://e.com/a", "h1")];

        let first = append_if_new(&path, &records, key).unwrap();
        assert_eq!(first, AppendStats { added: 1, skipped: 0 });

        let second = append_if_new(&path, &records, key).unwrap();
        assert_eq!(second, AppendStats { added: 0, skipped: 1 });

        let all: Vec<ArticleRecord> = read_records(&path).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_append_same_url_new_hash_is_new_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("articles.jsonl");
        append_if_new(&path, &[record("https://e.com/a", "h1")], key).unwrap();
        let stats = append_if_new(&path, &[record("https://e.com/a", "h2")], key).unwrap();
        assert_eq!(stats.added, 1);

        let all: Vec<ArticleRecord> = read_records(&path).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_upsert_stamps_lineage_on_hash_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("articles.jsonl");

        upsert_by_match(
            &path,
            vec![record("https://e.com/a", "h1")],
            |r| r.url.clone(),
            |_, next| next,
        )
        .unwrap();

        let stats = upsert_by_match(
            &path,
            vec![record("https://e.com/a", "h2")],
            |r| r.url.clone(),
            |prev, mut next| {
                if prev.hash != next.hash {
                    next.changed_from = Some(prev.url.clone());
                    next.prev_hash = Some(prev.hash.clone());
                }
                next
            },
        )
        .unwrap();
        assert_eq!(stats, UpsertStats { replaced: 1, appended: 0 });

        let all: Vec<ArticleRecord> = read_records(&path).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].hash, "h2");
        assert_eq!(all[0].prev_hash.as_deref(), Some("h1"));
        assert_eq!(all[0].changed_from.as_deref(), Some("https://e.com/a"));
    }

    #[test]
    fn test_upsert_appends_unmatched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("articles.jsonl");
        let stats = upsert_by_match(
            &path,
            vec![record("https://e.com/a", "h1"), record("https://e.com/b", "h1")],
            |r| r.url.clone(),
            |_, next| next,
        )
        .unwrap();
        assert_eq!(stats, UpsertStats { replaced: 0, appended: 2 });
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.jsonl");
        let all: Vec<ArticleRecord> = read_records(&path).unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn test_unreadable_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("articles.jsonl");
        append_if_new(&path, &[record("https://e.com/a", "h1")], key).unwrap();
        // Simulate a torn write.
        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str("{\"url\": \"https://e.com/torn\", \"ha");
        std::fs::write(&path, raw).unwrap();

        let all: Vec<ArticleRecord> = read_records(&path).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].url, "https://e.com/a");
    }

    #[test]
    fn test_creates_parent_dirs_on_demand() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts").join("rage_prompts.jsonl");
        let stats = append_if_new(&path, &[record("https://e.com/a", "h1")], key).unwrap();
        assert_eq!(stats.added, 1);
        assert!(path.exists());
    }
}
