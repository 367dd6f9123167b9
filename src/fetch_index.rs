//! Persistent fetch-state index: URL → last-seen caching headers and status.
//!
//! Backed by `index.json` in the storage directory, shaped as
//! `{"heads": {"<url>": {"etag"?, "lastModified"?, "lastSeenAt", "lastStatus"}}}`.
//! The index enables conditional refetching (`If-None-Match` /
//! `If-Modified-Since`) and holds the most recent observation only, never a
//! history. A corrupt file degrades to an empty index: the worst case is a
//! redundant refetch, not a crash.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Last-seen caching state for one URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchHead {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(rename = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(rename = "lastSeenAt")]
    pub last_seen_at: String,
    #[serde(rename = "lastStatus")]
    pub last_status: u16,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    heads: HashMap<String, FetchHead>,
}

/// Handle on the on-disk index file.
#[derive(Debug, Clone)]
pub struct FetchIndex {
    path: PathBuf,
}

impl FetchIndex {
    pub fn new(storage_dir: &str) -> Self {
        FetchIndex {
            path: Path::new(storage_dir).join("index.json"),
        }
    }

    /// Read the full map. A missing file is an empty index, not an error;
    /// a corrupt file is warned about and also reads as empty. Unexpected
    /// I/O errors propagate.
    pub fn read(&self) -> Result<HashMap<String, FetchHead>, std::io::Error> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e),
        };
        match serde_json::from_str::<IndexFile>(&raw) {
            Ok(file) => Ok(file.heads),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt fetch-state index; starting empty");
                Ok(HashMap::new())
            }
        }
    }

    /// Atomically persist the full map: write a temp file next to the
    /// target, then rename over it, so a crash never truncates the index.
    pub fn write(&self, heads: &HashMap<String, FetchHead>) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = IndexFile {
            heads: heads.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read-modify-write merge of a single entry. `lastSeenAt` and
    /// `lastStatus` always take the new values; a `None` etag or
    /// last-modified keeps whatever the previous observation recorded
    /// (a 304 rarely repeats validators).
    pub fn upsert(&self, url: &str, head: FetchHead) -> Result<(), std::io::Error> {
        let mut heads = self.read()?;
        let merged = match heads.remove(url) {
            Some(prev) => FetchHead {
                etag: head.etag.or(prev.etag),
                last_modified: head.last_modified.or(prev.last_modified),
                last_seen_at: head.last_seen_at,
                last_status: head.last_status,
            },
            None => head,
        };
        heads.insert(url.to_string(), merged);
        self.write(&heads)
    }
}
