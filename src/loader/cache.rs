//! Category cache: in-memory entries mirrored to one persisted JSON blob.
//!
//! # Storage format
//!
//! The whole cache lives under a single key ([`STORAGE_KEY`]) as a JSON
//! object mapping category index to entry:
//!
//! ```json
//! { "0": { "data": { "categoryIndex": 0, ... }, "timestamp": 1718000000000 } }
//! ```
//!
//! Every successful load rewrites the blob with all entries loaded so far.
//! There is no per-entry eviction; expiry is purely time based and is
//! checked lazily on read, or explicitly through [`sweep_expired`].
//!
//! # Failure policy
//!
//! Storage is best effort. A missing, unreadable or corrupt blob yields an
//! empty cache, and individual malformed entries are skipped. Callers log
//! [`CacheError`]s and carry on; they never fail a page operation.

use crate::types::CategoryData;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Fixed storage key for the persisted blob.
pub const STORAGE_KEY: &str = "astro-nav-category-cache";

/// Default entry lifetime: 30 minutes.
pub const DEFAULT_EXPIRY_MS: u64 = 30 * 60 * 1000;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache storage I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("cache blob is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Arc<CategoryData>,
    /// Epoch milliseconds when the entry was stored.
    pub timestamp: u64,
}

/// Cache entries keyed by category index. Ordered so blobs are stable.
pub type CacheEntries = BTreeMap<u32, CacheEntry>;

/// An entry is fresh while strictly younger than `ttl_ms`.
pub fn is_fresh(entry: &CacheEntry, now_ms: u64, ttl_ms: u64) -> bool {
    now_ms.saturating_sub(entry.timestamp) < ttl_ms
}

/// Drop every entry that is no longer fresh.
pub fn sweep_expired(entries: CacheEntries, now_ms: u64, ttl_ms: u64) -> CacheEntries {
    entries
        .into_iter()
        .filter(|(_, entry)| is_fresh(entry, now_ms, ttl_ms))
        .collect()
}

/// Parse a persisted blob, skipping entries that don't decode.
pub fn decode_blob(blob: &str) -> Result<CacheEntries, CacheError> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(blob)?;
    let mut entries = CacheEntries::new();
    for (key, value) in raw {
        let Ok(index) = key.parse::<u32>() else {
            tracing::debug!(key = %key, "skipping cache entry with non-numeric key");
            continue;
        };
        match serde_json::from_value::<CacheEntry>(value) {
            Ok(entry) => {
                entries.insert(index, entry);
            }
            Err(e) => tracing::debug!(index, error = %e, "skipping malformed cache entry"),
        }
    }
    Ok(entries)
}

pub fn encode_blob(entries: &CacheEntries) -> Result<String, CacheError> {
    Ok(serde_json::to_string(entries)?)
}

/// Where the persisted blob lives.
///
/// Implementations must be cheap to call; the loader writes after every
/// successful load.
pub trait CacheStore: Send + Sync {
    /// The stored blob, or `None` if nothing was stored yet.
    fn read(&self) -> Result<Option<String>, CacheError>;
    fn write(&self, blob: &str) -> Result<(), CacheError>;
    fn clear(&self) -> Result<(), CacheError>;
}

/// Blob stored as `<dir>/astro-nav-category-cache.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for FileStore {
    fn read(&self) -> Result<Option<String>, CacheError> {
        match std::fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, blob: &str) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, blob)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store, handy for tests and for sharing a cache between
/// loader instances.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(blob.into())),
        }
    }

    pub fn blob(&self) -> Option<String> {
        self.slot.lock().clone()
    }
}

impl CacheStore for MemoryStore {
    fn read(&self) -> Result<Option<String>, CacheError> {
        Ok(self.slot.lock().clone())
    }

    fn write(&self, blob: &str) -> Result<(), CacheError> {
        *self.slot.lock() = Some(blob.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn read(&self) -> Result<Option<String>, CacheError> {
        (**self).read()
    }

    fn write(&self, blob: &str) -> Result<(), CacheError> {
        (**self).write(blob)
    }

    fn clear(&self) -> Result<(), CacheError> {
        (**self).clear()
    }
}

/// Store that persists nothing (cache persistence disabled).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl CacheStore for NullStore {
    fn read(&self) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    fn write(&self, _blob: &str) -> Result<(), CacheError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Snapshot of loader cache usage.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub cached_categories: usize,
    pub loading: usize,
    pub failed: usize,
    /// Serialized size of the cached data in bytes.
    pub cache_size: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cached ({})",
            self.cached_categories,
            crate::format::format_file_size(self.cache_size as u64)
        )?;
        if self.loading > 0 {
            write!(f, ", {} loading", self.loading)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}
