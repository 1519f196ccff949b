use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::domain::models::{ProgressKey, ReadingProgressRecord, cache_key};
use crate::error::Result;

/// Synchronous client-local key/value store.
pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> Result<()>;
}

/// Volatile cache, mostly useful for tests and for hosts without a writable disk.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Cache persisted as a single JSON object on disk; survives restarts.
///
/// Every `set` rewrites the file through a temporary sibling and a rename, so a crash
/// mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileCache {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                match serde_json::from_str(&raw) {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "discarding unreadable cache file");
                        BTreeMap::new()
                    }
                }
            }
        } else {
            BTreeMap::new()
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened file cache");
        Ok(FileCache {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let body = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }
}

/// Typed view over a [`LocalCache`] storing one JSON record per progress key.
#[derive(Clone, Copy)]
pub struct ProgressCache<'a> {
    cache: &'a dyn LocalCache,
}

impl<'a> ProgressCache<'a> {
    pub fn new(cache: &'a dyn LocalCache) -> Self {
        Self { cache }
    }

    /// A record that no longer decodes, or that belongs to another (work, chapter) pair
    /// sharing the same cache key, is treated as absent.
    pub fn load(&self, key: &ProgressKey) -> Option<ReadingProgressRecord> {
        let raw = self.cache.get(&key.cache_key())?;
        match serde_json::from_str::<ReadingProgressRecord>(&raw) {
            Ok(record)
                if record.work_key != key.work_key() || record.chapter_key != key.chapter_key() =>
            {
                tracing::warn!(%key, stored_work = %record.work_key, stored_chapter = %record.chapter_key, "ignoring cached progress of another chapter");
                None
            }
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(%key, error = %e, "ignoring malformed cached progress");
                None
            }
        }
    }

    pub fn save(&self, record: &ReadingProgressRecord) -> Result<()> {
        let key = cache_key(&record.work_key, &record.chapter_key);
        let body = serde_json::to_string(record)?;
        self.cache.set(&key, body)
    }
}
