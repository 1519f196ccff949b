// In-process implementations of the remote seams, for offline hosts and tests

use std::{collections::HashMap, sync::Mutex};

use crate::domain::models::{ChapterOrdinal, Percent, ProgressKey, RemoteProgress};
use crate::error::{ReadingError, Result};

use super::{ChapterSource, ProgressStore};

#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    records: Mutex<HashMap<ProgressKey, Percent>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ProgressKey) -> Option<Percent> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(key).copied()
    }
}

#[async_trait::async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn fetch(&self, key: &ProgressKey) -> Result<Option<RemoteProgress>> {
        Ok(self.get(key).map(|percent| RemoteProgress {
            percent,
            completed: percent.is_complete(),
        }))
    }

    async fn store(&self, key: &ProgressKey, percent: Percent) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(key.clone(), percent);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryChapterSource {
    works: HashMap<String, Vec<ChapterOrdinal>>,
}

impl MemoryChapterSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a work; an empty chapter list still makes the work known.
    pub fn with_work(mut self, work_key: impl Into<String>, chapters: Vec<ChapterOrdinal>) -> Self {
        self.works.insert(work_key.into(), chapters);
        self
    }
}

#[async_trait::async_trait]
impl ChapterSource for MemoryChapterSource {
    async fn list_ordinals(&self, work_key: &str) -> Result<Vec<ChapterOrdinal>> {
        self.works
            .get(work_key)
            .cloned()
            .ok_or_else(|| ReadingError::UnknownWork(work_key.to_string()))
    }
}
