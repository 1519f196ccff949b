// Persistence seams: the remote progress store, the chapter ordinal source and the local cache

pub mod cache;
pub mod memory;

use crate::domain::models::{ChapterOrdinal, Percent, ProgressKey, RemoteProgress};
use crate::error::Result;

pub use cache::{FileCache, LocalCache, MemoryCache, ProgressCache};
pub use memory::{MemoryChapterSource, MemoryProgressStore};

/// Remote persistence for reading progress.
#[async_trait::async_trait]
pub trait ProgressStore: Send + Sync {
    /// `Ok(None)` when nothing is stored for the key.
    async fn fetch(&self, key: &ProgressKey) -> Result<Option<RemoteProgress>>;
    async fn store(&self, key: &ProgressKey, percent: Percent) -> Result<()>;
}

/// Supplies the published chapters of a work.
#[async_trait::async_trait]
pub trait ChapterSource: Send + Sync {
    /// Fails with `UnknownWork` when the work does not exist. Order is not guaranteed.
    async fn list_ordinals(&self, work_key: &str) -> Result<Vec<ChapterOrdinal>>;
}
