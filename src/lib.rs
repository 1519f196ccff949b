//! Client-side reading-state engine: scroll progress, completion, debounced
//! persistence through a local cache and a remote store, chapter ordering and
//! windowed pagination.

pub mod api_client;
pub mod config;
pub mod domain;
pub mod error;
pub mod pagination;
pub mod reading;
pub mod storage;

pub use api_client::ContentApiClient;
pub use domain::models::{
    COMPLETION_THRESHOLD, ChapterOrdinal, Percent, PersistenceOutcome, ProgressKey,
    ReadingProgressRecord, RemoteProgress,
};
pub use error::{ReadingError, Result};
pub use pagination::{PageControls, PageToken, generate, page_controls};
pub use reading::{ChapterResolver, ReadingSession, SyncPolicy, ViewportMeasurement};
pub use storage::{ChapterSource, FileCache, LocalCache, MemoryCache, ProgressStore};
