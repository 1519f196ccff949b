use std::sync::Arc;

use crate::domain::models::ChapterOrdinal;
use crate::error::{ReadingError, Result};
use crate::storage::ChapterSource;

/// Chapter keys in reader URLs look like `chapter-12`; the number is the ordinal position.
pub fn chapter_number_from_key(chapter_key: &str) -> Option<u32> {
    let digits = chapter_key.strip_prefix("chapter-").unwrap_or(chapter_key);
    digits.parse::<u32>().ok().filter(|n| *n >= 1)
}

/// One work's chapters sorted by position, with positions checked for uniqueness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterIndex {
    chapters: Vec<ChapterOrdinal>,
}

impl ChapterIndex {
    pub fn new(mut chapters: Vec<ChapterOrdinal>) -> Result<Self> {
        chapters.sort_by_key(|c| c.position);
        if let Some(c) = chapters.iter().find(|c| c.position == 0) {
            return Err(ReadingError::invalid(format!(
                "chapter `{}` has position 0",
                c.chapter_key
            )));
        }
        if let Some(pair) = chapters.windows(2).find(|w| w[0].position == w[1].position) {
            return Err(ReadingError::invalid(format!(
                "chapters `{}` and `{}` share position {}",
                pair[0].chapter_key, pair[1].chapter_key, pair[0].position
            )));
        }
        Ok(ChapterIndex { chapters })
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn get(&self, position: u32) -> Option<&ChapterOrdinal> {
        self.chapters
            .binary_search_by_key(&position, |c| c.position)
            .ok()
            .map(|i| &self.chapters[i])
    }

    /// Smallest position strictly greater than `position`.
    pub fn next(&self, position: u32) -> Option<&ChapterOrdinal> {
        let idx = self.chapters.partition_point(|c| c.position <= position);
        self.chapters.get(idx)
    }

    /// Largest position strictly less than `position`.
    pub fn previous(&self, position: u32) -> Option<&ChapterOrdinal> {
        let idx = self.chapters.partition_point(|c| c.position < position);
        idx.checked_sub(1).map(|i| &self.chapters[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChapterOrdinal> {
        self.chapters.iter()
    }
}

/// Navigation targets around the chapter being read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterNeighbors {
    pub previous: Option<ChapterOrdinal>,
    pub next: Option<ChapterOrdinal>,
}

/// Resolves previous/next chapters against a [`ChapterSource`].
///
/// A missing neighbor is `Ok(None)`; an unknown work is `Err(UnknownWork)`.
#[derive(Clone)]
pub struct ChapterResolver {
    source: Arc<dyn ChapterSource>,
}

impl ChapterResolver {
    pub fn new(source: Arc<dyn ChapterSource>) -> Self {
        Self { source }
    }

    async fn index(&self, work_key: &str) -> Result<ChapterIndex> {
        let chapters = self.source.list_ordinals(work_key).await?;
        ChapterIndex::new(chapters)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn next(&self, work_key: &str, position: u32) -> Result<Option<ChapterOrdinal>> {
        Ok(self.index(work_key).await?.next(position).cloned())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn previous(&self, work_key: &str, position: u32) -> Result<Option<ChapterOrdinal>> {
        Ok(self.index(work_key).await?.previous(position).cloned())
    }

    /// Both neighbors from a single source lookup.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn neighbors(&self, work_key: &str, position: u32) -> Result<ChapterNeighbors> {
        let index = self.index(work_key).await?;
        let neighbors = ChapterNeighbors {
            previous: index.previous(position).cloned(),
            next: index.next(position).cloned(),
        };
        tracing::debug!(
            chapters = index.len(),
            previous = ?neighbors.previous.as_ref().map(|c| c.position),
            next = ?neighbors.next.as_ref().map(|c| c.position),
            "resolved chapter neighbors"
        );
        Ok(neighbors)
    }
}
