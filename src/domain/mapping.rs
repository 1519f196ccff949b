// Mapping from content API DTOs to domain models

use super::models::{ChapterOrdinal, Percent, RemoteProgress};
use crate::api_client::{ChapterSummaryDto, ProgressDto};
use crate::error::Result;

pub fn map_progress(dto: &ProgressDto) -> Result<RemoteProgress> {
    let percent = Percent::try_from(dto.progress)?;
    Ok(RemoteProgress {
        percent,
        completed: dto.completed.unwrap_or(false) || percent.is_complete(),
    })
}

/// Chapters without a usable number cannot be ordered and are dropped.
pub fn map_chapter(work_key: &str, dto: &ChapterSummaryDto) -> Option<ChapterOrdinal> {
    let position = dto.chapter_number.filter(|n| *n >= 1)?;
    let position = u32::try_from(position).ok()?;
    let chapter_key = dto
        .slug
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("chapter-{position}"));
    let title = dto
        .title
        .clone()
        .unwrap_or_else(|| format!("Chapter {position}"));
    Some(ChapterOrdinal {
        work_key: work_key.to_string(),
        position,
        chapter_key,
        title,
    })
}
