use serde::Deserialize;

use crate::domain::models::Percent;

const WORDS_PER_MINUTE: f64 = 200.0;

/// One scroll/viewport reading taken by the host page, in layout pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportMeasurement {
    pub viewport_top: f64,
    pub viewport_height: f64,
    pub content_top: f64,
    pub content_height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    pub percent: Percent,
    pub completed: bool,
}

impl ViewportMeasurement {
    pub fn sample(&self) -> ProgressSample {
        let percent = compute_progress(
            self.viewport_top,
            self.viewport_height,
            self.content_top,
            self.content_height,
        );
        ProgressSample {
            percent,
            completed: percent.is_complete(),
        }
    }
}

/// Share of the chapter content that has scrolled into or past the viewport.
///
/// Zero until the viewport reaches the content, and for empty or non-finite layouts.
pub fn compute_progress(
    viewport_top: f64,
    viewport_height: f64,
    content_top: f64,
    content_height: f64,
) -> Percent {
    let finite = [viewport_top, viewport_height, content_top, content_height]
        .iter()
        .all(|v| v.is_finite());
    if !finite || content_height <= 0.0 || viewport_top < content_top {
        return Percent::ZERO;
    }
    let read_height = (viewport_top + viewport_height - content_top).min(content_height);
    let percent = (100.0 * read_height / content_height).round();
    Percent::clamped(percent as i64)
}

/// Whole minutes, each rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingTime {
    pub total: u32,
    pub read: u32,
    pub remaining: u32,
}

pub fn estimate_reading_time(word_count: u32, percent: Percent) -> ReadingTime {
    let total = f64::from(word_count) / WORDS_PER_MINUTE;
    let read = total * f64::from(percent.value()) / 100.0;
    ReadingTime {
        total: total.ceil() as u32,
        read: read.ceil() as u32,
        remaining: (total - read).ceil() as u32,
    }
}
