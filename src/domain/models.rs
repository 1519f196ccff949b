// Domain models shared by the tracker, the session and the chapter resolver

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReadingError, Result};

/// A chapter counts as completed once this percentage is reached.
pub const COMPLETION_THRESHOLD: u8 = 95;

/// Reading progress as a whole percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Percent(u8);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const FULL: Percent = Percent(100);

    /// Clamp any integer into range. Used for caller supplied values.
    pub fn clamped(value: i64) -> Self {
        Percent(value.clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_complete(self) -> bool {
        self.0 >= COMPLETION_THRESHOLD
    }
}

impl TryFrom<i64> for Percent {
    type Error = ReadingError;

    fn try_from(value: i64) -> Result<Self> {
        if (0..=100).contains(&value) {
            Ok(Percent(value as u8))
        } else {
            Err(ReadingError::invalid(format!(
                "percent {value} is outside 0..=100"
            )))
        }
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Percent::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

pub fn cache_key(work_key: &str, chapter_key: &str) -> String {
    format!("reading-progress-{work_key}-{chapter_key}")
}

/// Keys travel as URL path segments, so they must be non-blank and free of
/// path, query and fragment delimiters.
pub fn validate_key_part(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ReadingError::invalid(format!("{what} is empty")));
    }
    if let Some(c) = value
        .chars()
        .find(|&c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_control())
    {
        return Err(ReadingError::invalid(format!(
            "{what} {value:?} contains {c:?}"
        )));
    }
    Ok(())
}

/// Validated (work, chapter) pair identifying one progress record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressKey {
    work_key: String,
    chapter_key: String,
}

impl ProgressKey {
    pub fn new(work_key: impl Into<String>, chapter_key: impl Into<String>) -> Result<Self> {
        let work_key = work_key.into();
        let chapter_key = chapter_key.into();
        validate_key_part("work key", &work_key)?;
        validate_key_part("chapter key", &chapter_key)?;
        Ok(ProgressKey {
            work_key,
            chapter_key,
        })
    }

    pub fn work_key(&self) -> &str {
        &self.work_key
    }

    pub fn chapter_key(&self) -> &str {
        &self.chapter_key
    }

    /// Key under which the record lives in the local cache.
    pub fn cache_key(&self) -> String {
        cache_key(&self.work_key, &self.chapter_key)
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.work_key, self.chapter_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgressRecord {
    pub work_key: String,
    pub chapter_key: String,
    pub percent: Percent,
    pub completed: bool,
    pub saved_at: DateTime<Utc>,
}

impl ReadingProgressRecord {
    pub fn new(key: &ProgressKey, percent: Percent, completed: bool) -> Self {
        ReadingProgressRecord {
            work_key: key.work_key().to_string(),
            chapter_key: key.chapter_key().to_string(),
            percent,
            completed,
            saved_at: Utc::now(),
        }
    }
}

/// What the remote store knows about one chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteProgress {
    pub percent: Percent,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterOrdinal {
    pub work_key: String,
    /// 1-based, unique within the work, possibly with gaps
    pub position: u32,
    pub chapter_key: String,
    pub title: String,
}

/// Result of a save attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceOutcome {
    /// The remote store holds the value.
    Saved,
    /// The remote write failed but the local cache holds the value.
    SavedLocalOnly,
    /// Neither channel accepted the value.
    Failed,
}

impl PersistenceOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::SavedLocalOnly => "saved_local_only",
            Self::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_clamps_out_of_range() {
        assert_eq!(Percent::clamped(-5).value(), 0);
        assert_eq!(Percent::clamped(250).value(), 100);
        assert_eq!(Percent::clamped(42).value(), 42);
    }

    #[test]
    fn percent_strict_conversion_rejects_negative() {
        let err = Percent::try_from(-1).unwrap_err();
        assert!(matches!(err, ReadingError::InvalidInput(_)));
        assert!(Percent::try_from(101).is_err());
        assert_eq!(Percent::try_from(100).unwrap(), Percent::FULL);
    }

    #[test]
    fn completion_starts_at_threshold() {
        assert!(!Percent::clamped(94).is_complete());
        assert!(Percent::clamped(95).is_complete());
    }

    #[test]
    fn progress_key_rejects_blank_parts() {
        assert!(ProgressKey::new("", "chapter-1").is_err());
        assert!(ProgressKey::new("my-novel", "   ").is_err());
        let key = ProgressKey::new("my-novel", "chapter-1").unwrap();
        assert_eq!(key.cache_key(), "reading-progress-my-novel-chapter-1");
    }

    #[test]
    fn progress_key_rejects_url_delimiters() {
        for (work, chapter) in [
            ("my/novel", "chapter-1"),
            ("my-novel", "chapter-1?page=2"),
            ("my-novel", "chapter-1#top"),
            ("my-novel", "..\\chapter-1"),
            ("my%2Fnovel", "chapter-1"),
            ("my-novel", "chapter\n1"),
        ] {
            let err = ProgressKey::new(work, chapter).unwrap_err();
            assert!(matches!(err, ReadingError::InvalidInput(_)), "{work}/{chapter}");
        }
        assert!(ProgressKey::new("the_novel.v2", "chapter-1").is_ok());
    }

    #[test]
    fn record_round_trips_through_cache_json() {
        let key = ProgressKey::new("my-novel", "chapter-3").unwrap();
        let record = ReadingProgressRecord::new(&key, Percent::clamped(42), false);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"workKey\":\"my-novel\""));
        assert!(json.contains("\"percent\":42"));
        let back: ReadingProgressRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn record_with_out_of_range_percent_is_rejected() {
        let json = r#"{"workKey":"w","chapterKey":"c","percent":140,"completed":false,"savedAt":"2025-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<ReadingProgressRecord>(json).is_err());
    }
}
