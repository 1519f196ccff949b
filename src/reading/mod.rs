pub mod chapters;
pub mod debounce;
pub mod session;
pub mod tracker;

pub use chapters::{ChapterIndex, ChapterNeighbors, ChapterResolver, chapter_number_from_key};
pub use session::{ReadingSession, SyncPolicy};
pub use tracker::{
    ProgressSample, ReadingTime, ViewportMeasurement, compute_progress, estimate_reading_time,
};
