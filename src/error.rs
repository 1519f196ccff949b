use thiserror::Error;

/// Errors surfaced by the reading-state engine.
///
/// "Nothing stored" and "no adjacent chapter" are not errors; they come back as `None`.
#[derive(Debug, Error)]
pub enum ReadingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown work `{0}`")]
    UnknownWork(String),

    /// Remote save or hydration failed. Callers degrade to local-only persistence.
    #[error("remote request failed: {0}")]
    TransientNetwork(String),

    #[error("remote returned malformed data: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("local cache unavailable: {0}")]
    Cache(#[from] std::io::Error),
}

impl ReadingError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ReadingError::InvalidInput(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ReadingError::TransientNetwork(_))
    }
}

impl From<reqwest::Error> for ReadingError {
    fn from(e: reqwest::Error) -> Self {
        ReadingError::TransientNetwork(e.to_string())
    }
}

pub type Result<T, E = ReadingError> = std::result::Result<T, E>;
