//! Unified error types for sheetfeed.
//!
//! Every variant renders with a stable, machine-greppable code prefix.

use tokio_rusqlite::rusqlite;

/// Unified error types for the sheetfeed pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty query).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Database file or directory could not be created.
    #[error("STORE_ERROR: io: {0}")]
    StoreIo(String),

    /// Stored value could not be encoded or decoded.
    #[error("STORE_ERROR: codec: {0}")]
    Codec(String),

    /// Reddit rejected our credentials.
    #[error("REDDIT_AUTH_ERROR: {0}")]
    RedditAuth(String),

    /// Reddit rate limited us.
    #[error("REDDIT_RATE_LIMITED: {0}")]
    RedditRateLimited(String),

    /// HTTP error response or transport failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Remote resource does not exist.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Sheet could not be downloaded by any method.
    #[error("SHEET_DOWNLOAD_FAILED: {0}")]
    SheetDownload(String),

    /// Exchange feed could not be fetched or parsed.
    #[error("EXCHANGE_ERROR: {0}")]
    Exchange(String),
}

impl Error {
    /// The stable code prefix for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::CacheMiss(_) => "CACHE_MISS",
            Error::Database(_) | Error::MigrationFailed(_) | Error::StoreIo(_) | Error::Codec(_) => "STORE_ERROR",
            Error::RedditAuth(_) => "REDDIT_AUTH_ERROR",
            Error::RedditRateLimited(_) => "REDDIT_RATE_LIMITED",
            Error::HttpError(_) => "HTTP_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::SheetDownload(_) => "SHEET_DOWNLOAD_FAILED",
            Error::Exchange(_) => "EXCHANGE_ERROR",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CacheMiss("post:abc123".to_string());
        assert!(err.to_string().contains("CACHE_MISS"));
        assert!(err.to_string().contains("post:abc123"));
    }

    #[test]
    fn test_error_code_matches_prefix() {
        let errors = [
            Error::InvalidInput("x".into()),
            Error::Codec("x".into()),
            Error::StoreIo("x".into()),
            Error::RedditRateLimited("x".into()),
            Error::SheetDownload("x".into()),
            Error::Exchange("x".into()),
        ];
        for err in errors {
            assert!(err.to_string().starts_with(err.code()), "{err}");
        }
    }

    #[test]
    fn test_from_serde_json() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.code(), "STORE_ERROR");
    }
}
