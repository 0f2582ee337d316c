//! Reddit API client error types.

use std::sync::Arc;

use sheetfeed_core::Error;

/// Errors from the Reddit API client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RedditError {
    /// Credentials are missing from the configuration.
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    /// Invalid search request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Token request or API call was rejected, or the token belongs to someone else.
    #[error("authentication failed: {0}")]
    AuthError(String),

    /// Rate limited by Reddit.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// Submission, comment thread or user does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for RedditError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { RedditError::Timeout } else { RedditError::Network(Arc::new(err)) }
    }
}

impl From<RedditError> for Error {
    fn from(err: RedditError) -> Self {
        match err {
            RedditError::MissingCredentials(_) | RedditError::AuthError(_) => Error::RedditAuth(err.to_string()),
            RedditError::InvalidRequest(msg) => Error::InvalidInput(msg),
            RedditError::RateLimited => Error::RedditRateLimited(err.to_string()),
            RedditError::NotFound(what) => Error::NotFound(what),
            RedditError::HttpError { .. }
            | RedditError::Timeout
            | RedditError::Network(_)
            | RedditError::Parse(_) => Error::HttpError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RedditError::MissingCredentials("reddit.client_id".to_string());
        assert!(err.to_string().contains("credentials"));

        let err = RedditError::HttpError { status: 502 };
        assert_eq!(err.to_string(), "HTTP error: 502");
    }

    #[test]
    fn test_into_core_error_codes() {
        assert_eq!(Error::from(RedditError::RateLimited).code(), "REDDIT_RATE_LIMITED");
        assert_eq!(Error::from(RedditError::AuthError("bad".into())).code(), "REDDIT_AUTH_ERROR");
        assert_eq!(Error::from(RedditError::NotFound("t3_x".into())).code(), "NOT_FOUND");
        assert_eq!(Error::from(RedditError::Timeout).code(), "HTTP_ERROR");
        assert_eq!(Error::from(RedditError::InvalidRequest("q".into())).code(), "INVALID_INPUT");
    }
}
