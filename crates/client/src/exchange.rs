//! Exchange feed client.
//!
//! The feed is a JSON object mapping usernames to their confirmed trades. It is
//! polled with `If-None-Match` so an unchanged feed costs one 304.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use reqwest::{StatusCode, header};
use sha2::{Digest, Sha256};
use sheetfeed_core::{AppConfig, Error, ExchangeSnapshot};

/// Errors from the exchange feed client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExchangeError {
    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Feed is not JSON.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { ExchangeError::Timeout } else { ExchangeError::Network(Arc::new(err)) }
    }
}

impl From<ExchangeError> for Error {
    fn from(err: ExchangeError) -> Self {
        Error::Exchange(err.to_string())
    }
}

/// Result of a conditional fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeUpdate {
    /// Server answered 304 for the previous etag.
    Unchanged,
    Changed(ExchangeSnapshot),
}

/// Exchange feed client.
#[derive(Debug, Clone)]
pub struct ExchangeClient {
    http: reqwest::Client,
}

impl ExchangeClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .gzip(true)
            .build()
            .map_err(|e| ExchangeError::Network(Arc::new(e)))?;
        Ok(Self { http })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, ExchangeError> {
        Self::new(config.timeout(), &config.user_agent())
    }

    /// Fetch the feed unless it still matches `previous_etag`.
    pub async fn check_for_update(
        &self, url: &str, previous_etag: Option<&str>,
    ) -> Result<ExchangeUpdate, ExchangeError> {
        let mut request = self.http.get(url).header(header::ACCEPT, "application/json");
        if let Some(etag) = previous_etag {
            request = request.header(header::IF_NONE_MATCH, etag);
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(%url, %status, "exchange feed response");

        if status == StatusCode::NOT_MODIFIED {
            tracing::info!("exchange feed unchanged");
            return Ok(ExchangeUpdate::Unchanged);
        }
        if !status.is_success() {
            return Err(ExchangeError::HttpError { status: status.as_u16() });
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;
        let etag = etag.unwrap_or_else(|| body_digest(&body));

        if previous_etag == Some(etag.as_str()) {
            tracing::info!(%etag, "exchange feed unchanged");
            return Ok(ExchangeUpdate::Unchanged);
        }

        let raw_json: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| ExchangeError::Parse(e.to_string()))?;
        let data_json = String::from_utf8_lossy(&body).into_owned();

        tracing::info!(%etag, bytes = body.len(), "exchange feed updated");
        Ok(ExchangeUpdate::Changed(ExchangeSnapshot { etag, data_json, last_updated: Utc::now(), raw_json }))
    }
}

/// SHA-256 hex of the body, used when the server sends no ETag.
fn body_digest(body: &Bytes) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}
