//! Sheet downloader.
//!
//! Sheets are fetched through the public CSV export first. Sheets that are
//! not published that way are read through the Sheets v4 values API when a
//! Google API key is configured.
//!
//! ### Retry policy (values API)
//!
//! - Quota exceeded (429 or "Quota exceeded"): wait `quota_backoff`, retry.
//! - "This operation is not supported" (400): give up immediately.
//! - Anything else: wait `retry_backoff`, retry.
//! - At most `max_retries` attempts.

pub mod url;

pub use url::{BASE_URL, clean_url, find_sheet_url, sheet_id_from_url, sheet_url_in_submission};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::Deserialize;
use sheetfeed_core::{AppConfig, Error, SheetTable};

/// Default CSV export host.
const DEFAULT_EXPORT_BASE: &str = "https://docs.google.com";

/// Default Sheets API base URL.
const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// Range read from the first worksheet.
const VALUES_RANGE: &str = "A1:ZZ";

const NOT_SUPPORTED: &str = "This operation is not supported";
const QUOTA_EXCEEDED: &str = "Quota exceeded";

/// Errors from the sheet downloader.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SheetError {
    /// Export returned something other than CSV (usually a sign-in page).
    #[error("not a csv export: {0}")]
    NotCsv(String),

    /// CSV could not be parsed.
    #[error("csv error: {0}")]
    Csv(String),

    /// API quota exceeded.
    #[error("quota exceeded")]
    QuotaExceeded,

    /// The document cannot be read as a sheet.
    #[error("operation not supported: {0}")]
    NotSupported(String),

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

    /// CSV file could not be written.
    #[error("io error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for SheetError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { SheetError::Timeout } else { SheetError::Network(Arc::new(err)) }
    }
}

impl From<csv::Error> for SheetError {
    fn from(err: csv::Error) -> Self {
        SheetError::Csv(err.to_string())
    }
}

impl From<std::io::Error> for SheetError {
    fn from(err: std::io::Error) -> Self {
        SheetError::Io(err.to_string())
    }
}

impl From<SheetError> for Error {
    fn from(err: SheetError) -> Self {
        match err {
            SheetError::Io(msg) => Error::InvalidInput(msg),
            other => Error::SheetDownload(other.to_string()),
        }
    }
}

/// Downloader configuration.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub export_base: String,
    pub api_base: String,
    /// Enables the values API fallback.
    pub api_key: Option<String>,
    pub max_retries: u32,
    pub quota_backoff: Duration,
    pub retry_backoff: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            export_base: DEFAULT_EXPORT_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            max_retries: 3,
            quota_backoff: Duration::from_secs(65),
            retry_backoff: Duration::from_secs(5),
            timeout: Duration::from_secs(20),
            user_agent: concat!("sheetfeed/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DownloaderConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            api_key: config.sheets.google_api_key.clone().filter(|k| !k.is_empty()),
            max_retries: config.sheets.max_retries.max(1),
            quota_backoff: Duration::from_secs(config.sheets.quota_backoff_secs),
            retry_backoff: Duration::from_secs(config.sheets.retry_backoff_secs),
            timeout: config.timeout(),
            user_agent: config.user_agent(),
            ..Default::default()
        }
    }
}

/// Source of sheet contents.
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn download(&self, sheet_id: &str) -> Result<SheetTable, SheetError>;
}

/// Values API response.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Google Sheets downloader.
#[derive(Debug, Clone)]
pub struct SheetDownloader {
    http: reqwest::Client,
    config: DownloaderConfig,
}

impl SheetDownloader {
    pub fn new(config: DownloaderConfig) -> Result<Self, SheetError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| SheetError::Network(Arc::new(e)))?;
        Ok(Self { http, config })
    }

    /// Download a sheet's first worksheet.
    pub async fn download(&self, sheet_id: &str) -> Result<SheetTable, SheetError> {
        match self.export_csv(sheet_id).await {
            Ok(table) => {
                tracing::info!(sheet_id, shape = ?table.shape(), "sheet downloaded via csv export");
                Ok(table)
            }
            Err(e) if self.config.api_key.is_some() => {
                tracing::warn!(sheet_id, error = %e, "csv export failed, trying values api");
                self.download_values_with_retry(sheet_id).await
            }
            Err(e) => {
                tracing::error!(sheet_id, error = %e, "csv export failed and no api key configured");
                Err(e)
            }
        }
    }

    /// `GET /spreadsheets/d/{id}/export?format=csv&gid=0`.
    async fn export_csv(&self, sheet_id: &str) -> Result<SheetTable, SheetError> {
        let url = format!("{}/spreadsheets/d/{sheet_id}/export", self.config.export_base.trim_end_matches('/'));
        tracing::debug!(%url, "downloading csv export");

        let response = self
            .http
            .get(&url)
            .query(&[("format", "csv"), ("gid", "0")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SheetError::HttpError { status: status.as_u16() });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if content_type.contains("text/html") {
            return Err(SheetError::NotCsv(content_type));
        }

        let body = response.bytes().await?;
        parse_csv(&body)
    }

    async fn download_values_with_retry(&self, sheet_id: &str) -> Result<SheetTable, SheetError> {
        let max = self.config.max_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.fetch_values(sheet_id).await {
                Ok(table) => {
                    tracing::info!(sheet_id, shape = ?table.shape(), "sheet downloaded via values api");
                    return Ok(table);
                }
                Err(SheetError::NotSupported(msg)) => {
                    tracing::error!(sheet_id, %msg, "sheet cannot be read");
                    return Err(SheetError::NotSupported(msg));
                }
                Err(e) => e,
            };

            if attempt >= max {
                tracing::error!(sheet_id, attempts = attempt, error = %err, "giving up on sheet");
                return Err(err);
            }

            let wait = match err {
                SheetError::QuotaExceeded => self.config.quota_backoff,
                _ => self.config.retry_backoff,
            };
            tracing::warn!(sheet_id, attempt, max, error = %err, ?wait, "sheet download failed, retrying");
            tokio::time::sleep(wait).await;
        }
    }

    async fn fetch_values(&self, sheet_id: &str) -> Result<SheetTable, SheetError> {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let mut url =
            ::url::Url::parse(&self.config.api_base).map_err(|e| SheetError::Parse(format!("api base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SheetError::Parse("api base url cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(["spreadsheets", sheet_id, "values", VALUES_RANGE]);

        let response = self.http.get(url).query(&[("key", api_key)]).send().await?;
        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await?;
            let range: ValueRange = serde_json::from_slice(&body).map_err(|e| SheetError::Parse(e.to_string()))?;
            return Ok(SheetTable::positional(range.values));
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_api_error(status, &body))
    }
}

#[async_trait]
impl SheetSource for SheetDownloader {
    async fn download(&self, sheet_id: &str) -> Result<SheetTable, SheetError> {
        SheetDownloader::download(self, sheet_id).await
    }
}

fn classify_api_error(status: StatusCode, body: &str) -> SheetError {
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains(QUOTA_EXCEEDED) {
        SheetError::QuotaExceeded
    } else if body.contains(NOT_SUPPORTED) {
        SheetError::NotSupported(status.to_string())
    } else {
        SheetError::HttpError { status: status.as_u16() }
    }
}

/// Parse an export body. The first record is the header; blank header cells
/// are named `Unnamed: {index}`.
pub fn parse_csv(body: &[u8]) -> Result<SheetTable, SheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| if h.trim().is_empty() { format!("Unnamed: {i}") } else { h.to_string() })
        .collect();
    if headers.is_empty() {
        return Err(SheetError::Csv("empty export".to_string()));
    }

    let rows = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<Vec<String>>, _>>()?;

    Ok(SheetTable::new(headers, rows))
}

/// Write a table as `{dir}/{name}[_YYYY-MM-DD].csv`.
pub fn write_csv(table: &SheetTable, dir: &Path, name: &str, include_date: bool) -> Result<PathBuf, SheetError> {
    std::fs::create_dir_all(dir)?;
    let stem = if include_date {
        format!("{name}_{}", chrono::Local::now().format("%Y-%m-%d"))
    } else {
        name.to_string()
    };
    let path = dir.join(format!("{stem}.csv"));

    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(&path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), "csv written");
    Ok(path)
}
