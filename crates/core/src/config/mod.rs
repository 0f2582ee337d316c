//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHEETFEED_*, nested with `__`)
//! 2. TOML config file (`--config` or SHEETFEED_CONFIG_FILE)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Reddit API credentials and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    /// OAuth client id of the script app.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret of the script app.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Account the script app runs as.
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Application name, used to build the User-Agent.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Subreddit to search, without the `r/` prefix.
    #[serde(default = "default_subreddit")]
    pub subreddit: String,

    /// OAuth API base URL.
    #[serde(default = "default_reddit_base_url")]
    pub base_url: String,

    /// Token endpoint base URL.
    #[serde(default = "default_reddit_auth_url")]
    pub auth_url: String,

    /// Minimum interval between API requests in milliseconds.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
}

/// Sheet download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Google API key enabling the Sheets API fallback.
    #[serde(default)]
    pub google_api_key: Option<String>,

    /// Attempts made against the Sheets API before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait after a quota error, in seconds.
    #[serde(default = "default_quota_backoff_secs")]
    pub quota_backoff_secs: u64,

    /// Wait after any other retryable error, in seconds.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// Directory `export` writes CSV files into.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

/// Confirmed-trade exchange feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// JSON feed URL. The `exchange` command is disabled when unset.
    #[serde(default)]
    pub url: Option<String>,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHEETFEED_*)
/// 2. TOML config file
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "RedditConfig::default")]
    pub reddit: RedditConfig,

    #[serde(default = "SheetsConfig::default")]
    pub sheets: SheetsConfig,

    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Path to the SQLite store.
    ///
    /// Set via SHEETFEED_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory for rotated log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// IANA timezone used when rendering post timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Explicit User-Agent. Derived from the Reddit username and app name when unset.
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_app_name() -> String {
    "sheetfeed".into()
}

fn default_subreddit() -> String {
    "discexchange".into()
}

fn default_reddit_base_url() -> String {
    "https://oauth.reddit.com".into()
}

fn default_reddit_auth_url() -> String {
    "https://www.reddit.com".into()
}

fn default_min_request_interval_ms() -> u64 {
    1_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_quota_backoff_secs() -> u64 {
    65
}

fn default_retry_backoff_secs() -> u64 {
    5
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("./spreadsheets")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sheetfeed.sqlite")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_timezone() -> String {
    "America/Denver".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            app_name: default_app_name(),
            subreddit: default_subreddit(),
            base_url: default_reddit_base_url(),
            auth_url: default_reddit_auth_url(),
            min_request_interval_ms: default_min_request_interval_ms(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            google_api_key: None,
            max_retries: default_max_retries(),
            quota_backoff_secs: default_quota_backoff_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
            export_dir: default_export_dir(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reddit: RedditConfig::default(),
            sheets: SheetsConfig::default(),
            exchange: ExchangeConfig::default(),
            db_path: default_db_path(),
            log_dir: default_log_dir(),
            timezone: default_timezone(),
            timeout_ms: default_timeout_ms(),
            user_agent: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Configured timezone.
    ///
    /// Validation guarantees the name parses; UTC is returned otherwise.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(Tz::UTC)
    }

    /// User-Agent sent to every remote API.
    pub fn user_agent(&self) -> String {
        if let Some(ua) = &self.user_agent {
            return ua.clone();
        }
        match &self.reddit.username {
            Some(user) => format!("{} {}", user, self.reddit.app_name),
            None => format!("{}/{}", self.reddit.app_name, env!("CARGO_PKG_VERSION")),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// `config_file` takes priority over `SHEETFEED_CONFIG_FILE`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(config_file)
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file = config_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("SHEETFEED_CONFIG_FILE").ok().map(PathBuf::from));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(
            Env::prefixed("SHEETFEED_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// Reddit credentials as `(client_id, client_secret, username, password)`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` naming the first absent field.
    pub fn require_reddit_credentials(&self) -> Result<(&str, &str, &str, &str), ConfigError> {
        let r = &self.reddit;
        Ok((
            require(&r.client_id, "reddit.client_id", "SHEETFEED_REDDIT__CLIENT_ID")?,
            require(&r.client_secret, "reddit.client_secret", "SHEETFEED_REDDIT__CLIENT_SECRET")?,
            require(&r.username, "reddit.username", "SHEETFEED_REDDIT__USERNAME")?,
            require(&r.password, "reddit.password", "SHEETFEED_REDDIT__PASSWORD")?,
        ))
    }

    /// Exchange feed URL (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the exchange URL is not set.
    pub fn require_exchange_url(&self) -> Result<&str, ConfigError> {
        require(&self.exchange.url, "exchange.url", "SHEETFEED_EXCHANGE__URL")
    }
}

fn require<'a>(value: &'a Option<String>, field: &str, env: &str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::Missing { field: field.into(), hint: format!("Set {env} environment variable") })
}
