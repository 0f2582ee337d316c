//! Reddit API client.
//!
//! Provides an OAuth (script app, password grant) client for the subreddit
//! endpoints the pipeline needs, with rate limiting, request validation,
//! and response normalization.
//!
//! ### Endpoints
//!
//! - **Token**: `POST {auth_url}/api/v1/access_token`, HTTP basic auth with the app id/secret.
//! - **Search**: `GET {base_url}/r/{subreddit}/search`, paged through `after` cursors.
//! - **New**: `GET {base_url}/r/{subreddit}/new`.
//! - **Comments**: `GET {base_url}/comments/{id}`.
//! - **Rate Limiting**: minimum interval between requests (default 1s).

pub mod error;
pub mod request;
pub mod response;

pub use error::RedditError;
pub use request::{SearchRequest, Sort, TimeFilter};
pub use response::{Comment, Submission};

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::de::DeserializeOwned;
use sheetfeed_core::AppConfig;
use tokio::sync::Mutex;
use tokio::time::Instant;

use request::{MAX_LISTING_RESULTS, PAGE_SIZE};
use response::{ListingResponse, MeResponse, TokenResponse};

/// Tokens are refreshed this long before Reddit says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Comments requested per thread.
const COMMENT_LIMIT: &str = "500";

/// Reddit API client configuration.
#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    /// API base URL (default: https://oauth.reddit.com).
    pub base_url: String,
    /// Token endpoint base URL (default: https://www.reddit.com).
    pub auth_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub min_request_interval: Duration,
}

impl RedditConfig {
    /// Build the client configuration from the application config.
    ///
    /// Fails if any of the four credentials is missing.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, RedditError> {
        let (client_id, client_secret, username, password) = config
            .require_reddit_credentials()
            .map_err(|e| RedditError::MissingCredentials(e.to_string()))?;

        Ok(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            base_url: config.reddit.base_url.trim_end_matches('/').to_string(),
            auth_url: config.reddit.auth_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent(),
            timeout: config.timeout(),
            min_request_interval: Duration::from_millis(config.reddit.min_request_interval_ms),
        })
    }
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(Instant::now().checked_sub(min_interval).unwrap_or_else(Instant::now)),
            min_interval,
        }
    }

    /// Acquire permission to make a request, waiting if necessary.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            tokio::time::sleep(self.min_interval - elapsed).await;
        }
        *last = Instant::now();
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

/// Reddit API client.
#[derive(Debug, Clone)]
pub struct RedditClient {
    http: reqwest::Client,
    config: RedditConfig,
    rate_limiter: Arc<RateLimiter>,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl RedditClient {
    /// Create a new client. No request is made until the first call.
    pub fn new(config: RedditConfig) -> Result<Self, RedditError> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(RedditError::MissingCredentials("reddit client id and secret are required".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| RedditError::Network(Arc::new(e)))?;

        let rate_limiter = Arc::new(RateLimiter::new(config.min_request_interval));
        Ok(Self { http, config, rate_limiter, token: Arc::new(Mutex::new(None)) })
    }

    /// Create a client and check that the token belongs to the configured user.
    pub async fn connect(config: RedditConfig) -> Result<Self, RedditError> {
        let client = Self::new(config)?;
        let me = client.me().await?;
        if !me.eq_ignore_ascii_case(&client.config.username) {
            return Err(RedditError::AuthError(format!(
                "authenticated as '{me}', expected '{}'",
                client.config.username
            )));
        }
        tracing::info!(user = %me, "connected to reddit");
        Ok(client)
    }

    /// Username the access token belongs to.
    pub async fn me(&self) -> Result<String, RedditError> {
        let me: MeResponse = self.get_json("/api/v1/me", &[]).await?;
        Ok(me.name)
    }

    /// Search a subreddit, following `after` cursors until the limit is reached.
    pub async fn search(&self, req: &SearchRequest) -> Result<Vec<Submission>, RedditError> {
        req.validate()?;
        tracing::debug!(subreddit = %req.subreddit, query = %req.q, "searching reddit");

        let path = format!("/r/{}/search", req.subreddit);
        let params = vec![
            ("q", req.q.clone()),
            ("sort", req.get_sort().to_string()),
            ("t", req.get_time_filter().to_string()),
            ("restrict_sr", "1".to_string()),
        ];
        self.paged(&path, &params, req.get_limit()).await
    }

    /// Newest submissions of a subreddit.
    pub async fn new_submissions(&self, subreddit: &str, limit: Option<usize>) -> Result<Vec<Submission>, RedditError> {
        let limit = limit.unwrap_or(MAX_LISTING_RESULTS).clamp(1, MAX_LISTING_RESULTS);
        self.paged(&format!("/r/{subreddit}/new"), &[], limit)
            .await
    }

    /// All loaded comments of a submission, flattened.
    pub async fn comments(&self, submission_id: &str) -> Result<Vec<Comment>, RedditError> {
        let thread: Vec<serde_json::Value> = self
            .get_json(&format!("/comments/{submission_id}"), &[("limit", COMMENT_LIMIT.to_string())])
            .await?;

        Ok(thread
            .get(1)
            .map(response::flatten_comments)
            .unwrap_or_default())
    }

    /// Whether a user account exists.
    pub async fn user_exists(&self, name: &str) -> Result<bool, RedditError> {
        match self
            .get_json::<serde_json::Value>(&format!("/user/{name}/about"), &[])
            .await
        {
            Ok(_) => Ok(true),
            Err(RedditError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn paged(
        &self, path: &str, params: &[(&'static str, String)], limit: usize,
    ) -> Result<Vec<Submission>, RedditError> {
        let mut results = Vec::new();
        let mut after: Option<String> = None;

        while results.len() < limit {
            let mut query = params.to_vec();
            query.push(("limit", PAGE_SIZE.min(limit - results.len()).to_string()));
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }

            let page: ListingResponse<Submission> = self.get_json(path, &query).await?;
            let count = page.data.children.len();
            results.extend(page.data.children.into_iter().map(|thing| thing.data));
            tracing::debug!(path, count, total = results.len(), "fetched listing page");

            match page.data.after {
                Some(next) if count > 0 => after = Some(next),
                _ => break,
            }
        }

        results.truncate(limit);
        Ok(results)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, RedditError> {
        let token = self.access_token().await?;
        self.rate_limiter.acquire().await;

        let start = Instant::now();
        let url = format!("{}{}", self.config.base_url, path);

        let http_response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .query(&[("raw_json", "1")])
            .query(query)
            .send()
            .await?;

        let status = http_response.status();
        tracing::debug!(path, %status, elapsed = ?start.elapsed(), "reddit response");
        check_status(status, path)?;

        let bytes = http_response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RedditError::Parse(e.to_string()))
    }

    /// Cached access token, refreshed shortly before it expires.
    async fn access_token(&self) -> Result<String, RedditError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.refresh_at > Instant::now()
        {
            return Ok(token.value.clone());
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn request_token(&self) -> Result<AccessToken, RedditError> {
        self.rate_limiter.acquire().await;
        tracing::debug!(user = %self.config.username, "requesting reddit access token");

        let url = format!("{}/api/v1/access_token", self.config.auth_url);
        let http_response = self
            .http
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .await?;

        check_status(http_response.status(), "access token")?;

        let bytes = http_response.bytes().await?;
        let body: TokenResponse = serde_json::from_slice(&bytes).map_err(|e| RedditError::Parse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(RedditError::AuthError(error));
        }
        let value = body
            .access_token
            .ok_or_else(|| RedditError::AuthError("token response had no access_token".to_string()))?;
        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));

        Ok(AccessToken { value, refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN) })
    }
}

fn check_status(status: StatusCode, what: &str) -> Result<(), RedditError> {
    match status.as_u16() {
        401 | 403 => Err(RedditError::AuthError(format!("{what}: {status}"))),
        404 => Err(RedditError::NotFound(what.to_string())),
        429 => Err(RedditError::RateLimited),
        _ if status.is_client_error() || status.is_server_error() => {
            Err(RedditError::HttpError { status: status.as_u16() })
        }
        _ => Ok(()),
    }
}

/// Source of subreddit submissions.
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<Submission>, RedditError>;

    async fn new_submissions(&self, subreddit: &str, limit: Option<usize>) -> Result<Vec<Submission>, RedditError>;

    async fn comments(&self, submission_id: &str) -> Result<Vec<Comment>, RedditError>;
}

#[async_trait]
impl SubmissionSource for RedditClient {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<Submission>, RedditError> {
        RedditClient::search(self, req).await
    }

    async fn new_submissions(&self, subreddit: &str, limit: Option<usize>) -> Result<Vec<Submission>, RedditError> {
        RedditClient::new_submissions(self, subreddit, limit).await
    }

    async fn comments(&self, submission_id: &str) -> Result<Vec<Comment>, RedditError> {
        RedditClient::comments(self, submission_id).await
    }
}

/// Submissions remembered by a [`SubmissionStream`].
const DEFAULT_SEEN_CAPACITY: usize = 300;

/// Submissions fetched per poll.
const POLL_LIMIT: usize = 100;

/// Polls a subreddit's `/new` listing and yields each submission once.
pub struct SubmissionStream<'a> {
    source: &'a dyn SubmissionSource,
    subreddit: String,
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl<'a> SubmissionStream<'a> {
    pub fn new(source: &'a dyn SubmissionSource, subreddit: impl Into<String>) -> Self {
        Self::with_capacity(source, subreddit, DEFAULT_SEEN_CAPACITY)
    }

    /// `capacity` bounds the seen set; the oldest ids are forgotten first.
    pub fn with_capacity(source: &'a dyn SubmissionSource, subreddit: impl Into<String>, capacity: usize) -> Self {
        Self {
            source,
            subreddit: subreddit.into(),
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Unseen submissions since the last poll, oldest first.
    pub async fn poll(&mut self) -> Result<Vec<Submission>, RedditError> {
        let mut batch = self
            .source
            .new_submissions(&self.subreddit, Some(POLL_LIMIT))
            .await?;
        batch.sort_by(|a, b| a.created_utc.total_cmp(&b.created_utc));
        batch.retain(|s| self.remember(&s.id));
        Ok(batch)
    }

    /// Record an id; false if it was already seen.
    fn remember(&mut self, id: &str) -> bool {
        if !self.seen.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }
}
