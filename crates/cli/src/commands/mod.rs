//! Subcommands.
//!
//! Each command module exposes an `XArgs` struct, a serializable `XOutput`
//! and a `run` function that takes its collaborators explicitly so tests can
//! pass fakes and an in-memory store.

use clap::Subcommand;
use serde::Serialize;
use sheetfeed_client::{DownloaderConfig, ExchangeClient, RedditClient, RedditConfig, SheetDownloader};
use sheetfeed_core::{AppConfig, Error, Store};

pub mod exchange;
pub mod export;
pub mod headers;
pub mod iso;
pub mod purge;
pub mod sheets;
pub mod stream;

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Search the subreddit for sheet posts, download new sheets and store their listings.
    Sheets(sheets::SheetsArgs),

    /// Fetch the newest submissions and store ISO posts.
    Iso(iso::IsoArgs),

    /// Poll the subreddit for new submissions until interrupted.
    Stream(stream::StreamArgs),

    /// Re-parse every cached sheet and report header statistics.
    Headers(headers::HeadersArgs),

    /// Sync the exchange feed into the seller collection.
    Exchange(exchange::ExchangeArgs),

    /// Write a cached sheet to a CSV file.
    Export(export::ExportArgs),

    /// Delete cached entries.
    Purge(purge::PurgeArgs),
}

/// Run a command and return its output as JSON.
pub async fn dispatch(command: Command, config: &AppConfig, store: &Store) -> Result<serde_json::Value, Error> {
    let tz = config.tz();
    let subreddit = config.reddit.subreddit.as_str();

    match command {
        Command::Sheets(args) => {
            let reddit = connect_reddit(config).await?;
            let sheets = SheetDownloader::new(DownloaderConfig::from_app_config(config))?;
            to_json(&sheets::run(store, &reddit, &sheets, subreddit, &args, tz).await?)
        }
        Command::Iso(args) => {
            let reddit = connect_reddit(config).await?;
            to_json(&iso::run(store, &reddit, subreddit, &args, tz).await?)
        }
        Command::Stream(args) => {
            let reddit = connect_reddit(config).await?;
            to_json(&stream::run(store, &reddit, subreddit, &args, tz).await?)
        }
        Command::Headers(args) => to_json(&headers::run(store, &args).await?),
        Command::Exchange(_) => {
            let url = config
                .require_exchange_url()
                .map_err(|e| Error::InvalidInput(e.to_string()))?;
            let client = ExchangeClient::from_app_config(config)?;
            to_json(&exchange::run(store, &client, url).await?)
        }
        Command::Export(args) => {
            let dir = args.dir.clone().unwrap_or_else(|| config.sheets.export_dir.clone());
            to_json(&export::run(store, &args, &dir).await?)
        }
        Command::Purge(args) => to_json(&purge::run(store, &args).await?),
    }
}

/// Authenticate against Reddit with the configured credentials.
pub async fn connect_reddit(config: &AppConfig) -> Result<RedditClient, Error> {
    let reddit_config = RedditConfig::from_app_config(config)?;
    Ok(RedditClient::connect(reddit_config).await?)
}

fn to_json<T: Serialize>(output: &T) -> Result<serde_json::Value, Error> {
    serde_json::to_value(output).map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by command tests.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use sheetfeed_client::{Comment, RedditError, SearchRequest, SheetError, SheetSource, Submission, SubmissionSource};
    use sheetfeed_core::SheetTable;

    pub fn submission(id: &str, title: &str, selftext: &str, created_utc: f64) -> Submission {
        Submission {
            id: id.into(),
            title: title.into(),
            selftext: selftext.into(),
            url: None,
            created_utc,
            num_comments: 0,
            score: 1,
            author: Some("seller".into()),
            author_flair_text: Some("12 trades".into()),
            link_flair_text: None,
            permalink: None,
        }
    }

    pub fn iso_submission(id: &str, created_utc: f64) -> Submission {
        Submission {
            link_flair_text: Some(sheetfeed_core::ISO_FLAIR.into()),
            ..submission(id, "ISO: Destroyer", "", created_utc)
        }
    }

    /// Canned Reddit responses. `new_batches` are served one per call; the
    /// last one repeats.
    #[derive(Default)]
    pub struct FakeReddit {
        search: Vec<Submission>,
        comments: HashMap<String, Vec<Comment>>,
        new_batches: Mutex<Vec<Result<Vec<Submission>, RedditError>>>,
    }

    impl FakeReddit {
        pub fn with_search(search: Vec<Submission>) -> Self {
            Self { search, ..Self::default() }
        }

        pub fn with_new(batches: Vec<Result<Vec<Submission>, RedditError>>) -> Self {
            Self { new_batches: Mutex::new(batches), ..Self::default() }
        }

        pub fn with_comments(mut self, submission_id: &str, body: &str) -> Self {
            let comment = Comment {
                id: format!("c_{submission_id}"),
                author: Some("seller".into()),
                body: body.into(),
                created: Utc::now(),
            };
            self.comments.entry(submission_id.to_string()).or_default().push(comment);
            self
        }
    }

    #[async_trait]
    impl SubmissionSource for FakeReddit {
        async fn search(&self, _req: &SearchRequest) -> Result<Vec<Submission>, RedditError> {
            Ok(self.search.clone())
        }

        async fn new_submissions(
            &self, _subreddit: &str, limit: Option<usize>,
        ) -> Result<Vec<Submission>, RedditError> {
            let mut batches = self.new_batches.lock().unwrap();
            let batch = if batches.len() > 1 {
                batches.remove(0)
            } else {
                batches.first().cloned().unwrap_or(Ok(Vec::new()))
            };
            batch.map(|mut b| {
                b.truncate(limit.unwrap_or(usize::MAX));
                b
            })
        }

        async fn comments(&self, submission_id: &str) -> Result<Vec<Comment>, RedditError> {
            Ok(self.comments.get(submission_id).cloned().unwrap_or_default())
        }
    }

    /// Sheets keyed by id; unknown ids fail like a private sheet.
    #[derive(Default)]
    pub struct FakeSheets {
        tables: HashMap<String, SheetTable>,
        downloads: AtomicUsize,
    }

    impl FakeSheets {
        pub fn with_sheet(mut self, id: &str, headers: &[&str], rows: &[&[&str]]) -> Self {
            let table = SheetTable::new(
                headers.iter().map(|h| h.to_string()).collect(),
                rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect(),
            );
            self.tables.insert(id.to_string(), table);
            self
        }

        pub fn downloads(&self) -> usize {
            self.downloads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SheetSource for FakeSheets {
        async fn download(&self, sheet_id: &str) -> Result<SheetTable, SheetError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            self.tables
                .get(sheet_id)
                .cloned()
                .ok_or_else(|| SheetError::NotCsv(format!("sheet {sheet_id} is private")))
        }
    }
}
