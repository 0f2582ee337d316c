//! Client code for sheetfeed.
//!
//! This crate talks to the outside world: the Reddit API, Google Sheets
//! exports and the exchange feed. The CLI composes these into the pipeline.

pub mod exchange;
pub mod reddit;
pub mod sheets;

pub use exchange::{ExchangeClient, ExchangeError, ExchangeUpdate};
pub use reddit::{
    Comment, RedditClient, RedditConfig, RedditError, SearchRequest, Sort, Submission, SubmissionSource,
    SubmissionStream, TimeFilter,
};
pub use sheets::{
    DownloaderConfig, SheetDownloader, SheetError, SheetSource, clean_url, find_sheet_url, sheet_id_from_url,
    sheet_url_in_submission, write_csv,
};
