//! `sheets` command: the full search → download → store pipeline.

use std::collections::HashSet;

use chrono::Utc;
use chrono_tz::Tz;
use clap::Args;
use serde::Serialize;
use sheetfeed_client::{
    RedditError, SearchRequest, SheetSource, Sort, Submission, SubmissionSource, TimeFilter, find_sheet_url,
    sheet_id_from_url, sheet_url_in_submission,
};
use sheetfeed_core::sheet::{parse_listings, parse_sheet};
use sheetfeed_core::store::{SHEETS_HASH, post_key, sheet_field};
use sheetfeed_core::{Error, Post, SheetPost, Store, UserSwap};

/// Arguments for the `sheets` command.
#[derive(Debug, Clone, Args)]
pub struct SheetsArgs {
    /// Search query.
    #[arg(long, default_value = "spreadsheet")]
    pub query: String,

    /// Result ordering: relevance, hot, top, new or comments.
    #[arg(long, default_value = "relevance", value_parser = parse_sort)]
    pub sort: Sort,

    /// Time window: all, hour, day, week, month or year.
    #[arg(long, default_value = "all", value_parser = parse_time_filter)]
    pub time_filter: TimeFilter,

    /// Maximum number of search results (default: every page).
    #[arg(long)]
    pub limit: Option<usize>,
}

fn parse_sort(s: &str) -> Result<Sort, String> {
    s.parse().map_err(|e: RedditError| e.to_string())
}

fn parse_time_filter(s: &str) -> Result<TimeFilter, String> {
    s.parse().map_err(|e: RedditError| e.to_string())
}

/// Run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SheetsOutput {
    pub search_results: usize,
    pub new_sheet_posts: usize,
    pub unique_sheet_posts: usize,
    pub duplicates_removed: usize,
    pub unique_sheets: usize,
    pub sheets_downloaded: usize,
    pub listings_stored: usize,
    pub sellers_recorded: usize,
}

/// Run the pipeline once.
pub async fn run(
    store: &Store, reddit: &dyn SubmissionSource, sheets: &dyn SheetSource, subreddit: &str, args: &SheetsArgs,
    tz: Tz,
) -> Result<SheetsOutput, Error> {
    tracing::info!(
        query = %args.query,
        sort = %args.sort,
        time_filter = %args.time_filter,
        limit = ?args.limit,
        "searching for sheet posts"
    );
    let req = SearchRequest {
        sort: Some(args.sort),
        time_filter: Some(args.time_filter),
        limit: args.limit,
        ..SearchRequest::new(subreddit, args.query.clone())
    };
    let results = reddit.search(&req).await?;

    let mut posts = parse_submissions(store, reddit, &results, tz).await?;
    posts.sort_by(|a, b| b.post.created.cmp(&a.post.created));
    let unique_posts = dedupe_submissions(&posts);
    let unique = unique_sheets(&posts);
    let downloaded = add_sheet_data(store, sheets, &unique).await?;
    cache_sheets(store, &downloaded).await?;
    let (listings_stored, sellers_recorded) = store_listings(store, &downloaded).await?;

    let output = SheetsOutput {
        search_results: results.len(),
        new_sheet_posts: posts.len(),
        unique_sheet_posts: unique_posts.len(),
        duplicates_removed: posts.len() - unique_posts.len(),
        unique_sheets: unique.len(),
        sheets_downloaded: downloaded.len(),
        listings_stored,
        sellers_recorded,
    };
    tracing::info!(?output, "sheet run complete");
    Ok(output)
}

/// Build sheet posts for submissions not seen before.
///
/// Every new submission is cached under `post:{id}`, with or without a sheet.
/// Only those that link a sheet are returned. Comments are fetched only when
/// the submission itself has no link.
pub async fn parse_submissions(
    store: &Store, reddit: &dyn SubmissionSource, submissions: &[Submission], tz: Tz,
) -> Result<Vec<SheetPost>, Error> {
    let mut sheet_posts = Vec::new();

    for submission in submissions {
        let post = Post::from(submission);
        tracing::info!("{}", post.summary(tz));

        let key = post_key(&post.id);
        if store.exists(&key).await? {
            tracing::info!(id = %post.id, "cache hit post, skipping");
            continue;
        }
        tracing::debug!(id = %post.id, "cache miss post");

        let sheet_url = match sheet_url_in_submission(submission) {
            Some(url) => Some(url),
            None => {
                let comments = reddit.comments(&submission.id).await.unwrap_or_else(|e| {
                    tracing::warn!(id = %submission.id, error = %e, "failed to fetch comments");
                    Vec::new()
                });
                find_sheet_url(submission, &comments)
            }
        };
        let sheet_id = sheet_url.as_deref().and_then(sheet_id_from_url);
        let sheet_post = SheetPost::new(post, sheet_url, sheet_id);

        store.set(&key, &sheet_post).await?;
        if sheet_post.sheet_url.is_some() {
            tracing::info!(id = %sheet_post.post.id, sheet_id = ?sheet_post.sheet_id, "sheet post created");
            sheet_posts.push(sheet_post);
        }
    }

    Ok(sheet_posts)
}

/// Drop repeated submissions, keeping the first occurrence.
pub fn dedupe_submissions(posts: &[SheetPost]) -> Vec<SheetPost> {
    let mut seen = HashSet::new();
    posts
        .iter()
        .filter(|p| {
            let fresh = seen.insert(p.post.id.as_str());
            if !fresh {
                tracing::warn!(id = %p.post.id, title = %p.post.title, "skipping duplicate submission");
            }
            fresh
        })
        .cloned()
        .collect()
}

/// One post per sheet id, keeping the first occurrence. Posts without an id are dropped.
pub fn unique_sheets(posts: &[SheetPost]) -> Vec<SheetPost> {
    let mut seen = HashSet::new();
    posts
        .iter()
        .filter(|p| match p.sheet_id.as_deref() {
            Some(id) if seen.insert(id) => true,
            _ => {
                tracing::warn!(
                    sheet_id = ?p.sheet_id,
                    seller = ?p.seller(),
                    shortlink = %p.post.shortlink,
                    "skipping duplicate sheet"
                );
                false
            }
        })
        .cloned()
        .collect()
}

/// Download sheets not already in the `sheets` hash.
///
/// A sheet that fails to download is logged and skipped.
pub async fn add_sheet_data(
    store: &Store, sheets: &dyn SheetSource, posts: &[SheetPost],
) -> Result<Vec<SheetPost>, Error> {
    let mut downloaded = Vec::new();

    for (idx, post) in posts.iter().enumerate() {
        let Some(sheet_id) = post.sheet_id.as_deref() else {
            continue;
        };
        tracing::info!(sheet_id, "processing sheet {} of {}", idx + 1, posts.len());

        if store.hexists(SHEETS_HASH, &sheet_field(sheet_id)).await? {
            tracing::info!(sheet_id, "sheet already cached");
            continue;
        }

        match sheets.download(sheet_id).await {
            Ok(table) => {
                let mut item = post.clone();
                item.sheet_raw = Some(table);
                item.sheet_dl_date = Some(Utc::now());
                downloaded.push(item);
            }
            Err(e) => tracing::warn!(
                sheet_id,
                post_id = %post.post.id,
                error = %e,
                "sheet download failed, skipping; the post stays cached and is not retried until `purge` removes it"
            ),
        }
    }

    Ok(downloaded)
}

/// Store downloaded sheet posts under `sheet:{id}` in the `sheets` hash.
pub async fn cache_sheets(store: &Store, items: &[SheetPost]) -> Result<(), Error> {
    for item in items {
        if let Some(sheet_id) = item.sheet_id.as_deref() {
            store.hset(SHEETS_HASH, &sheet_field(sheet_id), item).await?;
            tracing::info!(sheet_id, "sheet cached");
        }
    }
    Ok(())
}

/// Normalize downloaded sheets into listings and record their sellers.
///
/// Returns `(listings stored, new seller records)`.
pub async fn store_listings(store: &Store, items: &[SheetPost]) -> Result<(usize, usize), Error> {
    let mut listings_stored = 0;
    let mut sellers = 0;

    for item in items {
        let (Some(sheet_id), Some(raw)) = (item.sheet_id.as_deref(), item.sheet_raw.as_ref()) else {
            continue;
        };

        let parsed = parse_sheet(sheet_id, raw);
        let listings = parse_listings(&parsed, item);
        listings_stored += store.replace_listings_for_sheet(sheet_id, &listings).await?;

        if let Some(seller) = item.seller()
            && store.get_seller(seller).await?.is_none()
        {
            store
                .upsert_seller(UserSwap { username: seller.to_string(), transactions: Vec::new() })
                .await?;
            sellers += 1;
        }
    }

    Ok((listings_stored, sellers))
}
