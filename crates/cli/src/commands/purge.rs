//! `purge` command: delete cached posts and sheets.

use clap::Args;
use serde::Serialize;
use sheetfeed_core::{Error, Store};

#[derive(Debug, Clone, Args)]
pub struct PurgeArgs {
    /// Delete entries stored more than this many days ago.
    #[arg(long)]
    pub older_than_days: Option<i64>,

    /// Purge this hash (e.g. `sheets`) instead of the post keys.
    #[arg(long)]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeOutput {
    pub target: String,
    pub older_than_days: i64,
    pub deleted: u64,
}

/// Purge cached entries.
///
/// At least one option is required. `--hash` without `--older-than-days`
/// empties the whole hash.
pub async fn run(store: &Store, args: &PurgeArgs) -> Result<PurgeOutput, Error> {
    if args.older_than_days.is_none() && args.hash.is_none() {
        return Err(Error::InvalidInput("At least one of --older-than-days or --hash is required".to_string()));
    }
    if let Some(days) = args.older_than_days
        && days < 0
    {
        return Err(Error::InvalidInput(format!("--older-than-days must not be negative, got {days}")));
    }

    let days = args.older_than_days.unwrap_or(0);
    let (target, deleted) = match args.hash.as_deref() {
        Some(hash) => (format!("hash:{hash}"), store.purge_hash_older_than(hash, days).await?),
        None => ("keys".to_string(), store.purge_raw_older_than(days).await?),
    };

    tracing::info!(%target, days, deleted, "purged cache entries");
    Ok(PurgeOutput { target, older_than_days: days, deleted })
}
