//! `exchange` command: sync the confirmed-trade feed into the seller collection.

use clap::Args;
use serde::Serialize;
use sheetfeed_client::{ExchangeClient, ExchangeUpdate};
use sheetfeed_core::{Error, Store};

#[derive(Debug, Clone, Args)]
pub struct ExchangeArgs {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExchangeOutput {
    pub changed: bool,
    pub etag: Option<String>,
    pub users: usize,
    pub transactions_added: usize,
}

pub async fn run(store: &Store, client: &ExchangeClient, url: &str) -> Result<ExchangeOutput, Error> {
    let previous = store.latest_exchange_snapshot().await?;
    let previous_etag = previous.as_ref().map(|s| s.etag.as_str());

    let snapshot = match client.check_for_update(url, previous_etag).await? {
        ExchangeUpdate::Unchanged => {
            return Ok(ExchangeOutput { etag: previous_etag.map(str::to_string), ..Default::default() });
        }
        ExchangeUpdate::Changed(snapshot) => snapshot,
    };

    let swaps = snapshot.user_swaps();
    let users = swaps.len();
    let mut transactions_added = 0;
    for swap in swaps {
        transactions_added += store.upsert_seller(swap).await?;
    }
    store.put_exchange_snapshot(&snapshot).await?;

    tracing::info!(etag = %snapshot.etag, users, transactions_added, "exchange feed synced");
    Ok(ExchangeOutput { changed: true, etag: Some(snapshot.etag), users, transactions_added })
}
