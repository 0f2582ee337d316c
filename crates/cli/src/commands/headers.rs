//! `headers` command: re-run header detection over every cached sheet.

use clap::Args;
use serde::Serialize;
use sheetfeed_core::sheet::{header_counter, parse_listings, parse_sheet, unique_headers};
use sheetfeed_core::store::SHEETS_HASH;
use sheetfeed_core::{Error, SheetPost, SheetTable, Store};

#[derive(Debug, Clone, Args)]
pub struct HeadersArgs {
    /// Number of most frequent headers to report.
    #[arg(long, default_value_t = 20)]
    pub top: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeaderCount {
    pub header: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeadersOutput {
    pub sheets: usize,
    pub headers_found: usize,
    pub headers_missing: Vec<String>,
    pub listings_stored: usize,
    pub unique_headers: usize,
    pub most_common: Vec<HeaderCount>,
}

pub async fn run(store: &Store, args: &HeadersArgs) -> Result<HeadersOutput, Error> {
    let cached: Vec<(String, SheetPost)> = store.hscan(SHEETS_HASH, "sheet:*").await?;
    tracing::info!(count = cached.len(), "re-parsing cached sheets");

    let mut tables: Vec<SheetTable> = Vec::with_capacity(cached.len());
    let mut headers_found = 0;
    let mut headers_missing = Vec::new();
    let mut listings_stored = 0;

    for (field, post) in &cached {
        let (Some(sheet_id), Some(raw)) = (post.sheet_id.as_deref(), post.sheet_raw.as_ref()) else {
            tracing::warn!(%field, "cached sheet has no data");
            continue;
        };

        let parsed = parse_sheet(sheet_id, raw);
        if parsed.found() {
            headers_found += 1;
        } else {
            tracing::warn!(sheet_id, shape = ?raw.shape(), "no header found");
            headers_missing.push(sheet_id.to_string());
        }

        let listings = parse_listings(&parsed, post);
        listings_stored += store.replace_listings_for_sheet(sheet_id, &listings).await?;
        tables.push(raw.clone());
    }

    let counter = header_counter(&tables);
    let most_common = counter
        .most_common(args.top)
        .into_iter()
        .map(|(header, count)| HeaderCount { header, count })
        .collect();

    Ok(HeadersOutput {
        sheets: tables.len(),
        headers_found,
        headers_missing,
        listings_stored,
        unique_headers: unique_headers(&tables).len(),
        most_common,
    })
}
