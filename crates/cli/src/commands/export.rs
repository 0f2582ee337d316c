//! `export` command: write a cached sheet to disk.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use sheetfeed_client::write_csv;
use sheetfeed_core::store::{SHEETS_HASH, sheet_field};
use sheetfeed_core::{Error, SheetPost, Store};

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Id of a downloaded sheet.
    pub sheet_id: String,

    /// Output directory (default: `sheets.export_dir`).
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Omit the date suffix from the file name.
    #[arg(long)]
    pub no_date: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportOutput {
    pub sheet_id: String,
    pub path: PathBuf,
    pub rows: usize,
}

pub async fn run(store: &Store, args: &ExportArgs, dir: &Path) -> Result<ExportOutput, Error> {
    let field = sheet_field(&args.sheet_id);
    let post: SheetPost = store
        .hget(SHEETS_HASH, &field)
        .await?
        .ok_or_else(|| Error::CacheMiss(field.clone()))?;
    let table = post
        .sheet_raw
        .ok_or_else(|| Error::CacheMiss(format!("{field} has no sheet data")))?;

    let path = write_csv(&table, dir, &args.sheet_id, !args.no_date)?;
    Ok(ExportOutput { sheet_id: args.sheet_id.clone(), path, rows: table.rows.len() })
}
