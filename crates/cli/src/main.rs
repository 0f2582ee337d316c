//! sheetfeed entry point.
//!
//! Command output is printed to stdout as JSON; logs go to stderr and the
//! rotating log file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use sheetfeed_core::{AppConfig, Store};

mod commands;
mod logging;

use commands::Command;

#[derive(Debug, Parser)]
#[command(name = "sheetfeed", version, about = "Collect sheet listings and ISO posts from a trading subreddit")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "FILE", env = "SHEETFEED_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// SQLite database path (overrides `db_path`).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Emit JSON logs on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let _guard = logging::init(&config.log_dir, cli.verbose, cli.log_json);
    tracing::debug!(db = %config.db_path.display(), subreddit = %config.reddit.subreddit, "configuration loaded");

    let store = Store::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;

    let output = commands::dispatch(cli.command, &config, &store).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sheets_flags() {
        let cli = Cli::parse_from([
            "sheetfeed", "-vv", "--db", "/tmp/x.sqlite", "sheets", "--sort", "new", "--time-filter", "week", "--limit",
            "50",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.sqlite")));
        let Command::Sheets(args) = cli.command else {
            panic!("expected sheets");
        };
        assert_eq!(args.query, "spreadsheet");
        assert_eq!(args.limit, Some(50));
    }

    #[test]
    fn test_rejects_unknown_sort() {
        assert!(Cli::try_parse_from(["sheetfeed", "sheets", "--sort", "sideways"]).is_err());
    }
}
