//! Submission, sheet and seller data model.
//!
//! These types flow through every pipeline stage: the client crate builds
//! them from API responses, the store persists them, and the sheet module
//! derives [`Listing`]s from downloaded [`SheetTable`]s.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Link flair Reddit attaches to buyer requests.
pub const ISO_FLAIR: &str = "In Search Of";

/// Render a UTC timestamp in the given timezone as `YYYY-MM-DD HH:MM`.
pub fn to_local(dt: &DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}

/// Submission author with the trade count parsed from their flair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub flair: u32,
    pub author_flair_text: Option<String>,
}

impl Author {
    pub fn new(name: impl Into<String>, author_flair_text: Option<String>) -> Self {
        let flair = author_flair_text.as_deref().map(parse_flair).unwrap_or(0);
        Self { name: name.into(), flair, author_flair_text }
    }
}

/// Parse a trade count out of flair text.
///
/// `"42 trades"` → 42, `"Trader | 12 trades"` → 12; anything else → 0.
pub fn parse_flair(text: &str) -> u32 {
    let text = text.trim_start();
    let (first, rest) = match text.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, Some(rest)),
        None => (text, None),
    };

    if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) {
        return first.parse().unwrap_or(0);
    }

    rest.and_then(|r| r.split_whitespace().nth(1))
        .and_then(|token| token.parse().ok())
        .unwrap_or(0)
}

/// A subreddit submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub created: DateTime<Utc>,
    pub shortlink: String,
    #[serde(default)]
    pub num_comments: u32,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub author: Option<Author>,
}

impl Post {
    pub fn created_local(&self, tz: Tz) -> String {
        to_local(&self.created, tz)
    }

    /// One-line summary used in log output.
    pub fn summary(&self, tz: Tz) -> String {
        let title: String = self.title.chars().take(50).collect();
        format!("{} - {} - {} - {}", self.created_local(tz), self.id, title, self.shortlink)
    }
}

/// An ISO ("In Search Of") post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsoPost {
    #[serde(flatten)]
    pub post: Post,
    pub link_flair_text: String,
}

/// A submission together with the sheet it links to, if any.
///
/// Stored under `post:{id}` in the key-value store and, once the sheet has
/// been downloaded, under field `sheet:{sheet_id}` of hash `sheets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetPost {
    #[serde(flatten)]
    pub post: Post,
    #[serde(default)]
    pub sheet_id: Option<String>,
    #[serde(default)]
    pub sheet_url: Option<String>,
    #[serde(default)]
    pub sheet_dl_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sheet_raw: Option<SheetTable>,
}

impl SheetPost {
    pub fn new(post: Post, sheet_url: Option<String>, sheet_id: Option<String>) -> Self {
        Self { post, sheet_id, sheet_url, sheet_dl_date: None, sheet_raw: None }
    }

    pub fn seller(&self) -> Option<&str> {
        self.post.author.as_ref().map(|a| a.name.as_str())
    }
}

/// Raw sheet contents as downloaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table with positional headers `"0".."n-1"` where every row is data.
    pub fn positional(rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let headers = (0..width).map(|i| i.to_string()).collect();
        Self { headers, rows }
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.headers.len())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.headers.iter().all(|h| h.trim().is_empty())
    }

    /// Cell at `(row, col)`, empty when the row is short.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// One normalized inventory row from a seller's sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub sheet_id: String,
    pub sheet_url: Option<String>,
    pub row: usize,
    pub seller: Option<String>,
    pub price: Option<f64>,
    pub price_shipped: bool,
    pub manufacturer: Option<String>,
    pub mold: Option<String>,
    pub plastic: Option<String>,
    pub color: Option<String>,
    pub condition: Option<u8>,
    pub ink: bool,
    pub picture: Option<String>,
    pub stamp: Option<String>,
    pub weight: Option<u16>,
    pub sold: bool,
    pub notes: Option<String>,
    pub weight_scaled: Option<u16>,
}

impl Listing {
    /// Document id inside the `listings` collection.
    pub fn document_id(&self) -> String {
        format!("{}:{}", self.sheet_id, self.row)
    }
}

/// A confirmed trade between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub post_id: String,
    pub partner: String,
    #[serde(default)]
    pub comment_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A user's confirmed trade history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSwap {
    pub username: String,
    pub transactions: Vec<Transaction>,
}

impl UserSwap {
    /// Merge transactions from `other`, deduplicating by `(post_id, partner)`.
    ///
    /// Returns the number of transactions added.
    pub fn merge(&mut self, other: UserSwap) -> usize {
        let before = self.transactions.len();
        for tx in other.transactions {
            let known = self
                .transactions
                .iter()
                .any(|t| t.post_id == tx.post_id && t.partner.eq_ignore_ascii_case(&tx.partner));
            if !known {
                self.transactions.push(tx);
            }
        }
        self.transactions.len() - before
    }
}

/// A fetched copy of the exchange feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSnapshot {
    pub etag: String,
    pub data_json: String,
    pub last_updated: DateTime<Utc>,
    pub raw_json: serde_json::Value,
}

impl ExchangeSnapshot {
    /// Interpret the feed as `{ "username": [transaction, ...], ... }`.
    ///
    /// Entries whose value is not an array of transactions are skipped.
    pub fn user_swaps(&self) -> Vec<UserSwap> {
        let Some(users) = self.raw_json.as_object() else {
            return Vec::new();
        };

        users
            .iter()
            .filter_map(|(username, txs)| {
                let transactions: Vec<Transaction> = serde_json::from_value(txs.clone()).ok()?;
                Some(UserSwap { username: username.clone(), transactions })
            })
            .collect()
    }
}
