//! SQLite-backed stores for raw payloads and structured records.
//!
//! A single database file holds both halves of the pipeline's storage, accessed
//! asynchronously via tokio-rusqlite:
//!
//! - a key-value cache (plain keys plus Redis-style hashes) for raw
//!   submission and sheet payloads
//! - a document store (JSON documents grouped into collections) for
//!   normalized listings, sellers, ISO posts and exchange snapshots
//! - automatic schema migrations and WAL mode

pub mod connection;
pub mod documents;
pub mod kv;
pub mod migrations;

pub use crate::Error;

pub use connection::Store;
pub use documents::collections;
pub use kv::{SHEETS_HASH, post_key, sheet_field};
