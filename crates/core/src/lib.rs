//! Core types and shared functionality for sheetfeed.
//!
//! This crate provides:
//! - Key-value and document stores with a SQLite backend
//! - Unified error types
//! - Configuration structures
//! - The submission/sheet data model and sheet header normalization

pub mod config;
pub mod error;
pub mod models;
pub mod sheet;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use models::{
    Author, ExchangeSnapshot, IsoPost, Listing, Post, SheetPost, SheetTable, Transaction, UserSwap, ISO_FLAIR, to_local,
};
pub use store::Store;
