//! Sheet header detection and normalization.
//!
//! Sellers' spreadsheets have no common layout. Headers may sit in the CSV
//! header row or several rows down under a banner, and the same column goes
//! by many names ("brand", "mfg", "manufacturer"). This module locates the
//! header row, maps header names onto canonical [`Listing`](crate::Listing)
//! fields and converts the remaining rows into listings.

pub mod headers;
pub mod listings;

pub use headers::{
    FIELDS, HeaderCounter, HeaderLocation, HeaderMatch, ParsedSheet, header_counter, header_find, header_format,
    header_match_count, lower_strip, map_headers, parse_sheet, search_rows_for_header, unique_headers,
};
pub use listings::parse_listings;
