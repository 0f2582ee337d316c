//! Header row discovery and canonical name mapping.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::SheetTable;

/// Canonical listing field names, in declaration order.
pub const FIELDS: [&str; 16] = [
    "price",
    "manufacturer",
    "mold",
    "plastic",
    "color",
    "condition",
    "ink",
    "picture",
    "price_shipped",
    "stamp",
    "weight",
    "status",
    "notes",
    "weight_scaled",
    "sheet_id",
    "sheet_url",
];

/// Synonyms per canonical field. Table order decides substring ties, so
/// `price_shipped` precedes `price` to claim "price (shipped)".
const SYNONYMS: &[(&str, &[&str])] = &[
    ("price_shipped", &["shipp"]),
    ("price", &["price", "bin", "buy it now", "amount", "cost"]),
    ("manufacturer", &["manuf", "company", "brand", "mfg"]),
    ("mold", &["mold", "mold name", "model", "disc", "name"]),
    ("plastic", &["plastic"]),
    ("color", &["color", "colour"]),
    ("condition", &["condition", "cond.", "rating"]),
    ("ink", &["ink", "marked"]),
    ("picture", &["image", "photo", "pic"]),
    ("stamp", &["stamp"]),
    ("weight", &["weight", "grams"]),
    ("status", &["status", "sold"]),
    ("notes", &["note", "comment", "details"]),
    ("weight_scaled", &["scale"]),
];

/// Header minimum for the CSV header row to count as the real header.
const COLUMN_MIN_MATCHES: usize = 2;

/// A data row must beat this many matches to be promoted to header.
const ROW_MIN_MATCHES_EXCLUSIVE: usize = 2;

/// Where a sheet's header was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderLocation {
    /// The CSV header row.
    Column,
    /// A data row, by index.
    Row(usize),
}

/// Result of [`header_find`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMatch {
    pub loc: HeaderLocation,
    /// Lowercased, trimmed header values.
    pub col_values: Vec<String>,
    pub match_count: usize,
}

/// A sheet after header detection and normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSheet {
    pub sheet_id: String,
    pub header: Option<HeaderMatch>,
    /// Headers were rewritten to canonical names.
    pub col_trans: bool,
    pub table: SheetTable,
}

impl ParsedSheet {
    pub fn found(&self) -> bool {
        self.header.is_some()
    }

    pub fn match_count(&self) -> usize {
        self.header.as_ref().map(|h| h.match_count).unwrap_or(0)
    }
}

/// Lowercase and trim each value.
pub fn lower_strip<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values.iter().map(|v| v.as_ref().trim().to_lowercase()).collect()
}

/// Sorted distinct normalized headers across tables.
pub fn unique_headers(tables: &[SheetTable]) -> Vec<String> {
    tables
        .iter()
        .flat_map(|t| lower_strip(&t.headers))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Header frequency table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderCounter {
    counts: HashMap<String, usize>,
}

impl HeaderCounter {
    pub fn get(&self, header: &str) -> usize {
        self.counts.get(header).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The `n` most frequent headers, ties broken alphabetically.
    pub fn most_common(&self, n: usize) -> Vec<(String, usize)> {
        let mut entries: Vec<(String, usize)> = self.counts.iter().map(|(h, c)| (h.clone(), *c)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }
}

/// Count normalized headers, ignoring placeholder (`unnamed:*`) and positional (leading digit) names.
pub fn header_counter(tables: &[SheetTable]) -> HeaderCounter {
    let mut counts = HashMap::new();
    for header in tables.iter().flat_map(|t| lower_strip(&t.headers)) {
        if header.contains("unnamed:") || header.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        *counts.entry(header).or_insert(0) += 1;
    }
    HeaderCounter { counts }
}

/// Number of distinct values in `row` that are canonical field names.
pub fn header_match_count<S: AsRef<str>>(row: &[S]) -> usize {
    row.iter()
        .map(AsRef::as_ref)
        .filter(|v| FIELDS.contains(v))
        .collect::<HashSet<_>>()
        .len()
}

/// Index of the first data row containing any canonical field name.
pub fn search_rows_for_header(table: &SheetTable) -> Option<usize> {
    table
        .rows
        .iter()
        .position(|row| lower_strip(row).iter().any(|v| FIELDS.contains(&v.as_str())))
}

/// Locate the header of a sheet.
///
/// The CSV header row wins with at least two canonical names. Otherwise the
/// first data row naming any canonical field is tried, and must carry more
/// than two canonical names.
pub fn header_find(table: &SheetTable) -> Option<HeaderMatch> {
    let cols = lower_strip(&table.headers);
    let count = header_match_count(&cols);
    if count >= COLUMN_MIN_MATCHES {
        return Some(HeaderMatch { loc: HeaderLocation::Column, col_values: cols, match_count: count });
    }

    let idx = search_rows_for_header(table)?;
    let cols = lower_strip(&table.rows[idx]);
    let count = header_match_count(&cols);
    (count > ROW_MIN_MATCHES_EXCLUSIVE).then_some(HeaderMatch {
        loc: HeaderLocation::Row(idx),
        col_values: cols,
        match_count: count,
    })
}

/// Map one header to its canonical field, if any.
///
/// Exact synonym matches are tried across all fields before substring matches.
fn map_header(header: &str) -> Option<&'static str> {
    let lower = header.trim().to_lowercase();
    if FIELDS.contains(&lower.as_str()) {
        return FIELDS.iter().find(|f| **f == lower).copied();
    }
    SYNONYMS
        .iter()
        .find(|(_, synonyms)| synonyms.contains(&lower.as_str()))
        .or_else(|| {
            SYNONYMS
                .iter()
                .find(|(_, synonyms)| synonyms.iter().any(|s| lower.contains(s)))
        })
        .map(|(field, _)| *field)
}

/// Map headers onto canonical field names; unmapped headers are kept verbatim.
///
/// Always returns one output per input header.
pub fn map_headers<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    headers
        .iter()
        .map(|h| map_header(h.as_ref()).map(str::to_string).unwrap_or_else(|| h.as_ref().to_string()))
        .collect()
}

/// Promote the found header and rewrite it to canonical names.
///
/// For a header found in a data row, that row and everything above it are dropped.
pub fn header_format(table: &SheetTable, header: &HeaderMatch) -> SheetTable {
    let mut col_values = header.col_values.clone();
    let rows = match header.loc {
        HeaderLocation::Column => table.rows.clone(),
        HeaderLocation::Row(idx) => table.rows.iter().skip(idx + 1).cloned().collect(),
    };

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    while col_values.len() < width {
        col_values.push(String::new());
    }

    SheetTable::new(map_headers(&col_values), rows)
}

/// Detect and normalize the header of a downloaded sheet.
pub fn parse_sheet(sheet_id: &str, table: &SheetTable) -> ParsedSheet {
    match header_find(table) {
        Some(header) => {
            let formatted = header_format(table, &header);
            let col_trans = formatted.headers != header.col_values;
            tracing::debug!(
                sheet_id,
                loc = ?header.loc,
                match_count = header.match_count,
                old = ?header.col_values,
                new = ?formatted.headers,
                "header normalized"
            );
            ParsedSheet { sheet_id: sheet_id.to_string(), header: Some(header), col_trans, table: formatted }
        }
        None => {
            tracing::debug!(sheet_id, "no header found");
            ParsedSheet { sheet_id: sheet_id.to_string(), header: None, col_trans: false, table: table.clone() }
        }
    }
}
