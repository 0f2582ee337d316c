//! Conversion of normalized sheet rows into [`Listing`]s.

use crate::models::{Listing, SheetPost, SheetTable};

use super::headers::ParsedSheet;

const YES: &[&str] = &["yes", "y", "true", "x", "✓", "✔"];
const NO: &[&str] = &["no", "n", "false", "none", "blank", "-", "n/a", "na"];

/// Column index of each canonical field in a normalized table.
#[derive(Debug, Default)]
struct Columns {
    price: Option<usize>,
    price_shipped: Option<usize>,
    manufacturer: Option<usize>,
    mold: Option<usize>,
    plastic: Option<usize>,
    color: Option<usize>,
    condition: Option<usize>,
    ink: Option<usize>,
    picture: Option<usize>,
    stamp: Option<usize>,
    weight: Option<usize>,
    status: Option<usize>,
    notes: Option<usize>,
    weight_scaled: Option<usize>,
}

impl Columns {
    /// First column carrying each name wins.
    fn locate(table: &SheetTable) -> Self {
        let find = |name: &str| table.headers.iter().position(|h| h == name);
        Self {
            price: find("price"),
            price_shipped: find("price_shipped"),
            manufacturer: find("manufacturer"),
            mold: find("mold"),
            plastic: find("plastic"),
            color: find("color"),
            condition: find("condition"),
            ink: find("ink"),
            picture: find("picture"),
            stamp: find("stamp"),
            weight: find("weight"),
            status: find("status"),
            notes: find("notes"),
            weight_scaled: find("weight_scaled"),
        }
    }
}

/// Build listings from a parsed sheet.
///
/// Sheets without a detected header yield nothing. Rows with neither a mold
/// nor a price are skipped. `row` is the index within the normalized table.
pub fn parse_listings(sheet: &ParsedSheet, post: &SheetPost) -> Vec<Listing> {
    if !sheet.found() {
        return Vec::new();
    }

    let table = &sheet.table;
    let cols = Columns::locate(table);
    let seller = post.seller().map(str::to_string);
    let cell = |row: usize, col: Option<usize>| col.map(|c| table.cell(row, c).trim()).unwrap_or("");

    let mut listings = Vec::new();
    for row in 0..table.rows.len() {
        let mold = text(cell(row, cols.mold));
        let mut price = parse_price(cell(row, cols.price));

        let shipped_cell = cell(row, cols.price_shipped);
        let price_shipped = match parse_price(shipped_cell) {
            Some(shipped) => {
                price.get_or_insert(shipped);
                true
            }
            None => is_yes(shipped_cell),
        };

        if mold.is_none() && price.is_none() {
            continue;
        }

        let status = cell(row, cols.status);
        listings.push(Listing {
            sheet_id: sheet.sheet_id.clone(),
            sheet_url: post.sheet_url.clone(),
            row,
            seller: seller.clone(),
            price,
            price_shipped,
            manufacturer: text(cell(row, cols.manufacturer)),
            mold,
            plastic: text(cell(row, cols.plastic)),
            color: text(cell(row, cols.color)),
            condition: parse_condition(cell(row, cols.condition)),
            ink: parse_ink(cell(row, cols.ink)),
            picture: text(cell(row, cols.picture)),
            stamp: text(cell(row, cols.stamp)),
            weight: leading_int(cell(row, cols.weight)).and_then(|w| u16::try_from(w).ok()),
            sold: is_yes(status) || status.to_lowercase().contains("sold"),
            notes: text(cell(row, cols.notes)),
            weight_scaled: leading_int(cell(row, cols.weight_scaled)).and_then(|w| u16::try_from(w).ok()),
        });
    }

    tracing::debug!(sheet_id = %sheet.sheet_id, count = listings.len(), "listings parsed");
    listings
}

fn text(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn is_yes(value: &str) -> bool {
    YES.contains(&value.trim().to_lowercase().as_str())
}

/// Descriptive ink notes ("rim ink", "name on bottom") count as inked.
fn parse_ink(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    !lower.is_empty() && !NO.contains(&lower.as_str())
}

/// First number in a price cell: `"$1,200"` → 1200.0, `"15 shipped"` → 15.0.
fn parse_price(value: &str) -> Option<f64> {
    let cleaned: String = value.chars().filter(|c| *c != ',' && *c != '$').collect();
    let start = cleaned.find(|c: char| c.is_ascii_digit())?;
    let number: String = cleaned[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number.trim_end_matches('.').parse().ok()
}

/// Leading integer of a cell: `"175g"` → 175, `"173-175"` → 173.
fn leading_int(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Condition on the 1-10 scale; "new" and "unthrown" are a 10.
fn parse_condition(value: &str) -> Option<u8> {
    let lower = value.trim().to_lowercase();
    if lower.starts_with("new") || lower.starts_with("unthrown") {
        return Some(10);
    }
    leading_int(&lower).map(|c| c.min(10) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Author, Post};
    use crate::sheet::parse_sheet;
    use chrono::Utc;

    fn sheet_post() -> SheetPost {
        let post = Post {
            id: "abc".into(),
            title: "[USA-CO] [H] discs [W] paypal".into(),
            created: Utc::now(),
            shortlink: "https://redd.it/abc".into(),
            num_comments: 0,
            score: 1,
            author: Some(Author::new("seller1", Some("12 trades".into()))),
        };
        SheetPost::new(post, Some("https://docs.google.com/spreadsheets/d/s1".into()), Some("s1".into()))
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_listings() {
        let raw = SheetTable::new(
            strings(&["Brand", "Mold", "Plastic", "Cond.", "Weight", "Price", "Ink?", "Sold?"]),
            vec![
                strings(&["Innova", "Destroyer", "Star", "9/10", "175g", "$15", "rim ink", ""]),
                strings(&["", "", "", "", "", "", "", ""]),
                strings(&["Discraft", "Buzzz", "ESP", "New", "177", "1,200", "no", "SOLD"]),
            ],
        );
        let parsed = parse_sheet("s1", &raw);
        let listings = parse_listings(&parsed, &sheet_post());
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.document_id(), "s1:0");
        assert_eq!(first.seller.as_deref(), Some("seller1"));
        assert_eq!(first.manufacturer.as_deref(), Some("Innova"));
        assert_eq!(first.mold.as_deref(), Some("Destroyer"));
        assert_eq!(first.condition, Some(9));
        assert_eq!(first.weight, Some(175));
        assert_eq!(first.price, Some(15.0));
        assert!(first.ink);
        assert!(!first.sold);

        let second = &listings[1];
        assert_eq!(second.row, 2);
        assert_eq!(second.condition, Some(10));
        assert_eq!(second.price, Some(1200.0));
        assert!(!second.ink);
        assert!(second.sold);
    }

    #[test]
    fn test_shipped_price_column() {
        let raw = SheetTable::new(
            strings(&["Mold", "Plastic", "Price (shipped)"]),
            vec![strings(&["Teebird", "Champion", "$20"])],
        );
        let listings = parse_listings(&parse_sheet("s1", &raw), &sheet_post());
        assert_eq!(listings[0].price, Some(20.0));
        assert!(listings[0].price_shipped);
    }

    #[test]
    fn test_no_header_yields_nothing() {
        let raw = SheetTable::new(strings(&["a", "b"]), vec![strings(&["x", "y"])]);
        assert!(parse_listings(&parse_sheet("s1", &raw), &sheet_post()).is_empty());
    }

    #[test]
    fn test_value_parsers() {
        assert_eq!(parse_price("$15.50"), Some(15.5));
        assert_eq!(parse_price("15 shipped"), Some(15.0));
        assert_eq!(parse_price("trade only"), None);
        assert_eq!(leading_int("173-175"), Some(173));
        assert_eq!(leading_int("max"), None);
        assert_eq!(parse_condition("12"), Some(10));
        assert!(is_yes(" Y "));
        assert!(is_yes("✓"));
        assert!(!parse_ink("N/A"));
        assert!(!parse_ink(""));
    }
}
