//! Reddit search request types and validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::RedditError;

/// Reddit never returns more than this many results for one listing.
pub const MAX_LISTING_RESULTS: usize = 1000;

/// Largest page Reddit serves per request.
pub const PAGE_SIZE: usize = 100;

const MAX_QUERY_CHARS: usize = 512;

/// Subreddit search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Subreddit name without the `r/` prefix.
    pub subreddit: String,

    /// Search query (required, max 512 chars).
    pub q: String,

    /// Result ordering (default relevance).
    pub sort: Option<Sort>,

    /// Time window (default all).
    pub time_filter: Option<TimeFilter>,

    /// Total results across pages (1-1000). `None` follows every page.
    pub limit: Option<usize>,
}

/// Search result ordering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    Relevance,
    Hot,
    Top,
    New,
    Comments,
}

/// Search time window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    All,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Sort {
    pub fn as_str(self) -> &'static str {
        match self {
            Sort::Relevance => "relevance",
            Sort::Hot => "hot",
            Sort::Top => "top",
            Sort::New => "new",
            Sort::Comments => "comments",
        }
    }
}

impl TimeFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeFilter::All => "all",
            TimeFilter::Hour => "hour",
            TimeFilter::Day => "day",
            TimeFilter::Week => "week",
            TimeFilter::Month => "month",
            TimeFilter::Year => "year",
        }
    }
}

impl FromStr for Sort {
    type Err = RedditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relevance" => Ok(Sort::Relevance),
            "hot" => Ok(Sort::Hot),
            "top" => Ok(Sort::Top),
            "new" => Ok(Sort::New),
            "comments" => Ok(Sort::Comments),
            other => Err(RedditError::InvalidRequest(format!(
                "invalid sort '{other}': expected relevance, hot, top, new or comments"
            ))),
        }
    }
}

impl FromStr for TimeFilter {
    type Err = RedditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(TimeFilter::All),
            "hour" => Ok(TimeFilter::Hour),
            "day" => Ok(TimeFilter::Day),
            "week" => Ok(TimeFilter::Week),
            "month" => Ok(TimeFilter::Month),
            "year" => Ok(TimeFilter::Year),
            other => Err(RedditError::InvalidRequest(format!(
                "invalid time filter '{other}': expected all, hour, day, week, month or year"
            ))),
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SearchRequest {
    pub fn new(subreddit: impl Into<String>, q: impl Into<String>) -> Self {
        Self { subreddit: subreddit.into(), q: q.into(), sort: None, time_filter: None, limit: None }
    }

    /// Validate the search request parameters.
    ///
    /// Returns an error if any parameters are out of range or malformed.
    pub fn validate(&self) -> Result<(), RedditError> {
        if self.subreddit.trim().is_empty() {
            return Err(RedditError::InvalidRequest("subreddit cannot be empty".to_string()));
        }

        if self.q.trim().is_empty() {
            return Err(RedditError::InvalidRequest("query cannot be empty".to_string()));
        }

        let chars = self.q.chars().count();
        if chars > MAX_QUERY_CHARS {
            return Err(RedditError::InvalidRequest(format!(
                "query too long: {chars} chars (max {MAX_QUERY_CHARS})"
            )));
        }

        if let Some(limit) = self.limit
            && !(1..=MAX_LISTING_RESULTS).contains(&limit)
        {
            return Err(RedditError::InvalidRequest(format!(
                "invalid limit {limit}: must be 1-{MAX_LISTING_RESULTS}"
            )));
        }

        Ok(())
    }

    /// Get the effective sort (default relevance).
    pub fn get_sort(&self) -> Sort {
        self.sort.unwrap_or(Sort::Relevance)
    }

    /// Get the effective time filter (default all).
    pub fn get_time_filter(&self) -> TimeFilter {
        self.time_filter.unwrap_or(TimeFilter::All)
    }

    /// Get the effective total limit.
    pub fn get_limit(&self) -> usize {
        self.limit.unwrap_or(MAX_LISTING_RESULTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let req = SearchRequest { limit: Some(50), ..SearchRequest::new("discexchange", "spreadsheet") };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_empty_query() {
        let req = SearchRequest::new("discexchange", "  ");
        assert!(matches!(req.validate(), Err(RedditError::InvalidRequest(_))));
    }

    #[test]
    fn test_query_too_long() {
        let req = SearchRequest::new("discexchange", "a".repeat(513));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_invalid_limit() {
        for limit in [0, 1001] {
            let req = SearchRequest { limit: Some(limit), ..SearchRequest::new("discexchange", "sheet") };
            assert!(req.validate().is_err(), "limit {limit} should be rejected");
        }
    }

    #[test]
    fn test_parse_sort_and_time_filter() {
        assert_eq!("NEW".parse::<Sort>().unwrap(), Sort::New);
        assert_eq!("week".parse::<TimeFilter>().unwrap(), TimeFilter::Week);
        assert!("newest".parse::<Sort>().is_err());
        assert!("decade".parse::<TimeFilter>().is_err());
    }

    #[test]
    fn test_defaults() {
        let req = SearchRequest::new("discexchange", "spreadsheet");
        assert_eq!(req.get_sort(), Sort::Relevance);
        assert_eq!(req.get_time_filter(), TimeFilter::All);
        assert_eq!(req.get_limit(), MAX_LISTING_RESULTS);
        assert_eq!(Sort::Comments.to_string(), "comments");
    }
}
