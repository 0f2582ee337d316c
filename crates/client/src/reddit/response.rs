//! Reddit API response types and normalization.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sheetfeed_core::{Author, ISO_FLAIR, IsoPost, Post};

/// A `kind`/`data` envelope.
#[derive(Debug, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

/// Paged listing payload.
#[derive(Debug, Deserialize)]
pub struct ListingData<T> {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<T>>,
}

/// Raw listing response.
pub type ListingResponse<T> = Thing<ListingData<T>>;

/// OAuth token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `/api/v1/me` response.
#[derive(Debug, Deserialize)]
pub struct MeResponse {
    pub name: String,
}

/// A submission as returned by Reddit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: Option<String>,
    pub created_utc: f64,
    #[serde(default)]
    pub num_comments: u32,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub author_flair_text: Option<String>,
    #[serde(default)]
    pub link_flair_text: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
}

impl Submission {
    pub fn created(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.created_utc as i64, 0).unwrap_or_default()
    }

    /// `https://redd.it/{id}`.
    pub fn shortlink(&self) -> String {
        format!("https://redd.it/{}", self.id)
    }

    /// Deleted and suspended accounts have no author.
    pub fn author(&self) -> Option<Author> {
        self.author
            .as_deref()
            .filter(|name| !name.is_empty() && *name != "[deleted]")
            .map(|name| Author::new(name, self.author_flair_text.clone()))
    }

    pub fn is_iso(&self) -> bool {
        self.link_flair_text.as_deref() == Some(ISO_FLAIR)
    }

    /// Convert to an ISO post if the submission carries the ISO flair.
    pub fn to_iso_post(&self) -> Option<IsoPost> {
        self.is_iso()
            .then(|| IsoPost { post: Post::from(self), link_flair_text: ISO_FLAIR.to_string() })
    }
}

impl From<&Submission> for Post {
    fn from(s: &Submission) -> Self {
        Post {
            id: s.id.clone(),
            title: s.title.clone(),
            created: s.created(),
            shortlink: s.shortlink(),
            num_comments: s.num_comments,
            score: s.score,
            author: s.author(),
        }
    }
}

/// A flattened comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: Option<String>,
    pub body: String,
    pub created: DateTime<Utc>,
}

/// Flatten a comment tree (`t1` things with nested `replies` listings).
///
/// `more` stubs are skipped. Comments come out level by level: every
/// top-level comment in thread order, then their replies, and so on.
pub fn flatten_comments(listing: &Value) -> Vec<Comment> {
    let mut out = Vec::new();
    let mut pending = VecDeque::from([listing]);

    while let Some(listing) = pending.pop_front() {
        let Some(children) = listing.pointer("/data/children").and_then(Value::as_array) else {
            continue;
        };

        for data in children
            .iter()
            .filter(|child| child.get("kind").and_then(Value::as_str) == Some("t1"))
            .filter_map(|child| child.get("data"))
        {
            out.push(comment_from(data));
            if let Some(replies) = data.get("replies").filter(|r| r.is_object()) {
                pending.push_back(replies);
            }
        }
    }

    out
}

fn comment_from(data: &Value) -> Comment {
    Comment {
        id: data.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
        author: data
            .get("author")
            .and_then(Value::as_str)
            .filter(|a| *a != "[deleted]")
            .map(str::to_string),
        body: data.get("body").and_then(Value::as_str).unwrap_or_default().to_string(),
        created: data
            .get("created_utc")
            .and_then(Value::as_f64)
            .and_then(|ts| DateTime::from_timestamp(ts as i64, 0))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_FIXTURE: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_def",
            "children": [
                {
                    "kind": "t3",
                    "data": {
                        "id": "abc",
                        "title": "[USA-CO] [H] Sheet [W] PayPal",
                        "selftext": "https://docs.google.com/spreadsheets/d/1AbC/edit",
                        "url": "https://www.reddit.com/r/discexchange/comments/abc/",
                        "created_utc": 1714521600.0,
                        "num_comments": 3,
                        "score": 5,
                        "author": "seller1",
                        "author_flair_text": "42 trades",
                        "link_flair_text": "For Sale"
                    }
                },
                {
                    "kind": "t3",
                    "data": {
                        "id": "def",
                        "title": "ISO a Zone",
                        "created_utc": 1714525200.0,
                        "author": "[deleted]",
                        "link_flair_text": "In Search Of"
                    }
                }
            ]
        }
    }"#;

    #[test]
    fn test_deserialize_listing() {
        let listing: ListingResponse<Submission> = serde_json::from_str(SEARCH_FIXTURE).unwrap();
        assert_eq!(listing.data.after.as_deref(), Some("t3_def"));
        assert_eq!(listing.data.children.len(), 2);
        assert_eq!(listing.data.children[1].data.selftext, "");
    }

    #[test]
    fn test_normalize_to_post() {
        let listing: ListingResponse<Submission> = serde_json::from_str(SEARCH_FIXTURE).unwrap();
        let first = Post::from(&listing.data.children[0].data);
        assert_eq!(first.shortlink, "https://redd.it/abc");
        assert_eq!(first.created.timestamp(), 1714521600);
        let author = first.author.unwrap();
        assert_eq!(author.name, "seller1");
        assert_eq!(author.flair, 42);

        let second = &listing.data.children[1].data;
        assert!(Post::from(second).author.is_none());
        assert!(second.is_iso());
        assert!(second.to_iso_post().is_some());
        assert!(listing.data.children[0].data.to_iso_post().is_none());
    }

    #[test]
    fn test_flatten_comments_skips_more() {
        let json = serde_json::json!({
            "kind": "Listing",
            "data": {
                "children": [
                    {
                        "kind": "t1",
                        "data": {
                            "id": "c1",
                            "author": "buyer",
                            "body": "sheet? https://docs.google.com/spreadsheets/d/xyz",
                            "created_utc": 1714521700.0,
                            "replies": {
                                "kind": "Listing",
                                "data": {
                                    "children": [
                                        {"kind": "t1", "data": {
                                            "id": "c2", "author": "[deleted]", "body": "reply", "replies": ""
                                        }}
                                    ]
                                }
                            }
                        }
                    },
                    {"kind": "more", "data": {"count": 4, "children": ["c9"]}}
                ]
            }
        });

        let comments = flatten_comments(&json);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].id, "c1");
        assert_eq!(comments[1].id, "c2");
        assert!(comments[1].author.is_none());
    }

    fn t1(id: &str, replies: Value) -> Value {
        serde_json::json!({"kind": "t1", "data": {"id": id, "body": id, "replies": replies}})
    }

    fn replies(children: Vec<Value>) -> Value {
        serde_json::json!({"kind": "Listing", "data": {"children": children}})
    }

    #[test]
    fn test_flatten_comments_top_level_first() {
        let json = replies(vec![
            t1("a", replies(vec![t1("a1", replies(vec![t1("a1x", Value::from(""))]))])),
            t1("b", replies(vec![t1("b1", Value::from(""))])),
            t1("c", Value::from("")),
        ]);

        let ids: Vec<String> = flatten_comments(&json).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "b", "c", "a1", "b1", "a1x"]);
    }
}
