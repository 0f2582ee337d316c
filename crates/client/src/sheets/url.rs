//! Sheet URL discovery and id extraction.

use std::sync::LazyLock;

use regex::Regex;

use crate::reddit::{Comment, Submission};

/// Prefix every shared sheet link starts with.
pub const BASE_URL: &str = "https://docs.google.com/";

/// Id patterns, most specific first so `/d/e/{id}` isn't read as id `e`.
static SHEET_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"/spreadsheets/d/e/([a-zA-Z0-9\-_]+)",
        r"/spreadsheets/u/0/d/([a-zA-Z0-9\-_]+)",
        r"key=([^&#]+)",
        r"/spreadsheets/d/([a-zA-Z0-9\-_]+)",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("sheet id pattern compiles"))
    .collect()
});

/// Extract the sheet link from free text.
///
/// Takes the token starting at [`BASE_URL`] up to whitespace, cuts it at `]`
/// (markdown link text), drops a trailing `.`, and strips `\` escapes and `)`.
pub fn clean_url(text: &str) -> Option<String> {
    let start = text.find(BASE_URL)?;
    let mut url = text[start..].split_whitespace().next()?.to_string();

    if let Some(idx) = url.find(']') {
        url.truncate(idx);
    }
    if url.ends_with('.') {
        url.pop();
    }
    let url = url.replace(['\\', ')'], "");

    tracing::trace!(%url, "cleaned sheet url");
    Some(url)
}

/// Sheet link in the submission itself: title, then selftext, then (for link
/// posts without selftext) the link.
pub fn sheet_url_in_submission(submission: &Submission) -> Option<String> {
    if submission.title.contains(BASE_URL) {
        return clean_url(&submission.title);
    }

    if !submission.selftext.is_empty() && submission.selftext.contains(BASE_URL) {
        return clean_url(&submission.selftext);
    }

    submission
        .url
        .as_deref()
        .filter(|url| submission.selftext.is_empty() && url.contains(BASE_URL))
        .map(str::to_string)
}

/// Find the sheet link of a submission, falling back to comment bodies in order.
pub fn find_sheet_url(submission: &Submission, comments: &[Comment]) -> Option<String> {
    let found = sheet_url_in_submission(submission).or_else(|| {
        comments
            .iter()
            .find(|c| c.body.contains(BASE_URL))
            .and_then(|c| clean_url(&c.body))
    });

    if found.is_none() {
        tracing::warn!(id = %submission.id, title = %submission.title, "no sheet found in post");
    }
    found
}

/// Extract the sheet id from a shared link.
///
/// Links to Google Docs documents (sheets pasted into a doc) have no id.
pub fn sheet_id_from_url(url: &str) -> Option<String> {
    let id = SHEET_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    if id.is_none() {
        tracing::error!(%url, "no valid sheet id in url");
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn submission(title: &str, selftext: &str, url: Option<&str>) -> Submission {
        Submission {
            id: "abc".into(),
            title: title.into(),
            selftext: selftext.into(),
            url: url.map(str::to_string),
            created_utc: 0.0,
            num_comments: 0,
            score: 0,
            author: Some("seller".into()),
            author_flair_text: None,
            link_flair_text: None,
            permalink: None,
        }
    }

    fn comment(body: &str) -> Comment {
        Comment { id: "c".into(), author: Some("seller".into()), body: body.into(), created: Utc::now() }
    }

    #[test]
    fn test_clean_url_markdown_link() {
        let text = concat!(
            "My sheet: [https://docs.google.com/spreadsheets/d/abc\\_def/edit]",
            "(https://docs.google.com/spreadsheets/d/abc\\_def/edit) thanks"
        );
        assert_eq!(clean_url(text).unwrap(), "https://docs.google.com/spreadsheets/d/abc_def/edit");
    }

    #[test]
    fn test_clean_url_trailing_period_and_paren() {
        assert_eq!(
            clean_url("see (https://docs.google.com/spreadsheets/d/xyz).").unwrap(),
            "https://docs.google.com/spreadsheets/d/xyz"
        );
        assert_eq!(
            clean_url("here https://docs.google.com/spreadsheets/d/xyz.").unwrap(),
            "https://docs.google.com/spreadsheets/d/xyz"
        );
        assert!(clean_url("no link here").is_none());
    }

    #[test]
    fn test_find_sheet_url_order() {
        let in_title = submission(
            "[H] https://docs.google.com/spreadsheets/d/t1 [W] $",
            "https://docs.google.com/spreadsheets/d/s1",
            None,
        );
        assert_eq!(find_sheet_url(&in_title, &[]).unwrap(), "https://docs.google.com/spreadsheets/d/t1");

        let in_self = submission("[H] discs", "sheet https://docs.google.com/spreadsheets/d/s1", None);
        assert_eq!(find_sheet_url(&in_self, &[]).unwrap(), "https://docs.google.com/spreadsheets/d/s1");

        let link_post = submission("[H] discs", "", Some("https://docs.google.com/spreadsheets/d/l1/edit?usp=sharing"));
        assert_eq!(
            find_sheet_url(&link_post, &[]).unwrap(),
            "https://docs.google.com/spreadsheets/d/l1/edit?usp=sharing"
        );

        let in_comment =
            submission("[H] discs", "ask for the list", Some("https://docs.google.com/spreadsheets/d/ignored"));
        let comments = [comment("first!"), comment("list: https://docs.google.com/spreadsheets/d/c1")];
        assert_eq!(find_sheet_url(&in_comment, &comments).unwrap(), "https://docs.google.com/spreadsheets/d/c1");

        assert!(find_sheet_url(&submission("[H] discs", "", None), &[comment("pm me")]).is_none());
    }

    #[test]
    fn test_sheet_id_from_url() {
        let cases = [
            ("https://docs.google.com/spreadsheets/d/MGAxiQwHHr2tSZk2/edit?usp=sharing", Some("MGAxiQwHHr2tSZk2")),
            ("https://docs.google.com/spreadsheets/d/0yZXBYG0UrV0TMcQ", Some("0yZXBYG0UrV0TMcQ")),
            ("https://docs.google.com/spreadsheets/u/0/d/G9gxw9li-_qtp/htmlview", Some("G9gxw9li-_qtp")),
            ("https://docs.google.com/spreadsheets/d/e/WVZM4GpYtAeR/pubhtml", Some("WVZM4GpYtAeR")),
            ("https://docs.google.com/spreadsheet/ccc?key=0Ak123abc&usp=sharing#gid=0", Some("0Ak123abc")),
            ("https://docs.google.com/document/d/mePFEWTzMxpL/edit", None),
        ];
        for (url, expected) in cases {
            assert_eq!(sheet_id_from_url(url).as_deref(), expected, "{url}");
        }
    }
}
