//! `iso` command: collect "In Search Of" posts from the newest submissions.

use chrono_tz::Tz;
use clap::Args;
use serde::Serialize;
use sheetfeed_client::SubmissionSource;
use sheetfeed_core::{Error, IsoPost, Store};

#[derive(Debug, Clone, Args)]
pub struct IsoArgs {
    /// Number of newest submissions to inspect.
    #[arg(long, default_value_t = 25)]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IsoOutput {
    pub inspected: usize,
    pub iso_posts: Vec<IsoPost>,
}

pub async fn run(
    store: &Store, reddit: &dyn SubmissionSource, subreddit: &str, args: &IsoArgs, tz: Tz,
) -> Result<IsoOutput, Error> {
    if args.limit == 0 {
        return Err(Error::InvalidInput("limit must be at least 1".to_string()));
    }

    let submissions = reddit.new_submissions(subreddit, Some(args.limit)).await?;
    let mut iso_posts = Vec::new();

    for iso in submissions.iter().filter_map(|s| s.to_iso_post()) {
        tracing::info!("ISO: {}", iso.post.summary(tz));
        store.upsert_iso_post(&iso).await?;
        iso_posts.push(iso);
    }

    tracing::info!(inspected = submissions.len(), iso = iso_posts.len(), "iso scan complete");
    Ok(IsoOutput { inspected: submissions.len(), iso_posts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{FakeReddit, iso_submission, submission};
    use sheetfeed_core::store::collections;

    #[tokio::test]
    async fn test_only_iso_posts_are_stored() {
        let store = Store::open_in_memory().await.unwrap();
        let reddit = FakeReddit::with_new(vec![Ok(vec![
            iso_submission("i1", 3.0),
            submission("s1", "[H] discs", "", 2.0),
            iso_submission("i2", 1.0),
        ])]);

        let output = run(&store, &reddit, "discexchange", &IsoArgs { limit: 25 }, chrono_tz::UTC)
            .await
            .unwrap();
        assert_eq!(output.inspected, 3);
        assert_eq!(output.iso_posts.len(), 2);
        assert_eq!(output.iso_posts[0].post.id, "i1");
        assert_eq!(store.count_documents(collections::ISO_POSTS).await.unwrap(), 2);

        run(&store, &reddit, "discexchange", &IsoArgs { limit: 25 }, chrono_tz::UTC)
            .await
            .unwrap();
        assert_eq!(store.count_documents(collections::ISO_POSTS).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let store = Store::open_in_memory().await.unwrap();
        let reddit = FakeReddit::default();
        let result = run(&store, &reddit, "discexchange", &IsoArgs { limit: 0 }, chrono_tz::UTC).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
