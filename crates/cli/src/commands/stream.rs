//! `stream` command: follow the subreddit's `/new` listing.

use std::time::Duration;

use chrono_tz::Tz;
use clap::Args;
use serde::Serialize;
use sheetfeed_client::{RedditError, SubmissionSource, SubmissionStream};
use sheetfeed_core::{Error, Post, Store};

#[derive(Debug, Clone, Args)]
pub struct StreamArgs {
    /// Seconds between polls.
    #[arg(long, default_value_t = 30)]
    pub interval_secs: u64,

    /// Stop after this many polls (default: run until Ctrl-C).
    #[arg(long)]
    pub max_polls: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamOutput {
    pub polls: u64,
    pub submissions: usize,
    pub iso_posts: usize,
    pub failed_polls: u64,
}

pub async fn run(
    store: &Store, reddit: &dyn SubmissionSource, subreddit: &str, args: &StreamArgs, tz: Tz,
) -> Result<StreamOutput, Error> {
    let mut stream = SubmissionStream::new(reddit, subreddit);
    let mut output = StreamOutput::default();
    let interval = Duration::from_secs(args.interval_secs);

    tracing::info!(subreddit, interval_secs = args.interval_secs, "streaming new submissions");

    loop {
        match stream.poll().await {
            Ok(batch) => {
                for submission in &batch {
                    match submission.to_iso_post() {
                        Some(iso) => {
                            tracing::info!("ISO: {}", iso.post.summary(tz));
                            store.upsert_iso_post(&iso).await?;
                            output.iso_posts += 1;
                        }
                        None => tracing::info!("POST: {}", Post::from(submission).summary(tz)),
                    }
                }
                output.submissions += batch.len();
            }
            Err(e @ (RedditError::AuthError(_) | RedditError::MissingCredentials(_))) => return Err(e.into()),
            Err(e) => {
                output.failed_polls += 1;
                tracing::warn!(error = %e, "poll failed, retrying next interval");
            }
        }
        output.polls += 1;

        if args.max_polls.is_some_and(|max| output.polls >= max) {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    tracing::info!(?output, "stream stopped");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{FakeReddit, iso_submission, submission};
    use sheetfeed_core::store::collections;

    fn args(max_polls: u64) -> StreamArgs {
        StreamArgs { interval_secs: 0, max_polls: Some(max_polls) }
    }

    #[tokio::test]
    async fn test_stream_survives_transient_errors() {
        let store = Store::open_in_memory().await.unwrap();
        let reddit = FakeReddit::with_new(vec![
            Ok(vec![submission("a", "[H] discs", "", 1.0), iso_submission("b", 2.0)]),
            Err(RedditError::Timeout),
            Ok(vec![submission("a", "[H] discs", "", 1.0), submission("c", "[H] more", "", 3.0)]),
        ]);

        let output = run(&store, &reddit, "discexchange", &args(3), chrono_tz::UTC)
            .await
            .unwrap();
        assert_eq!(output, StreamOutput { polls: 3, submissions: 3, iso_posts: 1, failed_polls: 1 });
        assert_eq!(store.count_documents(collections::ISO_POSTS).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stream_stops_on_auth_error() {
        let store = Store::open_in_memory().await.unwrap();
        let reddit = FakeReddit::with_new(vec![Err(RedditError::AuthError("token revoked".into()))]);

        let result = run(&store, &reddit, "discexchange", &args(5), chrono_tz::UTC).await;
        assert!(matches!(result, Err(Error::RedditAuth(_))));
    }
}
