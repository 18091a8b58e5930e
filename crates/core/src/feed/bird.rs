//! Timeline feed via the `bird` CLI.
//!
//! Runs `bird user-tweets <handle> --json -n <N> --auth-token … --ct0 …` once per
//! tracked handle, in handle order.

use crate::domain::post::CandidatePost;
use crate::error::{SignalError, Stage};
use crate::feed::{FeedSource, Session};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::process::ExitStatus;

const DEFAULT_BIN: &str = "bird";
const AUTH_FAILURE_MARKERS: &[&str] = &["401", "unauthorized", "could not authenticate", "bad guest token"];

#[derive(Debug, Clone, Deserialize)]
struct BirdTweet {
    id: String,
    text: String,
    author: BirdAuthor,
    #[serde(default, rename = "inReplyToStatusId")]
    in_reply_to_status_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct BirdAuthor {
    username: String,
}

#[derive(Debug, Clone)]
pub struct BirdFeedSource {
    bin: String,
    posts_per_account: usize,
}

impl BirdFeedSource {
    pub fn new(bin: impl Into<String>, posts_per_account: usize) -> Self {
        Self {
            bin: bin.into(),
            posts_per_account: posts_per_account.max(1),
        }
    }

    pub fn from_env(posts_per_account: usize) -> Self {
        let bin = std::env::var("BIRD_BIN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIN.to_string());
        Self::new(bin, posts_per_account)
    }

    async fn user_tweets(
        &self,
        session: &Session,
        handle: &str,
    ) -> Result<Vec<BirdTweet>, SignalError> {
        let count = self.posts_per_account.to_string();
        let output = tokio::process::Command::new(&self.bin)
            .args([
                "user-tweets",
                handle,
                "--json",
                "-n",
                count.as_str(),
                "--auth-token",
                session.auth_token.as_str(),
                "--ct0",
                session.ct0.as_str(),
            ])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                SignalError::transient(Stage::Feed, format!("{} subprocess error: {e}", self.bin))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(handle, output.status, &stderr));
        }

        serde_json::from_slice::<Vec<BirdTweet>>(&output.stdout).map_err(|e| {
            SignalError::transient(
                Stage::Feed,
                format!("bird user-tweets {handle} printed unexpected JSON: {e}"),
            )
        })
    }
}

#[async_trait::async_trait]
impl FeedSource for BirdFeedSource {
    fn source_name(&self) -> &'static str {
        "bird"
    }

    async fn fetch(
        &self,
        session: &Session,
        handles: &BTreeSet<String>,
        max_posts: usize,
    ) -> Result<Vec<CandidatePost>, SignalError> {
        let mut batches = Vec::with_capacity(handles.len());
        let mut last_err = None;

        for handle in handles {
            match self.user_tweets(session, handle).await {
                Ok(tweets) => batches.push(tweets),
                Err(err) if err.is_session_rejected() => return Err(err),
                Err(err) => {
                    tracing::warn!(%handle, error = %err, "skipping handle for this cycle");
                    last_err = Some(err);
                }
            }
        }

        if batches.is_empty() {
            if let Some(err) = last_err {
                return Err(err);
            }
        }

        Ok(merge_batches(batches, handles, max_posts, Utc::now()))
    }
}

fn classify_failure(handle: &str, status: ExitStatus, stderr: &str) -> SignalError {
    let lowered = stderr.to_ascii_lowercase();
    let detail = format!("bird user-tweets {handle} exited with {status}: {}", stderr.trim());
    if AUTH_FAILURE_MARKERS.iter().any(|m| lowered.contains(m)) {
        SignalError::transient(Stage::Session, detail)
    } else {
        SignalError::transient(Stage::Feed, detail)
    }
}

fn merge_batches(
    batches: Vec<Vec<BirdTweet>>,
    handles: &BTreeSet<String>,
    max_posts: usize,
    retrieved_at: DateTime<Utc>,
) -> Vec<CandidatePost> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut posts = Vec::new();

    for tweet in batches.into_iter().flatten() {
        if posts.len() >= max_posts {
            break;
        }
        let author = tweet.author.username.to_ascii_lowercase();
        if !handles.contains(&author) || !seen.insert(tweet.id.clone()) {
            continue;
        }
        posts.push(CandidatePost {
            url: CandidatePost::canonical_url(&author, &tweet.id),
            is_retweet: tweet.text.starts_with("RT @"),
            is_reply: tweet.in_reply_to_status_id.is_some(),
            id: tweet.id,
            author,
            text: tweet.text,
            retrieved_at,
        });
    }
    posts
}
