use crate::domain::summary::SignalSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post returned by the feed source for the current cycle only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePost {
    pub id: String,
    pub author: String,
    pub text: String,
    pub url: String,
    pub retrieved_at: DateTime<Utc>,
    pub is_retweet: bool,
    pub is_reply: bool,
}

impl CandidatePost {
    pub fn canonical_url(author: &str, id: &str) -> String {
        format!("https://x.com/{author}/status/{id}")
    }
}

/// Orders post ids the way the feed assigns them: longer numeric ids are newer,
/// equal lengths compare lexically.
pub fn is_newer_post_id(candidate: &str, current: &str) -> bool {
    (candidate.len(), candidate) > (current.len(), current)
}

/// A post that went through the pipeline. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedPost {
    pub post_id: String,
    pub handle: String,
    pub text: String,
    pub url: String,
    pub processed_at: DateTime<Utc>,
    pub summary: Option<SignalSummary>,
}
