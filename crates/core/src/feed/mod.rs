pub mod bird;
pub mod session;

use crate::domain::post::CandidatePost;
use crate::error::SignalError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub use bird::BirdFeedSource;
pub use session::StoredSessionProvider;

/// Cookie pair the timeline CLI authenticates with.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub auth_token: String,
    pub ct0: String,
}

impl Session {
    pub fn from_parts(auth_token: Option<&str>, ct0: Option<&str>) -> Option<Self> {
        match (auth_token, ct0) {
            (Some(auth_token), Some(ct0)) => Some(Self {
                auth_token: auth_token.to_string(),
                ct0: ct0.to_string(),
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("auth_token", &"<redacted>")
            .field("ct0", &"<redacted>")
            .finish()
    }
}

#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// A session believed to be valid, re-authenticating if nothing usable is cached.
    async fn session(&self) -> Result<Session, SignalError>;

    /// Forget the current session so the next call re-authenticates.
    async fn invalidate(&self);
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Recent posts authored by one of `handles`, at most `max_posts`, in the
    /// order they should be processed.
    async fn fetch(
        &self,
        session: &Session,
        handles: &BTreeSet<String>,
        max_posts: usize,
    ) -> Result<Vec<CandidatePost>, SignalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_needs_both_cookies() {
        assert!(Session::from_parts(Some("a"), None).is_none());
        assert!(Session::from_parts(None, Some("c")).is_none());
        let s = Session::from_parts(Some("a"), Some("c")).unwrap();
        assert_eq!(s.ct0, "c");
    }

    #[test]
    fn debug_output_hides_cookies() {
        let s = Session::from_parts(Some("secret-auth"), Some("secret-ct0")).unwrap();
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("secret"));
    }
}
