use std::fmt;
use thiserror::Error;

/// External call site a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Session,
    Feed,
    Summarize,
    Notify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Session => "session",
            Stage::Feed => "feed",
            Stage::Summarize => "summarize",
            Stage::Notify => "notify",
        };
        f.write_str(s)
    }
}

/// Errors crossing the collaborator seams of a poll cycle.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Network failure, timeout, 5xx or 429 from an external service.
    #[error("{stage} call failed: {detail}")]
    Transient { stage: Stage, detail: String },

    /// The service refused the request outright (4xx other than 429).
    #[error("{stage} request rejected: {detail}")]
    Rejected { stage: Stage, detail: String },

    /// The service answered, but its structured output did not validate.
    #[error("{stage} returned malformed output: {detail}")]
    Parse { stage: Stage, detail: String },

    /// The post id is already in the processed store.
    #[error("post {post_id} is already processed")]
    Conflict { post_id: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage error during {context}: {source}")]
    Storage {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl SignalError {
    pub fn transient(stage: Stage, detail: impl Into<String>) -> Self {
        Self::Transient {
            stage,
            detail: detail.into(),
        }
    }

    pub fn rejected(stage: Stage, detail: impl Into<String>) -> Self {
        Self::Rejected {
            stage,
            detail: detail.into(),
        }
    }

    /// Transient for 5xx and 429, rejected for any other unsuccessful status.
    pub fn from_status(stage: Stage, status: reqwest::StatusCode, detail: impl Into<String>) -> Self {
        if is_retryable_status(status) {
            Self::transient(stage, detail)
        } else {
            Self::rejected(stage, detail)
        }
    }

    pub fn parse(stage: Stage, detail: impl Into<String>) -> Self {
        Self::Parse {
            stage,
            detail: detail.into(),
        }
    }

    /// For use with `map_err`: `.map_err(SignalError::storage("insert processed_posts"))`.
    pub fn storage(context: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Storage { context, source }
    }

    /// Only transient and parse failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Parse { .. })
    }

    /// The feed reports a rejected session as a session-stage failure.
    pub fn is_session_rejected(&self) -> bool {
        matches!(
            self,
            Self::Transient {
                stage: Stage::Session,
                ..
            }
        )
    }
}

pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}
