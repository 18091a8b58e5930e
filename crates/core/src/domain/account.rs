use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_HANDLE_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedAccount {
    pub handle: String,
    pub user_id: Option<String>,
    pub last_seen_post_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid handle {raw:?}: {reason}")]
pub struct InvalidHandle {
    pub raw: String,
    pub reason: &'static str,
}

/// Lowercases and strips leading `@` markers without validating.
pub fn canonical_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_ascii_lowercase()
}

/// Canonical form of a handle accepted for tracking.
pub fn normalize_handle(raw: &str) -> Result<String, InvalidHandle> {
    let handle = canonical_handle(raw);
    let invalid = |reason| InvalidHandle {
        raw: raw.to_string(),
        reason,
    };

    if handle.is_empty() {
        return Err(invalid("handle is empty"));
    }
    if handle.len() > MAX_HANDLE_LEN {
        return Err(invalid("handle is longer than 15 characters"));
    }
    if !handle
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
    {
        return Err(invalid("handle may only contain letters, digits and '_'"));
    }
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_marker_and_lowercases() {
        assert_eq!(normalize_handle("@ElonMusk").unwrap(), "elonmusk");
        assert_eq!(normalize_handle("  @@Trader_01 ").unwrap(), "trader_01");
    }

    #[test]
    fn rejects_empty_and_malformed_handles() {
        assert_eq!(normalize_handle("@").unwrap_err().reason, "handle is empty");
        assert!(normalize_handle("bad handle").is_err());
        assert!(normalize_handle("way_too_long_handle_x").is_err());
    }

    #[test]
    fn canonical_handle_is_lenient() {
        assert_eq!(canonical_handle("@Some One"), "some one");
    }
}
