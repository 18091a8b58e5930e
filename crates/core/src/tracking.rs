//! Tracked-account management shared by the HTTP and CLI surfaces.

use crate::domain::account::{canonical_handle, normalize_handle, InvalidHandle, TrackedAccount};
use crate::error::SignalError;
use crate::storage::{AddAccountOutcome, SignalStore};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error(transparent)]
    InvalidHandle(#[from] InvalidHandle),

    #[error("@{0} is already tracked")]
    AlreadyTracked(String),

    #[error(transparent)]
    Store(#[from] SignalError),
}

pub async fn track(
    store: &dyn SignalStore,
    raw_handle: &str,
    user_id: Option<&str>,
) -> Result<TrackedAccount, TrackError> {
    let handle = normalize_handle(raw_handle)?;
    match store.add_account(&handle, user_id).await? {
        AddAccountOutcome::Added(account) => {
            tracing::info!(%handle, "tracking account");
            Ok(account)
        }
        AddAccountOutcome::AlreadyTracked => Err(TrackError::AlreadyTracked(handle)),
    }
}

/// Returns the canonical handle and whether anything was removed.
pub async fn untrack(
    store: &dyn SignalStore,
    raw_handle: &str,
) -> Result<(String, bool), SignalError> {
    let handle = canonical_handle(raw_handle);
    let removed = store.remove_account(&handle).await?;
    if removed {
        tracing::info!(%handle, "stopped tracking account");
    }
    Ok((handle, removed))
}

pub async fn list(store: &dyn SignalStore) -> Result<Vec<TrackedAccount>, SignalError> {
    store.list_accounts().await
}
