//! Idempotent "seen this post?" checks backed by the durable store.
//!
//! No in-memory cache: the store is the only source of truth, and it survives
//! restarts between cycles.

use crate::domain::post::{CandidatePost, ProcessedPost};
use crate::domain::summary::SignalSummary;
use crate::error::SignalError;
use crate::storage::SignalStore;
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct Deduplicator {
    store: Arc<dyn SignalStore>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn SignalStore>) -> Self {
        Self { store }
    }

    pub async fn is_processed(&self, post_id: &str) -> Result<bool, SignalError> {
        self.store.is_processed(post_id).await
    }

    /// Records `post` as processed.
    ///
    /// Fails with [`SignalError::Conflict`] when the id was already recorded,
    /// and with [`SignalError::Storage`] on I/O failure.
    pub async fn mark_processed(
        &self,
        post: &CandidatePost,
        summary: Option<&SignalSummary>,
    ) -> Result<ProcessedPost, SignalError> {
        let record = ProcessedPost {
            post_id: post.id.clone(),
            handle: post.author.clone(),
            text: post.text.clone(),
            url: post.url.clone(),
            processed_at: Utc::now(),
            summary: summary.cloned(),
        };
        self.store.insert_processed(&record).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candidate, MemoryStore};

    #[tokio::test]
    async fn marked_ids_stay_processed_across_restart() {
        let store = MemoryStore::default();
        let dedup = Deduplicator::new(Arc::new(store.clone()));

        for id in ["1", "22", "333"] {
            assert!(!dedup.is_processed(id).await.unwrap());
            dedup
                .mark_processed(&candidate(id, "alice", "text"), None)
                .await
                .unwrap();
            assert!(dedup.is_processed(id).await.unwrap());
        }

        let restarted = Deduplicator::new(Arc::new(store.restart()));
        for id in ["1", "22", "333"] {
            assert!(restarted.is_processed(id).await.unwrap());
        }
        assert!(!restarted.is_processed("4444").await.unwrap());
    }

    #[tokio::test]
    async fn second_mark_conflicts_and_keeps_first_record() {
        let store = MemoryStore::default();
        let dedup = Deduplicator::new(Arc::new(store.clone()));
        let post = candidate("42", "alice", "first");

        dedup.mark_processed(&post, None).await.unwrap();
        let again = candidate("42", "alice", "second");
        let err = dedup.mark_processed(&again, None).await.unwrap_err();

        assert!(matches!(err, SignalError::Conflict { ref post_id } if post_id == "42"));
        assert_eq!(store.processed_count(), 1);
        assert_eq!(store.processed("42").map(|p| p.text), Some("first".to_string()));
    }

    #[tokio::test]
    async fn storage_failures_surface_as_storage_errors() {
        let store = MemoryStore::default();
        store.fail_inserts(true);
        let dedup = Deduplicator::new(Arc::new(store.clone()));

        let err = dedup
            .mark_processed(&candidate("7", "bob", "t"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SignalError::Storage { .. }));
        assert!(!dedup.is_processed("7").await.unwrap());
    }
}
