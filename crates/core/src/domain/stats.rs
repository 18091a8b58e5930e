use serde::{Deserialize, Serialize};

/// Counters for one poll cycle. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    pub posts_fetched: u32,
    pub posts_processed: u32,
    pub posts_skipped_duplicate: u32,
    pub notifications_sent: u32,
    pub errors: u32,
}

impl CycleStats {
    /// `[fetched, processed, skipped_duplicate, notifications_sent, errors]`
    pub fn as_array(&self) -> [u32; 5] {
        [
            self.posts_fetched,
            self.posts_processed,
            self.posts_skipped_duplicate,
            self.notifications_sent,
            self.errors,
        ]
    }
}
