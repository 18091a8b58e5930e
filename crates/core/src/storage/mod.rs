pub mod accounts;
pub mod lock;
pub mod processed;
pub mod sessions;

use crate::domain::account::TrackedAccount;
use crate::domain::post::ProcessedPost;
use crate::error::SignalError;
use crate::feed::Session;
use anyhow::Context;
use sqlx::PgPool;

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddAccountOutcome {
    Added(TrackedAccount),
    AlreadyTracked,
}

/// Exclusive right to run a poll cycle against a store, across processes.
#[async_trait::async_trait]
pub trait CycleLease: Send {
    async fn release(self: Box<Self>);
}

/// Durable state shared across cycles and process restarts.
///
/// Handles passed in are expected to be normalized already.
#[async_trait::async_trait]
pub trait SignalStore: Send + Sync {
    /// Tracked accounts ordered by handle.
    async fn list_accounts(&self) -> Result<Vec<TrackedAccount>, SignalError>;

    async fn add_account(
        &self,
        handle: &str,
        user_id: Option<&str>,
    ) -> Result<AddAccountOutcome, SignalError>;

    /// Returns `false` when no such account was tracked.
    async fn remove_account(&self, handle: &str) -> Result<bool, SignalError>;

    /// Moves the marker forward only; an older id leaves it unchanged.
    async fn update_last_seen(&self, handle: &str, post_id: &str) -> Result<(), SignalError>;

    async fn is_processed(&self, post_id: &str) -> Result<bool, SignalError>;

    /// Inserts once; an existing id yields [`SignalError::Conflict`] and leaves
    /// the stored row untouched.
    async fn insert_processed(&self, post: &ProcessedPost) -> Result<(), SignalError>;

    /// `None` when another runner, possibly in another process, holds the lease.
    async fn try_lock_cycle(&self) -> Result<Option<Box<dyn CycleLease>>, SignalError>;

    async fn load_session(&self) -> Result<Option<Session>, SignalError>;

    async fn save_session(&self, session: &Session) -> Result<(), SignalError>;

    async fn clear_session(&self) -> Result<(), SignalError>;
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn processed_post(&self, post_id: &str) -> Result<Option<ProcessedPost>, SignalError> {
        processed::get(&self.pool, post_id).await
    }
}

#[async_trait::async_trait]
impl SignalStore for PgStore {
    async fn list_accounts(&self) -> Result<Vec<TrackedAccount>, SignalError> {
        accounts::list(&self.pool).await
    }

    async fn add_account(
        &self,
        handle: &str,
        user_id: Option<&str>,
    ) -> Result<AddAccountOutcome, SignalError> {
        accounts::insert(&self.pool, handle, user_id).await
    }

    async fn remove_account(&self, handle: &str) -> Result<bool, SignalError> {
        accounts::delete(&self.pool, handle).await
    }

    async fn update_last_seen(&self, handle: &str, post_id: &str) -> Result<(), SignalError> {
        accounts::update_last_seen(&self.pool, handle, post_id).await
    }

    async fn is_processed(&self, post_id: &str) -> Result<bool, SignalError> {
        processed::exists(&self.pool, post_id).await
    }

    async fn insert_processed(&self, post: &ProcessedPost) -> Result<(), SignalError> {
        processed::insert(&self.pool, post).await
    }

    async fn try_lock_cycle(&self) -> Result<Option<Box<dyn CycleLease>>, SignalError> {
        let lease = lock::try_acquire(&self.pool).await?;
        Ok(lease.map(|lease| Box::new(lease) as Box<dyn CycleLease>))
    }

    async fn load_session(&self) -> Result<Option<Session>, SignalError> {
        sessions::load(&self.pool).await
    }

    async fn save_session(&self, session: &Session) -> Result<(), SignalError> {
        sessions::save(&self.pool, session).await
    }

    async fn clear_session(&self) -> Result<(), SignalError> {
        sessions::clear(&self.pool).await
    }
}
