//! Cross-process poll-cycle lock.
//!
//! Advisory locks belong to the Postgres session that took them, so the lease
//! keeps its pooled connection until release. A lease dropped without release
//! detaches and closes that connection, which ends the session and frees the lock.

use crate::error::SignalError;
use crate::storage::CycleLease;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, Postgres};

const POLL_CYCLE_LOCK_KEY: i64 = 0x5349_474E_414C; // "SIGNAL"

pub async fn try_acquire(pool: &sqlx::PgPool) -> Result<Option<PgCycleLease>, SignalError> {
    let mut conn = pool
        .acquire()
        .await
        .map_err(SignalError::storage("acquire poll-cycle lock connection"))?;

    let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(POLL_CYCLE_LOCK_KEY)
        .fetch_one(&mut *conn)
        .await
        .map_err(SignalError::storage("pg_try_advisory_lock"))?;

    Ok(acquired.then(|| PgCycleLease { conn: Some(conn) }))
}

async fn release(conn: &mut PgConnection) -> Result<(), SignalError> {
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(POLL_CYCLE_LOCK_KEY)
        .execute(conn)
        .await
        .map_err(SignalError::storage("pg_advisory_unlock"))?;
    Ok(())
}

pub struct PgCycleLease {
    conn: Option<PoolConnection<Postgres>>,
}

#[async_trait::async_trait]
impl CycleLease for PgCycleLease {
    async fn release(mut self: Box<Self>) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if let Err(err) = release(&mut conn).await {
            tracing::warn!(error = %err, "failed to release poll-cycle lock; closing its connection");
            drop(conn.detach());
        }
    }
}

impl Drop for PgCycleLease {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}
