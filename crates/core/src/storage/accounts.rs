use crate::domain::account::TrackedAccount;
use crate::error::SignalError;
use crate::storage::AddAccountOutcome;
use chrono::{DateTime, Utc};

type AccountRow = (
    String,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn from_row(
    (handle, user_id, last_seen_post_id, created_at, updated_at): AccountRow,
) -> TrackedAccount {
    TrackedAccount {
        handle,
        user_id,
        last_seen_post_id,
        created_at,
        updated_at,
    }
}

pub async fn list(pool: &sqlx::PgPool) -> Result<Vec<TrackedAccount>, SignalError> {
    let rows = sqlx::query_as::<_, AccountRow>(
        "SELECT handle, user_id, last_seen_post_id, created_at, updated_at \
         FROM tracked_accounts \
         ORDER BY handle",
    )
    .fetch_all(pool)
    .await
    .map_err(SignalError::storage("select tracked_accounts"))?;

    Ok(rows.into_iter().map(from_row).collect())
}

pub async fn insert(
    pool: &sqlx::PgPool,
    handle: &str,
    user_id: Option<&str>,
) -> Result<AddAccountOutcome, SignalError> {
    let row = sqlx::query_as::<_, AccountRow>(
        "INSERT INTO tracked_accounts (handle, user_id) \
         VALUES ($1, $2) \
         ON CONFLICT (handle) DO NOTHING \
         RETURNING handle, user_id, last_seen_post_id, created_at, updated_at",
    )
    .bind(handle)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(SignalError::storage("insert tracked_accounts"))?;

    Ok(match row {
        Some(row) => AddAccountOutcome::Added(from_row(row)),
        None => AddAccountOutcome::AlreadyTracked,
    })
}

pub async fn delete(pool: &sqlx::PgPool, handle: &str) -> Result<bool, SignalError> {
    let res = sqlx::query("DELETE FROM tracked_accounts WHERE handle = $1")
        .bind(handle)
        .execute(pool)
        .await
        .map_err(SignalError::storage("delete tracked_accounts"))?;
    Ok(res.rows_affected() > 0)
}

pub async fn update_last_seen(
    pool: &sqlx::PgPool,
    handle: &str,
    post_id: &str,
) -> Result<(), SignalError> {
    let res = sqlx::query(
        "UPDATE tracked_accounts \
         SET last_seen_post_id = $2, updated_at = now() \
         WHERE handle = $1 \
           AND (last_seen_post_id IS NULL \
                OR (length($2), $2) > (length(last_seen_post_id), last_seen_post_id))",
    )
    .bind(handle)
    .bind(post_id)
    .execute(pool)
    .await
    .map_err(SignalError::storage("update tracked_accounts.last_seen_post_id"))?;

    if res.rows_affected() == 0 {
        tracing::debug!(%handle, %post_id, "last-seen marker unchanged");
    }
    Ok(())
}
