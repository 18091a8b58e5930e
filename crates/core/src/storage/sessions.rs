use crate::error::SignalError;
use crate::feed::Session;
use sqlx::types::Json;

pub async fn load(pool: &sqlx::PgPool) -> Result<Option<Session>, SignalError> {
    let row: Option<(Json<Session>,)> =
        sqlx::query_as("SELECT cookies FROM feed_sessions WHERE id = 1")
            .fetch_optional(pool)
            .await
            .map_err(SignalError::storage("select feed_sessions"))?;
    Ok(row.map(|(Json(session),)| session))
}

pub async fn save(pool: &sqlx::PgPool, session: &Session) -> Result<(), SignalError> {
    sqlx::query(
        "INSERT INTO feed_sessions (id, cookies, refreshed_at) \
         VALUES (1, $1, now()) \
         ON CONFLICT (id) DO UPDATE SET \
           cookies = EXCLUDED.cookies, \
           refreshed_at = EXCLUDED.refreshed_at",
    )
    .bind(Json(session))
    .execute(pool)
    .await
    .map_err(SignalError::storage("upsert feed_sessions"))?;
    Ok(())
}

pub async fn clear(pool: &sqlx::PgPool) -> Result<(), SignalError> {
    sqlx::query("DELETE FROM feed_sessions")
        .execute(pool)
        .await
        .map_err(SignalError::storage("delete feed_sessions"))?;
    Ok(())
}
