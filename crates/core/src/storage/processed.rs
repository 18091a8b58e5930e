use crate::domain::post::ProcessedPost;
use crate::domain::summary::SignalSummary;
use crate::error::SignalError;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

pub async fn exists(pool: &sqlx::PgPool, post_id: &str) -> Result<bool, SignalError> {
    let found: (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM processed_posts WHERE post_id = $1)")
            .bind(post_id)
            .fetch_one(pool)
            .await
            .map_err(SignalError::storage("select processed_posts"))?;
    Ok(found.0)
}

pub async fn insert(pool: &sqlx::PgPool, post: &ProcessedPost) -> Result<(), SignalError> {
    let inserted: Option<(String,)> = sqlx::query_as(
        "INSERT INTO processed_posts (post_id, handle, post_text, post_url, processed_at, summary) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (post_id) DO NOTHING \
         RETURNING post_id",
    )
    .bind(&post.post_id)
    .bind(&post.handle)
    .bind(&post.text)
    .bind(&post.url)
    .bind(post.processed_at)
    .bind(post.summary.as_ref().map(Json))
    .fetch_optional(pool)
    .await
    .map_err(SignalError::storage("insert processed_posts"))?;

    match inserted {
        Some(_) => Ok(()),
        None => Err(SignalError::Conflict {
            post_id: post.post_id.clone(),
        }),
    }
}

pub async fn get(pool: &sqlx::PgPool, post_id: &str) -> Result<Option<ProcessedPost>, SignalError> {
    let row = sqlx::query_as::<
        _,
        (
            String,
            String,
            String,
            String,
            DateTime<Utc>,
            Option<Json<SignalSummary>>,
        ),
    >(
        "SELECT post_id, handle, post_text, post_url, processed_at, summary \
         FROM processed_posts \
         WHERE post_id = $1",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await
    .map_err(SignalError::storage("select processed_posts"))?;

    Ok(row.map(
        |(post_id, handle, text, url, processed_at, summary)| ProcessedPost {
            post_id,
            handle,
            text,
            url,
            processed_at,
            summary: summary.map(|Json(s)| s),
        },
    ))
}
