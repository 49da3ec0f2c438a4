use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use crate::models::news::{NewsItem, Sentiment};

/// Idempotent insert keyed by fingerprint. Returns rows_affected: 0 means
/// the fingerprint already existed and nothing was written.
#[allow(clippy::too_many_arguments)]
pub async fn insert_item(
    pool: &PgPool,
    fingerprint: &str,
    title: &str,
    source: &str,
    url: Option<&str>,
    published_at: DateTime<Utc>,
    summary: Option<&str>,
    sentiment: Sentiment,
    related_symbols: &[String],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO news_items
             (id, fingerprint, title, source, url, published_at, summary, sentiment, related_symbols)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (fingerprint) DO NOTHING")
        .bind(Uuid::new_v4())
        .bind(fingerprint)
        .bind(title)
        .bind(source)
        .bind(url)
        .bind(published_at)
        .bind(summary)
        .bind(sentiment)
        .bind(related_symbols)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn fingerprint_exists(pool: &PgPool, fingerprint: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM news_items WHERE fingerprint = $1)")
        .bind(fingerprint)
        .fetch_one(pool)
        .await
}

/// Keyset-paginated read, most recent first. Restartable: pass the oldest
/// `published_at` seen so far as `before` to continue the sequence.
pub async fn fetch_by_symbol(
    pool: &PgPool,
    symbol: &str,
    limit: i64,
    before: Option<DateTime<Utc>>,
) -> Result<Vec<NewsItem>, sqlx::Error> {
    sqlx::query_as::<_, NewsItem>(
        "SELECT id, fingerprint, title, source, url, published_at, summary, sentiment,
                related_symbols, created_at
         FROM news_items
         WHERE related_symbols @> ARRAY[$1]
           AND ($3::timestamptz IS NULL OR published_at < $3)
         ORDER BY published_at DESC
         LIMIT $2")
        .bind(symbol)
        .bind(limit)
        .bind(before)
        .fetch_all(pool)
        .await
}
