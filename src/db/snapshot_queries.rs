use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use crate::models::ValuationSnapshot;

/// Append one point to a portfolio's series. The series is never rewritten;
/// old points only leave through `prune_older_than`.
pub async fn insert(
    pool: &PgPool,
    portfolio_id: Uuid,
    market_value: f64,
    cost_basis: f64,
    unrealized_pnl: f64,
    incomplete: bool,
) -> Result<ValuationSnapshot, sqlx::Error> {
    sqlx::query_as::<_, ValuationSnapshot>(
        "INSERT INTO valuation_snapshots
             (id, portfolio_id, market_value, cost_basis, unrealized_pnl, incomplete)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id, portfolio_id, market_value, cost_basis, unrealized_pnl, incomplete, sampled_at")
        .bind(Uuid::new_v4())
        .bind(portfolio_id)
        .bind(market_value)
        .bind(cost_basis)
        .bind(unrealized_pnl)
        .bind(incomplete)
        .fetch_one(pool)
        .await
}

pub async fn fetch_series(
    pool: &PgPool,
    portfolio_id: Uuid,
    since: DateTime<Utc>,
) -> Result<Vec<ValuationSnapshot>, sqlx::Error> {
    sqlx::query_as::<_, ValuationSnapshot>(
        "SELECT id, portfolio_id, market_value, cost_basis, unrealized_pnl, incomplete, sampled_at
         FROM valuation_snapshots
         WHERE portfolio_id = $1 AND sampled_at >= $2
         ORDER BY sampled_at ASC")
        .bind(portfolio_id)
        .bind(since)
        .fetch_all(pool)
        .await
}

/// Rolling retention: drop points older than the cutoff across all series.
pub async fn prune_older_than(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM valuation_snapshots WHERE sampled_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
