use sqlx::PgPool;
use uuid::Uuid;
use crate::models::{CreateHolding, Holding};

pub async fn create(
    pool: &PgPool,
    portfolio_id: Uuid,
    symbol: &str,
    input: &CreateHolding,
) -> Result<Holding, sqlx::Error> {
    sqlx::query_as::<_, Holding>(
        "INSERT INTO holdings (id, portfolio_id, symbol, quantity, purchase_price, purchase_date)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id, portfolio_id, symbol, quantity, purchase_price, purchase_date, created_at")
        .bind(Uuid::new_v4())
        .bind(portfolio_id)
        .bind(symbol)
        .bind(input.quantity)
        .bind(input.purchase_price)
        .bind(input.purchase_date)
        .fetch_one(pool)
        .await
}

pub async fn fetch_all(pool: &PgPool, portfolio_id: Uuid) -> Result<Vec<Holding>, sqlx::Error> {
    sqlx::query_as::<_, Holding>(
        "SELECT id, portfolio_id, symbol, quantity, purchase_price, purchase_date, created_at
         FROM holdings
         WHERE portfolio_id = $1
         ORDER BY created_at DESC")
        .bind(portfolio_id)
        .fetch_all(pool)
        .await
}

pub async fn delete(pool: &PgPool, id: Uuid, portfolio_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM holdings WHERE id = $1 AND portfolio_id = $2")
        .bind(id)
        .bind(portfolio_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Every symbol held in any portfolio. Feeds the refresh cycle's tracked set.
pub async fn distinct_symbols(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT DISTINCT symbol FROM holdings")
        .fetch_all(pool)
        .await
}
