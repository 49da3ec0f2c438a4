use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::models::{CreateHolding, CreatePortfolio, Holding, Portfolio, UpdatePortfolio};
use crate::services::quote_service::normalize_symbol;

/// Per-portfolio mutual exclusion for holding mutations. A concurrent add
/// and delete on the same portfolio serialize here; different portfolios
/// proceed independently.
#[derive(Clone, Default)]
pub struct PortfolioLocks {
    locks: Arc<DashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl PortfolioLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn for_portfolio(&self, portfolio_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(portfolio_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

pub async fn create(pool: &PgPool, owner_id: Uuid, input: CreatePortfolio) -> Result<Portfolio, AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("Portfolio name must not be empty".into()));
    }
    db::portfolio_queries::create(pool, owner_id, input).await.map_err(|e| {
        error!("Failed to create portfolio: {}", e);
        AppError::Db(e)
    })
}

pub async fn fetch_all(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Portfolio>, AppError> {
    db::portfolio_queries::fetch_all_for_owner(pool, owner_id)
        .await
        .map_err(AppError::Db)
}

pub async fn fetch_one(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<Portfolio, AppError> {
    db::portfolio_queries::fetch_one(pool, id, owner_id)
        .await
        .map_err(AppError::Db)?
        .ok_or(AppError::NotFound)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    owner_id: Uuid,
    input: UpdatePortfolio,
) -> Result<Portfolio, AppError> {
    db::portfolio_queries::update(pool, id, owner_id, input)
        .await
        .map_err(AppError::Db)?
        .ok_or(AppError::NotFound)
}

/// Deleting a portfolio cascades to exactly its own holdings and snapshots
/// (FK `ON DELETE CASCADE`); other portfolios are untouched.
pub async fn delete(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<(), AppError> {
    let deleted = db::portfolio_queries::delete(pool, id, owner_id)
        .await
        .map_err(AppError::Db)?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn add_holding(
    pool: &PgPool,
    locks: &PortfolioLocks,
    portfolio_id: Uuid,
    owner_id: Uuid,
    input: CreateHolding,
) -> Result<Holding, AppError> {
    // Validate before any mutation.
    if input.quantity <= 0.0 {
        return Err(AppError::Validation("Holding quantity must be positive".into()));
    }
    if input.purchase_price < 0.0 {
        return Err(AppError::Validation("Purchase price must not be negative".into()));
    }
    let symbol = normalize_symbol(&input.symbol);
    if symbol.is_empty() {
        return Err(AppError::Validation("Symbol must not be empty".into()));
    }

    let lock = locks.for_portfolio(portfolio_id);
    let _guard = lock.lock().await;

    // Ownership check inside the critical section so a concurrent delete of
    // the portfolio cannot race the insert.
    fetch_one(pool, portfolio_id, owner_id).await?;

    db::holding_queries::create(pool, portfolio_id, &symbol, &input)
        .await
        .map_err(|e| {
            error!("Failed to add holding to portfolio {}: {}", portfolio_id, e);
            AppError::Db(e)
        })
}

pub async fn list_holdings(
    pool: &PgPool,
    portfolio_id: Uuid,
    owner_id: Uuid,
) -> Result<Vec<Holding>, AppError> {
    fetch_one(pool, portfolio_id, owner_id).await?;
    db::holding_queries::fetch_all(pool, portfolio_id)
        .await
        .map_err(AppError::Db)
}

pub async fn remove_holding(
    pool: &PgPool,
    locks: &PortfolioLocks,
    portfolio_id: Uuid,
    owner_id: Uuid,
    holding_id: Uuid,
) -> Result<(), AppError> {
    let lock = locks.for_portfolio(portfolio_id);
    let _guard = lock.lock().await;

    fetch_one(pool, portfolio_id, owner_id).await?;

    let deleted = db::holding_queries::delete(pool, holding_id, portfolio_id)
        .await
        .map_err(AppError::Db)?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_portfolio_mutations_serialize() {
        let locks = PortfolioLocks::new();
        let id = Uuid::new_v4();

        let first = locks.for_portfolio(id);
        let guard = first.lock().await;

        let second = locks.for_portfolio(id);
        assert!(second.try_lock().is_err(), "same portfolio must contend");
        drop(guard);
        assert!(second.try_lock().is_ok());
    }

    #[tokio::test]
    async fn different_portfolios_do_not_contend() {
        let locks = PortfolioLocks::new();

        let a = locks.for_portfolio(Uuid::new_v4());
        let b = locks.for_portfolio(Uuid::new_v4());

        let _guard_a = a.lock().await;
        assert!(b.try_lock().is_ok());
    }
}
