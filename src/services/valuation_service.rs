use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::models::{Holding, HoldingValuation, QuoteResult, Valuation, ValuationSnapshot};
use crate::services::quote_service::QuoteService;

/// Value a set of holdings against whatever quotes we currently know.
///
/// Never fails for a single bad symbol: a stale quote flags the holding, a
/// missing quote falls back to the purchase price, and either case marks the
/// valuation incomplete.
pub fn value_holdings(
    portfolio_id: Uuid,
    holdings: &[Holding],
    quotes: &HashMap<String, QuoteResult>,
) -> Valuation {
    let mut rows = Vec::with_capacity(holdings.len());
    let mut market_value = 0.0;
    let mut cost_basis = 0.0;
    let mut incomplete = false;

    for holding in holdings {
        let cost = holding.quantity * holding.purchase_price;

        let (last_price, stale) = match quotes.get(&holding.symbol) {
            Some(result) => (result.quote.price, result.stale),
            None => (holding.purchase_price, true),
        };

        let value = holding.quantity * last_price;
        let pnl = value - cost;
        let pnl_percent = if cost > 0.0 { pnl / cost * 100.0 } else { 0.0 };

        if stale {
            incomplete = true;
        }

        market_value += value;
        cost_basis += cost;

        rows.push(HoldingValuation {
            holding_id: holding.id,
            symbol: holding.symbol.clone(),
            quantity: holding.quantity,
            purchase_price: holding.purchase_price,
            last_price,
            market_value: value,
            unrealized_pnl: pnl,
            unrealized_pnl_percent: pnl_percent,
            stale,
        });
    }

    let unrealized_pnl = market_value - cost_basis;
    let unrealized_pnl_percent = if cost_basis > 0.0 {
        unrealized_pnl / cost_basis * 100.0
    } else {
        0.0
    };

    Valuation {
        portfolio_id,
        market_value,
        cost_basis,
        unrealized_pnl,
        unrealized_pnl_percent,
        incomplete,
        computed_at: Utc::now(),
        holdings: rows,
    }
}

/// Load a portfolio's holdings, batch-read their quotes (stale-serve
/// semantics), and value them.
pub async fn compute(
    pool: &PgPool,
    quotes: &QuoteService,
    portfolio_id: Uuid,
) -> Result<Valuation, AppError> {
    let holdings = db::holding_queries::fetch_all(pool, portfolio_id)
        .await
        .map_err(AppError::Db)?;

    let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
    let batch = quotes.get_quotes(&symbols).await;

    Ok(value_holdings(portfolio_id, &holdings, &batch.quotes))
}

/// Append one snapshot to the portfolio's historical series.
pub async fn snapshot(
    pool: &PgPool,
    quotes: &QuoteService,
    portfolio_id: Uuid,
) -> Result<ValuationSnapshot, AppError> {
    let valuation = compute(pool, quotes, portfolio_id).await?;
    db::snapshot_queries::insert(
        pool,
        portfolio_id,
        valuation.market_value,
        valuation.cost_basis,
        valuation.unrealized_pnl,
        valuation.incomplete,
    )
    .await
    .map_err(AppError::Db)
}

pub fn retention_window() -> Duration {
    let days = std::env::var("SNAPSHOT_RETENTION_DAYS")
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(90);
    Duration::days(days)
}

/// Enforce the rolling retention window across all series.
pub async fn prune_snapshots(pool: &PgPool) -> Result<u64, AppError> {
    let cutoff = Utc::now() - retention_window();
    let pruned = db::snapshot_queries::prune_older_than(pool, cutoff)
        .await
        .map_err(AppError::Db)?;
    if pruned > 0 {
        info!("Pruned {} valuation snapshots older than {}", pruned, cutoff);
    }
    Ok(pruned)
}

pub async fn fetch_history(
    pool: &PgPool,
    portfolio_id: Uuid,
    days: i64,
) -> Result<Vec<ValuationSnapshot>, AppError> {
    let since = Utc::now() - Duration::days(days.clamp(1, 365));
    db::snapshot_queries::fetch_series(pool, portfolio_id, since)
        .await
        .map_err(AppError::Db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quote;

    fn holding(symbol: &str, quantity: f64, purchase_price: f64) -> Holding {
        Holding {
            id: Uuid::new_v4(),
            portfolio_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            quantity,
            purchase_price,
            purchase_date: Utc::now(),
            created_at: Utc::now(),
        }
    }

    fn quote_result(symbol: &str, price: f64, stale: bool) -> QuoteResult {
        QuoteResult {
            quote: Quote {
                symbol: symbol.to_string(),
                price,
                change: 0.0,
                change_percent: 0.0,
                volume: None,
                market_cap: None,
                as_of: Utc::now(),
                fetched_at: Utc::now(),
            },
            stale,
        }
    }

    #[test]
    fn totals_match_known_example() {
        let portfolio_id = Uuid::new_v4();
        let holdings = vec![holding("AAPL", 10.0, 100.0), holding("MSFT", 5.0, 180.0)];
        let mut quotes = HashMap::new();
        quotes.insert("AAPL".to_string(), quote_result("AAPL", 150.0, false));
        quotes.insert("MSFT".to_string(), quote_result("MSFT", 200.0, false));

        let valuation = value_holdings(portfolio_id, &holdings, &quotes);

        assert_eq!(valuation.market_value, 2500.0);
        assert_eq!(valuation.unrealized_pnl, 500.0);
        assert!(!valuation.incomplete);
    }

    #[test]
    fn stale_quote_flags_incomplete_but_still_totals() {
        let portfolio_id = Uuid::new_v4();
        let holdings = vec![holding("AAPL", 10.0, 100.0), holding("MSFT", 5.0, 180.0)];
        let mut quotes = HashMap::new();
        quotes.insert("AAPL".to_string(), quote_result("AAPL", 150.0, false));
        quotes.insert("MSFT".to_string(), quote_result("MSFT", 200.0, true));

        let valuation = value_holdings(portfolio_id, &holdings, &quotes);

        assert_eq!(valuation.market_value, 2500.0);
        assert!(valuation.incomplete);
        assert!(valuation.holdings.iter().any(|h| h.symbol == "MSFT" && h.stale));
    }

    #[test]
    fn missing_quote_falls_back_to_purchase_price() {
        let portfolio_id = Uuid::new_v4();
        let holdings = vec![holding("AAPL", 10.0, 100.0), holding("UNKN", 4.0, 25.0)];
        let mut quotes = HashMap::new();
        quotes.insert("AAPL".to_string(), quote_result("AAPL", 150.0, false));

        let valuation = value_holdings(portfolio_id, &holdings, &quotes);

        // UNKN contributes its cost basis with zero pnl.
        assert_eq!(valuation.market_value, 1500.0 + 100.0);
        assert_eq!(valuation.unrealized_pnl, 500.0);
        assert!(valuation.incomplete);
    }

    #[test]
    fn per_holding_percentages() {
        let portfolio_id = Uuid::new_v4();
        let holdings = vec![holding("AAPL", 10.0, 100.0)];
        let mut quotes = HashMap::new();
        quotes.insert("AAPL".to_string(), quote_result("AAPL", 150.0, false));

        let valuation = value_holdings(portfolio_id, &holdings, &quotes);

        let row = &valuation.holdings[0];
        assert_eq!(row.market_value, 1500.0);
        assert_eq!(row.unrealized_pnl, 500.0);
        assert!((row.unrealized_pnl_percent - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_portfolio_is_zeroed_and_complete() {
        let valuation = value_holdings(Uuid::new_v4(), &[], &HashMap::new());
        assert_eq!(valuation.market_value, 0.0);
        assert_eq!(valuation.unrealized_pnl_percent, 0.0);
        assert!(!valuation.incomplete);
    }
}
