use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Valuation of a single holding at the prices we currently know.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingValuation {
    pub holding_id: Uuid,
    pub symbol: String,
    pub quantity: f64,
    pub purchase_price: f64,
    /// Price the valuation was computed from. Falls back to the purchase
    /// price when no quote has ever been seen for the symbol.
    pub last_price: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
    pub stale: bool,
}

/// Aggregate valuation for a portfolio. Never fails outright for a single
/// bad symbol: degraded holdings are flagged and the total still computes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Valuation {
    pub portfolio_id: Uuid,
    pub market_value: f64,
    pub cost_basis: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
    /// True when any holding was valued from a stale or missing quote.
    pub incomplete: bool,
    pub computed_at: DateTime<Utc>,
    pub holdings: Vec<HoldingValuation>,
}

// One point of the append-only historical series sampled by the snapshot job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ValuationSnapshot {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub market_value: f64,
    pub cost_basis: f64,
    pub unrealized_pnl: f64,
    pub incomplete: bool,
    pub sampled_at: DateTime<Utc>,
}
