use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Latest known market data for a symbol. Ephemeral: replaced wholesale on
/// each refresh, never partially mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: Option<i64>,
    pub market_cap: Option<f64>,
    /// Timestamp reported by the upstream provider.
    pub as_of: DateTime<Utc>,
    /// When we fetched it. Non-decreasing per symbol.
    pub fetched_at: DateTime<Utc>,
}

/// A quote as served to callers, with an explicit staleness flag instead of
/// a hidden freshness guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResult {
    pub quote: Quote,
    pub stale: bool,
}

/// Result of a batch lookup. Symbols with neither a fresh fetch nor any
/// cached value land in `failed` without aborting the rest of the batch.
#[derive(Debug, Serialize)]
pub struct QuoteBatch {
    pub quotes: HashMap<String, QuoteResult>,
    pub failed: Vec<String>,
}
