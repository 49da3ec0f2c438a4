use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// A lot of a single security inside a portfolio. Deleted with its portfolio.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Holding {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub symbol: String,
    pub quantity: f64,
    pub purchase_price: f64,
    pub purchase_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateHolding {
    pub symbol: String,
    pub quantity: f64,
    pub purchase_price: f64,
    pub purchase_date: DateTime<Utc>,
}
