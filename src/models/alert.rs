use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which side of the threshold a rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum AlertCondition {
    Above,
    Below,
}

impl AlertCondition {
    /// True when `price` satisfies the rule's condition against `threshold`.
    pub fn holds(self, price: f64, threshold: f64) -> bool {
        match self {
            AlertCondition::Above => price >= threshold,
            AlertCondition::Below => price <= threshold,
        }
    }
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertCondition::Above => write!(f, "above"),
            AlertCondition::Below => write!(f, "below"),
        }
    }
}

/// Rule lifecycle. `active -> triggered` on the first qualifying quote;
/// `triggered -> active` only via hysteresis re-arm or owner reset;
/// `disabled` is reachable only by owner action and skipped by evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Triggered,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertRule {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub symbol: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub status: AlertStatus,
    /// Hysteresis margin. When set, a triggered rule re-arms automatically
    /// once price crosses back past the threshold by this much; when unset,
    /// only an explicit owner reset re-arms it.
    pub rearm_margin: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAlertRule {
    pub symbol: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub rearm_margin: Option<f64>,
}

/// What evaluation decided for one rule at one price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Trigger,
    Rearm,
    NoChange,
}

// Persisted record of a trigger. Exactly one row per qualifying event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertEvent {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub owner_id: Uuid,
    pub symbol: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub price: f64,
    pub triggered_at: DateTime<Utc>,
}
