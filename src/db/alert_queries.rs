use sqlx::PgPool;
use uuid::Uuid;
use crate::models::alert::{AlertCondition, AlertEvent, AlertRule, CreateAlertRule};

const RULE_COLUMNS: &str =
    "id, owner_id, symbol, condition, threshold, status, rearm_margin, created_at, last_triggered_at";

pub async fn create(
    pool: &PgPool,
    owner_id: Uuid,
    symbol: &str,
    input: &CreateAlertRule,
) -> Result<AlertRule, sqlx::Error> {
    let sql = format!(
        "INSERT INTO alert_rules (id, owner_id, symbol, condition, threshold, rearm_margin)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {RULE_COLUMNS}");
    sqlx::query_as::<_, AlertRule>(&sql)
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(symbol)
        .bind(input.condition)
        .bind(input.threshold)
        .bind(input.rearm_margin)
        .fetch_one(pool)
        .await
}

pub async fn fetch_all_for_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<AlertRule>, sqlx::Error> {
    let sql = format!(
        "SELECT {RULE_COLUMNS} FROM alert_rules
         WHERE owner_id = $1
         ORDER BY created_at DESC");
    sqlx::query_as::<_, AlertRule>(&sql)
        .bind(owner_id)
        .fetch_all(pool)
        .await
}

pub async fn fetch_one(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<Option<AlertRule>, sqlx::Error> {
    let sql = format!(
        "SELECT {RULE_COLUMNS} FROM alert_rules
         WHERE id = $1 AND owner_id = $2");
    sqlx::query_as::<_, AlertRule>(&sql)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await
}

/// Rules worth evaluating for a symbol: active ones (may trigger) and
/// triggered ones carrying a re-arm margin (may re-arm).
pub async fn fetch_evaluable_for_symbol(pool: &PgPool, symbol: &str) -> Result<Vec<AlertRule>, sqlx::Error> {
    let sql = format!(
        "SELECT {RULE_COLUMNS} FROM alert_rules
         WHERE symbol = $1
           AND (status = 'active' OR (status = 'triggered' AND rearm_margin IS NOT NULL))");
    sqlx::query_as::<_, AlertRule>(&sql)
        .bind(symbol)
        .fetch_all(pool)
        .await
}

/// Flip a rule to triggered. The status guard makes the transition
/// exactly-once under concurrent evaluators: only one caller sees
/// rows_affected = 1 and gets to record the event.
pub async fn mark_triggered(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE alert_rules
         SET status = 'triggered', last_triggered_at = now()
         WHERE id = $1 AND status = 'active'")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Automatic hysteresis re-arm after a reverse crossing.
pub async fn rearm(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE alert_rules
         SET status = 'active'
         WHERE id = $1 AND status = 'triggered'")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Owner reset: triggered/disabled back to active.
pub async fn reset(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE alert_rules
         SET status = 'active'
         WHERE id = $1 AND owner_id = $2 AND status IN ('triggered', 'disabled')")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn disable(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE alert_rules
         SET status = 'disabled'
         WHERE id = $1 AND owner_id = $2 AND status <> 'disabled'")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM alert_rules WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Symbols carrying any evaluable rule. Feeds the refresh cycle's tracked set.
pub async fn distinct_evaluable_symbols(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT symbol FROM alert_rules
         WHERE status = 'active' OR (status = 'triggered' AND rearm_margin IS NOT NULL)")
        .fetch_all(pool)
        .await
}

pub async fn insert_event(
    pool: &PgPool,
    rule_id: Uuid,
    owner_id: Uuid,
    symbol: &str,
    condition: AlertCondition,
    threshold: f64,
    price: f64,
) -> Result<AlertEvent, sqlx::Error> {
    sqlx::query_as::<_, AlertEvent>(
        "INSERT INTO alert_events (id, rule_id, owner_id, symbol, condition, threshold, price)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING id, rule_id, owner_id, symbol, condition, threshold, price, triggered_at")
        .bind(Uuid::new_v4())
        .bind(rule_id)
        .bind(owner_id)
        .bind(symbol)
        .bind(condition)
        .bind(threshold)
        .bind(price)
        .fetch_one(pool)
        .await
}

pub async fn fetch_events_for_owner(
    pool: &PgPool,
    owner_id: Uuid,
    limit: i64,
) -> Result<Vec<AlertEvent>, sqlx::Error> {
    sqlx::query_as::<_, AlertEvent>(
        "SELECT id, rule_id, owner_id, symbol, condition, threshold, price, triggered_at
         FROM alert_events
         WHERE owner_id = $1
         ORDER BY triggered_at DESC
         LIMIT $2")
        .bind(owner_id)
        .bind(limit)
        .fetch_all(pool)
        .await
}
