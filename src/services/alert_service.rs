use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{error, info};
use uuid::Uuid;

use crate::db::alert_queries;
use crate::errors::AppError;
use crate::models::alert::{AlertCondition, AlertEvent, AlertRule, AlertStatus, CreateAlertRule, RuleAction};
use crate::services::quote_cache::QuoteCache;
use crate::services::quote_service::normalize_symbol;

/// Decide what a single quote means for a single rule.
///
/// Active rules trigger on the first qualifying price. Triggered rules
/// re-arm only when a hysteresis margin is configured and price crosses
/// back past the threshold by that margin; without a margin they wait for
/// an owner reset. Disabled rules never change here.
pub fn decide(rule: &AlertRule, price: f64) -> RuleAction {
    match rule.status {
        AlertStatus::Active => {
            if rule.condition.holds(price, rule.threshold) {
                RuleAction::Trigger
            } else {
                RuleAction::NoChange
            }
        }
        AlertStatus::Triggered => match rule.rearm_margin {
            Some(margin) => {
                let crossed_back = match rule.condition {
                    AlertCondition::Above => price <= rule.threshold - margin,
                    AlertCondition::Below => price >= rule.threshold + margin,
                };
                if crossed_back {
                    RuleAction::Rearm
                } else {
                    RuleAction::NoChange
                }
            }
            None => RuleAction::NoChange,
        },
        AlertStatus::Disabled => RuleAction::NoChange,
    }
}

pub async fn create_rule(
    pool: &PgPool,
    owner_id: Uuid,
    input: CreateAlertRule,
) -> Result<AlertRule, AppError> {
    // Validate before any mutation.
    let symbol = normalize_symbol(&input.symbol);
    if symbol.is_empty() {
        return Err(AppError::Validation("Symbol must not be empty".into()));
    }
    if !input.threshold.is_finite() || input.threshold <= 0.0 {
        return Err(AppError::Validation("Threshold must be a positive number".into()));
    }
    if let Some(margin) = input.rearm_margin {
        if !margin.is_finite() || margin <= 0.0 {
            return Err(AppError::Validation("Re-arm margin must be a positive number".into()));
        }
    }

    match alert_queries::create(pool, owner_id, &symbol, &input).await {
        Ok(rule) => Ok(rule),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(AppError::Validation(
            "An identical active rule already exists for this symbol".into(),
        )),
        Err(e) => {
            error!("Failed to create alert rule: {}", e);
            Err(AppError::Db(e))
        }
    }
}

/// Incremental evaluation: runs over only the symbols the refresh cycle
/// just updated, never the whole rule table. Returns the number of rules
/// that fired.
pub async fn evaluate_symbols(
    pool: &PgPool,
    cache: &QuoteCache,
    events: &broadcast::Sender<AlertEvent>,
    symbols: &[String],
) -> Result<usize, AppError> {
    let mut fired = 0;

    for symbol in symbols {
        let Some(quote) = cache.get_any(symbol) else {
            continue;
        };

        let rules = alert_queries::fetch_evaluable_for_symbol(pool, symbol)
            .await
            .map_err(AppError::Db)?;

        for rule in rules {
            match decide(&rule, quote.price) {
                RuleAction::Trigger => {
                    // The guarded update fires at most once; a concurrent
                    // evaluator losing the race gets rows_affected = 0 and
                    // emits nothing.
                    let flipped = alert_queries::mark_triggered(pool, rule.id)
                        .await
                        .map_err(AppError::Db)?;
                    if flipped == 1 {
                        let event = alert_queries::insert_event(
                            pool,
                            rule.id,
                            rule.owner_id,
                            &rule.symbol,
                            rule.condition,
                            rule.threshold,
                            quote.price,
                        )
                        .await
                        .map_err(AppError::Db)?;

                        info!(
                            "Alert fired: {} {} {} at price {}",
                            rule.symbol, rule.condition, rule.threshold, quote.price
                        );
                        // Listeners may come and go; a send with no
                        // receivers is fine.
                        let _ = events.send(event);
                        fired += 1;
                    }
                }
                RuleAction::Rearm => {
                    let rearmed = alert_queries::rearm(pool, rule.id).await.map_err(AppError::Db)?;
                    if rearmed == 1 {
                        info!(
                            "Alert re-armed: {} {} {} after reverse crossing to {}",
                            rule.symbol, rule.condition, rule.threshold, quote.price
                        );
                    }
                }
                RuleAction::NoChange => {}
            }
        }
    }

    Ok(fired)
}

pub async fn reset_rule(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<(), AppError> {
    let reset = alert_queries::reset(pool, id, owner_id).await.map_err(AppError::Db)?;
    if reset == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn disable_rule(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<(), AppError> {
    let disabled = alert_queries::disable(pool, id, owner_id).await.map_err(AppError::Db)?;
    if disabled == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(condition: AlertCondition, threshold: f64, rearm_margin: Option<f64>) -> AlertRule {
        AlertRule {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            symbol: "AAPL".to_string(),
            condition,
            threshold,
            status: AlertStatus::Active,
            rearm_margin,
            created_at: Utc::now(),
            last_triggered_at: None,
        }
    }

    /// Feed a price sequence through the state machine, applying each
    /// decision the way evaluation does, and count the triggers.
    fn run_sequence(mut rule: AlertRule, prices: &[f64]) -> usize {
        let mut fired = 0;
        for &price in prices {
            match decide(&rule, price) {
                RuleAction::Trigger => {
                    rule.status = AlertStatus::Triggered;
                    fired += 1;
                }
                RuleAction::Rearm => {
                    rule.status = AlertStatus::Active;
                }
                RuleAction::NoChange => {}
            }
        }
        fired
    }

    #[test]
    fn above_rule_fires_exactly_once_without_reverse_crossing() {
        // Hysteresis configured, but 148 never crosses back below 145.
        let fired = run_sequence(
            rule(AlertCondition::Above, 150.0, Some(5.0)),
            &[140.0, 145.0, 151.0, 148.0, 152.0],
        );
        assert_eq!(fired, 1);
    }

    #[test]
    fn reverse_crossing_rearms_and_allows_a_second_fire() {
        let fired = run_sequence(
            rule(AlertCondition::Above, 150.0, Some(5.0)),
            &[151.0, 144.0, 152.0],
        );
        assert_eq!(fired, 2);
    }

    #[test]
    fn no_margin_means_no_automatic_rearm() {
        let fired = run_sequence(
            rule(AlertCondition::Above, 150.0, None),
            &[151.0, 100.0, 152.0],
        );
        assert_eq!(fired, 1);
    }

    #[test]
    fn below_rule_mirrors_the_threshold() {
        let fired = run_sequence(
            rule(AlertCondition::Below, 50.0, Some(3.0)),
            &[55.0, 49.0, 51.0, 48.0],
        );
        // 49 fires; 51 is within the margin (needs >= 53) so 48 cannot
        // fire again.
        assert_eq!(fired, 1);
    }

    #[test]
    fn threshold_is_inclusive() {
        let r = rule(AlertCondition::Above, 150.0, None);
        assert_eq!(decide(&r, 150.0), RuleAction::Trigger);
    }

    #[test]
    fn disabled_rules_never_change() {
        let mut r = rule(AlertCondition::Above, 150.0, Some(5.0));
        r.status = AlertStatus::Disabled;
        assert_eq!(decide(&r, 200.0), RuleAction::NoChange);
    }
}
