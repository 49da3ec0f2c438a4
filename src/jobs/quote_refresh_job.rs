use crate::db::{alert_queries, holding_queries};
use crate::errors::AppError;
use crate::services::alert_service;
use crate::services::job_scheduler_service::{JobContext, JobResult};
use futures::future::join_all;
use tracing::{debug, info, warn};

/// One refresh cycle.
///
/// 1. Collect the tracked symbol set (held symbols plus symbols with
///    evaluable alert rules)
/// 2. Fetch the ones past their TTL through the coordinator (single-flight,
///    rate-limited)
/// 3. Run incremental alert evaluation over the symbols that refreshed
/// 4. Evict idle cache entries
///
/// Runs every 30 seconds, independent of request traffic.
pub async fn run_quote_refresh(ctx: JobContext) -> Result<JobResult, AppError> {
    let pool = ctx.pool.as_ref();

    let mut symbols = holding_queries::distinct_symbols(pool)
        .await
        .map_err(AppError::Db)?;
    symbols.extend(
        alert_queries::distinct_evaluable_symbols(pool)
            .await
            .map_err(AppError::Db)?,
    );
    symbols.sort();
    symbols.dedup();

    if symbols.is_empty() {
        return Ok(JobResult {
            items_processed: 0,
            items_failed: 0,
        });
    }

    let cache = ctx.quotes.cache();
    let coordinator = ctx.quotes.coordinator();

    let due: Vec<String> = symbols
        .into_iter()
        .filter(|symbol| cache.needs_refresh(symbol))
        .collect();

    let outcomes = join_all(due.iter().map(|symbol| async move {
        (symbol.clone(), coordinator.fetch(symbol).await)
    }))
    .await;

    let mut refreshed = Vec::new();
    let mut failed = 0;
    for (symbol, outcome) in outcomes {
        match outcome {
            Ok(_) => refreshed.push(symbol),
            Err(e) => {
                warn!("Refresh failed for {}: {}", symbol, e);
                failed += 1;
            }
        }
    }

    // Evaluation is driven by what actually changed this cycle.
    match alert_service::evaluate_symbols(pool, cache, &ctx.alert_events, &refreshed).await {
        Ok(fired) if fired > 0 => info!("Refresh cycle fired {} alert(s)", fired),
        Ok(_) => {}
        Err(e) => warn!("Alert evaluation failed this cycle: {}", e),
    }

    let evicted = cache.evict_idle();
    if evicted > 0 {
        debug!("Evicted {} idle quote cache entries", evicted);
    }

    Ok(JobResult {
        items_processed: refreshed.len(),
        items_failed: failed,
    })
}
