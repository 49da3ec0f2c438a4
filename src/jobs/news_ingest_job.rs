use crate::db::{alert_queries, holding_queries};
use crate::errors::AppError;
use crate::services::job_scheduler_service::{JobContext, JobResult};
use tracing::{info, warn};

const INTER_SYMBOL_DELAY_MS: u64 = 500;

/// Pull fresh news for every tracked symbol and funnel it through the
/// idempotent ingest path. Duplicates are absorbed, so re-running against
/// an unchanged feed is a no-op.
pub async fn run_news_ingest(ctx: JobContext) -> Result<JobResult, AppError> {
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

    let mut processed = 0;
    let mut failed = 0;
    let mut total_inserted = 0;

    for symbol in &symbols {
        match ctx.news.ingest_for_symbol(pool, symbol, &symbols).await {
            Ok(inserted) => {
                total_inserted += inserted;
                processed += 1;
            }
            Err(e) => {
                warn!("News ingestion failed for {}: {}", symbol, e);
                failed += 1;
            }
        }

        // Delay between symbols to stay under the news provider's quota.
        tokio::time::sleep(tokio::time::Duration::from_millis(INTER_SYMBOL_DELAY_MS)).await;
    }

    info!(
        "News ingestion completed: {} symbols, {} new items",
        processed, total_inserted
    );

    Ok(JobResult {
        items_processed: processed,
        items_failed: failed,
    })
}
