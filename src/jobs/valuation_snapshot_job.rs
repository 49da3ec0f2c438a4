use crate::db::portfolio_queries;
use crate::errors::AppError;
use crate::services::job_scheduler_service::{JobContext, JobResult};
use crate::services::valuation_service;
use tracing::{info, warn};

/// Sample every portfolio's valuation into its historical series, then
/// enforce the rolling retention window. The series is append-only; a
/// failed portfolio is skipped and retried next cycle.
pub async fn run_valuation_snapshots(ctx: JobContext) -> Result<JobResult, AppError> {
    let pool = ctx.pool.as_ref();

    let portfolio_ids = portfolio_queries::fetch_all_ids(pool)
        .await
        .map_err(AppError::Db)?;

    if portfolio_ids.is_empty() {
        return Ok(JobResult {
            items_processed: 0,
            items_failed: 0,
        });
    }

    let mut processed = 0;
    let mut failed = 0;

    for portfolio_id in &portfolio_ids {
        match valuation_service::snapshot(pool, &ctx.quotes, *portfolio_id).await {
            Ok(snapshot) => {
                if snapshot.incomplete {
                    info!(
                        "Snapshot for portfolio {} recorded with stale inputs",
                        portfolio_id
                    );
                }
                processed += 1;
            }
            Err(e) => {
                warn!("Snapshot failed for portfolio {}: {}", portfolio_id, e);
                failed += 1;
            }
        }
    }

    if let Err(e) = valuation_service::prune_snapshots(pool).await {
        warn!("Snapshot retention pruning failed: {}", e);
    }

    Ok(JobResult {
        items_processed: processed,
        items_failed: failed,
    })
}
