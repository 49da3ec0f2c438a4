use crate::errors::AppError;
use crate::jobs::{news_ingest_job, quote_refresh_job, valuation_snapshot_job};
use crate::models::alert::AlertEvent;
use crate::services::news_service::NewsService;
use crate::services::quote_service::QuoteService;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

// Context passed to job functions
#[derive(Clone)]
pub struct JobContext {
    pub pool: Arc<PgPool>,
    pub quotes: QuoteService,
    pub news: Arc<NewsService>,
    pub alert_events: broadcast::Sender<AlertEvent>,
}

#[derive(Debug)]
pub struct JobResult {
    pub items_processed: usize,
    pub items_failed: usize,
}

pub struct JobSchedulerService {
    scheduler: JobScheduler,
    context: JobContext,
}

impl JobSchedulerService {
    pub async fn new(context: JobContext) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::External(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self { scheduler, context })
    }

    /// Register and start all background jobs.
    pub async fn start(&mut self) -> Result<(), AppError> {
        info!("Starting job scheduler...");

        // (format: sec min hour day month weekday)
        self.schedule_job(
            "*/30 * * * * *",
            "refresh_quotes",
            "Every 30 seconds",
            quote_refresh_job::run_quote_refresh,
        )
        .await?;

        self.schedule_job(
            "0 0 * * * *",
            "valuation_snapshots",
            "Every hour at :00",
            valuation_snapshot_job::run_valuation_snapshots,
        )
        .await?;

        if self.context.news.is_enabled() {
            self.schedule_job(
                "0 */15 * * * *",
                "ingest_news",
                "Every 15 minutes",
                news_ingest_job::run_news_ingest,
            )
            .await?;
        } else {
            info!("News ingestion disabled, skipping news job");
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::External(format!("Failed to start scheduler: {}", e)))?;

        info!("Job scheduler started");
        Ok(())
    }

    async fn schedule_job<F, Fut>(
        &mut self,
        schedule: &str,
        name: &'static str,
        description: &str,
        job_fn: F,
    ) -> Result<(), AppError>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<JobResult, AppError>> + Send + 'static,
    {
        let context = self.context.clone();
        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let context = context.clone();
            let job_fn = job_fn.clone();
            Box::pin(async move {
                match job_fn(context).await {
                    Ok(result) => {
                        if result.items_processed > 0 || result.items_failed > 0 {
                            info!(
                                "Job {} completed: {} processed, {} failed",
                                name, result.items_processed, result.items_failed
                            );
                        }
                    }
                    // A failed cycle is logged and retried on the next tick;
                    // it never takes the process down.
                    Err(e) => error!("Job {} failed: {}", name, e),
                }
            })
        })
        .map_err(|e| AppError::External(format!("Failed to create job {}: {}", name, e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::External(format!("Failed to schedule job {}: {}", name, e)))?;

        info!("Scheduled job {} ({}): {}", name, schedule, description);
        Ok(())
    }
}
