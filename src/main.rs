mod app;
mod db;
mod errors;
mod external;
mod jobs;
mod logging;
mod models;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::external::alphavantage::AlphaVantageProvider;
use crate::external::quote_provider::QuoteProvider;
use crate::external::yahoo::YahooQuoteProvider;
use crate::services::fetch_breaker::FetchBreaker;
use crate::services::fetch_coordinator::FetchCoordinator;
use crate::services::job_scheduler_service::{JobContext, JobSchedulerService};
use crate::services::news_service::{NewsConfig, NewsService};
use crate::services::portfolio_service::PortfolioLocks;
use crate::services::quote_cache::QuoteCache;
use crate::services::quote_service::QuoteService;
use crate::services::rate_limiter::RateLimiter;
use crate::services::sentiment::LexiconClassifier;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    logging::init_logging(logging::LoggingConfig::from_env())
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    // Select quote provider based on QUOTE_PROVIDER env var (defaults to yahoo)
    let provider_name = std::env::var("QUOTE_PROVIDER").unwrap_or_else(|_| "yahoo".to_string());

    let provider: Arc<dyn QuoteProvider> = match provider_name.to_lowercase().as_str() {
        "yahoo" => {
            tracing::info!("Using quote provider: Yahoo Finance");
            Arc::new(YahooQuoteProvider::new())
        }
        "alphavantage" => {
            tracing::info!("Using quote provider: Alpha Vantage");
            Arc::new(
                AlphaVantageProvider::from_env()
                    .map_err(|e| anyhow::anyhow!("Failed to create AlphaVantageProvider: {}", e))?,
            )
        }
        other => {
            anyhow::bail!("Invalid QUOTE_PROVIDER: {}. Must be 'yahoo' or 'alphavantage'", other);
        }
    };

    let cache = QuoteCache::from_env();
    let limiter = Arc::new(RateLimiter::from_env());
    let breaker = FetchBreaker::from_env();
    let coordinator = FetchCoordinator::new(provider, cache.clone(), limiter, breaker);
    let quotes = QuoteService::new(cache, coordinator);

    let news = Arc::new(NewsService::new(
        NewsConfig::from_env(),
        Arc::new(LexiconClassifier),
    ));

    let (alert_events, _) = broadcast::channel::<crate::models::alert::AlertEvent>(256);

    // Notification sink: every trigger event lands in the log stream once.
    // Delivery channels (email, push) hang off this same bus.
    let mut events_rx = alert_events.subscribe();
    tokio::spawn(async move {
        loop {
            match events_rx.recv().await {
                Ok(event) => tracing::info!(
                    "Notification: {} crossed {} {} at {} (rule {})",
                    event.symbol,
                    event.condition,
                    event.threshold,
                    event.price,
                    event.rule_id
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Notification sink lagged, skipped {} events", skipped)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut scheduler = JobSchedulerService::new(JobContext {
        pool: Arc::new(pool.clone()),
        quotes: quotes.clone(),
        news,
        alert_events,
    })
    .await?;
    scheduler.start().await?;

    let state = AppState {
        pool,
        quotes,
        portfolio_locks: PortfolioLocks::new(),
    };
    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Finwatch backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
