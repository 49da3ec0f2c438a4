pub mod quote_cache;
pub mod rate_limiter;
pub mod fetch_breaker;
pub mod fetch_coordinator;
pub mod quote_service;
pub mod portfolio_service;
pub mod valuation_service;
pub mod alert_service;
pub mod sentiment;
pub mod news_service;
pub mod job_scheduler_service;
