pub mod portfolio_queries;
pub mod holding_queries;
pub mod alert_queries;
pub mod news_queries;
pub mod snapshot_queries;
