use sqlx::PgPool;

use crate::services::portfolio_service::PortfolioLocks;
use crate::services::quote_service::QuoteService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub quotes: QuoteService,
    pub portfolio_locks: PortfolioLocks,
}
