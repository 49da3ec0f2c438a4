use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A quote as the upstream reports it, before it enters the cache.
#[derive(Debug, Clone)]
pub struct ProviderQuote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: Option<i64>,
    pub market_cap: Option<f64>,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
pub enum QuoteProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,

    /// Upstream 5xx-equivalent: the provider is there but unwell.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("unknown symbol")]
    NotFound,
}

impl QuoteProviderError {
    /// Transient failures are retried with backoff; the rest fail fast.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            QuoteProviderError::Network(_)
                | QuoteProviderError::RateLimited
                | QuoteProviderError::Unavailable(_)
        )
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<ProviderQuote, QuoteProviderError>;
}
