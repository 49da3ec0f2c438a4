use futures::future::join_all;
use std::collections::HashMap;
use tokio::time::{timeout, Duration};
use tracing::warn;

use crate::errors::AppError;
use crate::models::{QuoteBatch, QuoteResult};
use crate::services::fetch_coordinator::FetchCoordinator;
use crate::services::quote_cache::QuoteCache;

/// Serving layer over the Quote Store and Fetch Coordinator.
///
/// Freshness policy: a fresh cache entry short-circuits; a miss awaits one
/// shared fetch under the per-call deadline; on fetch failure or deadline
/// expiry a cached value is served with `stale = true`. A symbol fails only
/// when nothing is cached at all.
#[derive(Clone)]
pub struct QuoteService {
    cache: QuoteCache,
    coordinator: FetchCoordinator,
    deadline: Duration,
}

impl QuoteService {
    pub fn new(cache: QuoteCache, coordinator: FetchCoordinator) -> Self {
        let deadline_ms = std::env::var("FETCH_DEADLINE_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(5_000);

        Self {
            cache,
            coordinator,
            deadline: Duration::from_millis(deadline_ms),
        }
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    async fn lookup(&self, symbol: &str) -> Option<QuoteResult> {
        if let Some(quote) = self.cache.get_fresh(symbol) {
            return Some(QuoteResult { quote, stale: false });
        }

        match timeout(self.deadline, self.coordinator.fetch(symbol)).await {
            Ok(Ok(quote)) => Some(QuoteResult { quote, stale: false }),
            Ok(Err(e)) => {
                warn!("Fetch failed for {}, falling back to cache: {}", symbol, e);
                self.cache
                    .get_any(symbol)
                    .map(|quote| QuoteResult { quote, stale: true })
            }
            Err(_) => {
                warn!("Fetch deadline expired for {}, falling back to cache", symbol);
                self.cache
                    .get_any(symbol)
                    .map(|quote| QuoteResult { quote, stale: true })
            }
        }
    }

    /// Single-symbol lookup. `UpstreamUnavailable` only when the fetch fails
    /// and no cached value exists.
    pub async fn get_quote(&self, symbol: &str) -> Result<QuoteResult, AppError> {
        let symbol = normalize_symbol(symbol);
        self.lookup(&symbol)
            .await
            .ok_or(AppError::UpstreamUnavailable)
    }

    /// Batch lookup. Symbol-level failures never abort the batch: symbols
    /// with neither a fetch result nor a cached value land in `failed`.
    pub async fn get_quotes(&self, symbols: &[String]) -> QuoteBatch {
        let mut unique: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
        unique.sort();
        unique.dedup();

        let lookups = unique.iter().map(|symbol| async {
            let result = self.lookup(symbol).await;
            (symbol.clone(), result)
        });

        let mut quotes = HashMap::new();
        let mut failed = Vec::new();
        for (symbol, result) in join_all(lookups).await {
            match result {
                Some(quote) => {
                    quotes.insert(symbol, quote);
                }
                None => failed.push(symbol),
            }
        }

        QuoteBatch { quotes, failed }
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::quote_provider::{ProviderQuote, QuoteProvider, QuoteProviderError};
    use crate::models::Quote;
    use crate::services::fetch_breaker::FetchBreaker;
    use crate::services::rate_limiter::RateLimiter;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Arc;

    struct FailingProvider;

    #[async_trait]
    impl QuoteProvider for FailingProvider {
        async fn fetch_quote(&self, _symbol: &str) -> Result<ProviderQuote, QuoteProviderError> {
            Err(QuoteProviderError::BadResponse("HTTP 500".into()))
        }
    }

    fn service_with_failing_upstream() -> QuoteService {
        let cache = QuoteCache::new(chrono::Duration::seconds(30), chrono::Duration::seconds(900));
        let limiter = Arc::new(RateLimiter::new(4, 6_000));
        let breaker = FetchBreaker::new(5, chrono::Duration::minutes(5));
        let coordinator =
            FetchCoordinator::new(Arc::new(FailingProvider), cache.clone(), limiter, breaker);
        QuoteService::new(cache, coordinator)
    }

    fn aged_quote(symbol: &str, price: f64) -> Quote {
        let stamp = Utc::now() - chrono::Duration::seconds(120);
        Quote {
            symbol: symbol.to_string(),
            price,
            change: 0.0,
            change_percent: 0.0,
            volume: None,
            market_cap: None,
            as_of: stamp,
            fetched_at: stamp,
        }
    }

    #[tokio::test]
    async fn upstream_failure_with_cache_serves_stale() {
        let service = service_with_failing_upstream();
        service.cache.insert(aged_quote("AAPL", 175.5));

        let result = service.get_quote("AAPL").await.unwrap();
        assert!(result.stale);
        assert_eq!(result.quote.price, 175.5);
    }

    #[tokio::test]
    async fn upstream_failure_without_cache_is_unavailable() {
        let service = service_with_failing_upstream();

        let result = service.get_quote("MSFT").await;
        assert!(matches!(result, Err(AppError::UpstreamUnavailable)));
    }

    #[tokio::test]
    async fn batch_degrades_per_symbol_without_aborting() {
        let service = service_with_failing_upstream();
        service.cache.insert(aged_quote("AAPL", 175.5));

        let batch = service
            .get_quotes(&["aapl".to_string(), "MSFT".to_string()])
            .await;

        assert!(batch.quotes.get("AAPL").unwrap().stale);
        assert_eq!(batch.failed, vec!["MSFT".to_string()]);
    }

    #[test]
    fn symbols_are_normalized() {
        assert_eq!(normalize_symbol("  aapl "), "AAPL");
    }
}
