use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, warn};

use crate::external::quote_provider::{QuoteProvider, QuoteProviderError};
use crate::models::Quote;
use crate::services::fetch_breaker::FetchBreaker;
use crate::services::quote_cache::QuoteCache;
use crate::services::rate_limiter::RateLimiter;

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("circuit open, skipping upstream fetch")]
    CircuitOpen,
    #[error(transparent)]
    Provider(#[from] QuoteProviderError),
}

pub type FetchOutcome = Result<Quote, FetchError>;

/// Turns "needs refresh" symbols into upstream calls.
///
/// At most one fetch is in flight per symbol at any instant: a caller that
/// finds an in-flight fetch attaches to it and receives the same outcome.
/// The fetch itself runs on a detached task, so a caller abandoning its wait
/// (deadline) does not cancel the fetch; it still completes and populates
/// the cache for future readers.
#[derive(Clone)]
pub struct FetchCoordinator {
    provider: Arc<dyn QuoteProvider>,
    cache: QuoteCache,
    limiter: Arc<RateLimiter>,
    breaker: FetchBreaker,
    in_flight: Arc<Mutex<HashMap<String, broadcast::Sender<FetchOutcome>>>>,
    max_attempts: u32,
    backoff_base_ms: u64,
}

impl FetchCoordinator {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        cache: QuoteCache,
        limiter: Arc<RateLimiter>,
        breaker: FetchBreaker,
    ) -> Self {
        let max_attempts = std::env::var("FETCH_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(3);

        Self {
            provider,
            cache,
            limiter,
            breaker,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            max_attempts: max_attempts.max(1),
            backoff_base_ms: 500,
        }
    }

    #[cfg(test)]
    fn with_backoff_base_ms(mut self, base_ms: u64) -> Self {
        self.backoff_base_ms = base_ms;
        self
    }

    /// Fetch a quote for `symbol`, collapsing concurrent callers onto a
    /// single upstream call. All waiters see the same outcome.
    pub async fn fetch(&self, symbol: &str) -> FetchOutcome {
        let mut rx = {
            let mut in_flight = self.in_flight.lock();
            if let Some(tx) = in_flight.get(symbol) {
                debug!("Attaching to in-flight fetch for {}", symbol);
                tx.subscribe()
            } else {
                let (tx, rx) = broadcast::channel(1);
                in_flight.insert(symbol.to_string(), tx);
                self.spawn_fetch(symbol.to_string());
                rx
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(QuoteProviderError::Network("fetch task dropped".into()).into()),
        }
    }

    fn spawn_fetch(&self, symbol: String) {
        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this.run_fetch(&symbol).await;
            // Remove the marker before broadcasting so late callers start a
            // fresh fetch instead of subscribing to a completed one.
            let tx = this.in_flight.lock().remove(&symbol);
            if let Some(tx) = tx {
                let _ = tx.send(outcome);
            }
        });
    }

    async fn run_fetch(&self, symbol: &str) -> FetchOutcome {
        if self.breaker.is_open(symbol) {
            debug!("Circuit open for {}, serving cache only", symbol);
            return Err(FetchError::CircuitOpen);
        }

        let mut attempt = 1u32;
        loop {
            let _guard = self.limiter.acquire().await;

            match self.provider.fetch_quote(symbol).await {
                Ok(fetched) => {
                    let quote = Quote {
                        // Key by the requested symbol so cache lookups match
                        // even when the provider echoes a variant spelling.
                        symbol: symbol.to_string(),
                        price: fetched.price,
                        change: fetched.change,
                        change_percent: fetched.change_percent,
                        volume: fetched.volume,
                        market_cap: fetched.market_cap,
                        as_of: fetched.as_of,
                        fetched_at: chrono::Utc::now(),
                    };
                    self.cache.insert(quote.clone());
                    self.breaker.record_success(symbol);
                    return Ok(quote);
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        "Fetch for {} failed ({}), retrying in {}ms (attempt {}/{})",
                        symbol,
                        e,
                        delay.as_millis(),
                        attempt,
                        self.max_attempts
                    );
                    attempt += 1;
                    sleep(delay).await;
                }
                Err(e) => {
                    self.breaker.record_failure(symbol);
                    error!("Fetch for {} failed after {} attempt(s): {}", symbol, attempt, e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Exponential backoff with uniform jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.backoff_base_ms * 2u64.saturating_pow(attempt - 1);
        let jitter = rand::rng().random_range(0..=self.backoff_base_ms / 2);
        Duration::from_millis(base + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::quote_provider::ProviderQuote;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl CountingProvider {
        fn new(fail_first: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
            }
        }
    }

    #[async_trait]
    impl QuoteProvider for CountingProvider {
        async fn fetch_quote(&self, symbol: &str) -> Result<ProviderQuote, QuoteProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            // Hold the call open briefly so concurrent callers overlap.
            sleep(Duration::from_millis(50)).await;
            if call < self.fail_first {
                return Err(QuoteProviderError::Network("connection reset".into()));
            }
            Ok(ProviderQuote {
                symbol: symbol.to_string(),
                price: 175.5,
                change: 2.3,
                change_percent: 1.32,
                volume: Some(65_432_100),
                market_cap: Some(2.85e12),
                as_of: chrono::Utc::now(),
            })
        }
    }

    fn coordinator(provider: Arc<CountingProvider>) -> FetchCoordinator {
        let cache = QuoteCache::new(chrono::Duration::seconds(30), chrono::Duration::seconds(900));
        let limiter = Arc::new(RateLimiter::new(4, 6_000));
        let breaker = FetchBreaker::new(5, chrono::Duration::minutes(5));
        FetchCoordinator::new(provider, cache, limiter, breaker).with_backoff_base_ms(1)
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_upstream_call() {
        let provider = Arc::new(CountingProvider::new(0));
        let coordinator = coordinator(provider.clone());

        // All eight futures are polled before the first fetch completes, so
        // every caller attaches to the same in-flight fetch.
        let outcomes =
            futures::future::join_all((0..8).map(|_| coordinator.fetch("AAPL"))).await;

        for outcome in outcomes {
            assert_eq!(outcome.unwrap().price, 175.5);
        }

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let provider = Arc::new(CountingProvider::new(2));
        let coordinator = coordinator(provider.clone());

        let quote = coordinator.fetch("MSFT").await.unwrap();
        assert_eq!(quote.price, 175.5);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn successful_fetch_populates_the_cache() {
        let provider = Arc::new(CountingProvider::new(0));
        let coordinator = coordinator(provider.clone());

        coordinator.fetch("GOOGL").await.unwrap();
        assert!(coordinator.cache.get_fresh("GOOGL").is_some());
    }

    #[tokio::test]
    async fn open_circuit_skips_the_provider() {
        let provider = Arc::new(CountingProvider::new(0));
        let coordinator = coordinator(provider.clone());

        coordinator.breaker.record_failure("TSLA");
        coordinator.breaker.record_failure("TSLA");
        coordinator.breaker.record_failure("TSLA");
        coordinator.breaker.record_failure("TSLA");
        coordinator.breaker.record_failure("TSLA");

        let outcome = coordinator.fetch("TSLA").await;
        assert!(matches!(outcome, Err(FetchError::CircuitOpen)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
