use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::models::Quote;

/// Thread-safe cache of the latest known quote per symbol.
///
/// Reads are snapshot clones; writes replace the whole entry so readers
/// never observe a half-written quote. Entries unseen for longer than the
/// max-idle window are evicted to bound memory.
#[derive(Clone)]
pub struct QuoteCache {
    entries: Arc<DashMap<String, Quote>>,
    ttl: Duration,
    max_idle: Duration,
}

impl QuoteCache {
    pub fn new(ttl: Duration, max_idle: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            max_idle,
        }
    }

    pub fn from_env() -> Self {
        let ttl_secs = std::env::var("QUOTE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(30);
        let max_idle_secs = std::env::var("QUOTE_MAX_IDLE_SECS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(900);
        Self::new(Duration::seconds(ttl_secs), Duration::seconds(max_idle_secs))
    }

    /// Return the cached quote only while it is within its TTL.
    pub fn get_fresh(&self, symbol: &str) -> Option<Quote> {
        let entry = self.entries.get(symbol)?;
        if Utc::now() - entry.fetched_at < self.ttl {
            Some(entry.value().clone())
        } else {
            None
        }
    }

    /// Return whatever is cached, fresh or not. Stale-serve fallback.
    pub fn get_any(&self, symbol: &str) -> Option<Quote> {
        self.entries.get(symbol).map(|e| e.value().clone())
    }

    /// True when the entry is absent or past its TTL.
    pub fn needs_refresh(&self, symbol: &str) -> bool {
        self.get_fresh(symbol).is_none()
    }

    /// Atomically replace the entry for the quote's symbol. Writes carrying
    /// an older `fetched_at` than the current entry are dropped, keeping
    /// `fetched_at` non-decreasing per symbol.
    pub fn insert(&self, quote: Quote) {
        match self.entries.entry(quote.symbol.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut e) => {
                if quote.fetched_at >= e.get().fetched_at {
                    e.insert(quote);
                }
            }
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(quote);
            }
        }
    }

    /// Drop entries unseen for longer than the max-idle window.
    /// Returns the number of evicted entries.
    pub fn evict_idle(&self) -> usize {
        let before = self.entries.len();
        let now = Utc::now();
        let max_idle = self.max_idle;
        self.entries
            .retain(|_, quote| now - quote.fetched_at <= max_idle);
        before - self.entries.len()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, price: f64, age: Duration) -> Quote {
        let now = Utc::now();
        Quote {
            symbol: symbol.to_string(),
            price,
            change: 0.0,
            change_percent: 0.0,
            volume: None,
            market_cap: None,
            as_of: now - age,
            fetched_at: now - age,
        }
    }

    #[test]
    fn fresh_within_ttl_stale_after() {
        let cache = QuoteCache::new(Duration::seconds(30), Duration::seconds(900));

        cache.insert(quote("AAPL", 175.5, Duration::seconds(5)));
        assert!(cache.get_fresh("AAPL").is_some());

        cache.insert(quote("MSFT", 380.2, Duration::seconds(60)));
        assert!(cache.get_fresh("MSFT").is_none());
        assert!(cache.get_any("MSFT").is_some());
        assert!(cache.needs_refresh("MSFT"));
    }

    #[test]
    fn stale_write_does_not_clobber_newer_entry() {
        let cache = QuoteCache::new(Duration::seconds(30), Duration::seconds(900));

        cache.insert(quote("AAPL", 175.5, Duration::seconds(1)));
        cache.insert(quote("AAPL", 170.0, Duration::seconds(120)));

        let current = cache.get_any("AAPL").unwrap();
        assert_eq!(current.price, 175.5);
    }

    #[test]
    fn evict_drops_only_idle_entries() {
        let cache = QuoteCache::new(Duration::seconds(30), Duration::seconds(300));

        cache.insert(quote("AAPL", 175.5, Duration::seconds(10)));
        cache.insert(quote("TSLA", 248.5, Duration::seconds(600)));

        let evicted = cache.evict_idle();
        assert_eq!(evicted, 1);
        assert!(cache.get_any("AAPL").is_some());
        assert!(cache.get_any("TSLA").is_none());
    }
}
