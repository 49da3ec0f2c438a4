use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct BreakerEntry {
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
}

/// Per-symbol circuit breaker for upstream fetches.
///
/// After `failure_threshold` consecutive failures the circuit opens and
/// fetch attempts for the symbol are skipped for the cool-down period
/// (callers serve stale cache in the meantime). Once the cool-down passes
/// the next attempt is allowed through; success closes the circuit.
#[derive(Clone)]
pub struct FetchBreaker {
    entries: Arc<DashMap<String, BreakerEntry>>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl FetchBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }

    pub fn from_env() -> Self {
        let threshold = std::env::var("CIRCUIT_FAILURE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(5);
        let cooldown_secs = std::env::var("CIRCUIT_COOLDOWN_SECS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(300);
        Self::new(threshold, Duration::seconds(cooldown_secs))
    }

    /// True while the symbol's circuit is open and still cooling down.
    pub fn is_open(&self, symbol: &str) -> bool {
        if let Some(entry) = self.entries.get(symbol) {
            if let Some(opened_at) = entry.opened_at {
                return Utc::now() < opened_at + self.cooldown;
            }
        }
        false
    }

    pub fn record_failure(&self, symbol: &str) {
        let mut entry = self
            .entries
            .entry(symbol.to_string())
            .or_insert(BreakerEntry {
                consecutive_failures: 0,
                opened_at: None,
            });
        entry.consecutive_failures += 1;
        if entry.consecutive_failures >= self.failure_threshold {
            // Re-stamp on every failure past the threshold so a failing
            // half-open probe restarts the cool-down.
            entry.opened_at = Some(Utc::now());
        }
    }

    pub fn record_success(&self, symbol: &str) {
        self.entries.remove(symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = FetchBreaker::new(3, Duration::minutes(5));

        breaker.record_failure("AAPL");
        breaker.record_failure("AAPL");
        assert!(!breaker.is_open("AAPL"));

        breaker.record_failure("AAPL");
        assert!(breaker.is_open("AAPL"));
    }

    #[test]
    fn success_closes_the_circuit() {
        let breaker = FetchBreaker::new(2, Duration::minutes(5));

        breaker.record_failure("TSLA");
        breaker.record_failure("TSLA");
        assert!(breaker.is_open("TSLA"));

        breaker.record_success("TSLA");
        assert!(!breaker.is_open("TSLA"));
    }

    #[test]
    fn half_open_after_cooldown_elapses() {
        let breaker = FetchBreaker::new(1, Duration::seconds(-1));

        breaker.record_failure("MSFT");
        // Cool-down already elapsed, so the next attempt goes through.
        assert!(!breaker.is_open("MSFT"));
    }

    #[test]
    fn symbols_are_isolated() {
        let breaker = FetchBreaker::new(1, Duration::minutes(5));

        breaker.record_failure("AAPL");
        assert!(breaker.is_open("AAPL"));
        assert!(!breaker.is_open("MSFT"));
    }
}
