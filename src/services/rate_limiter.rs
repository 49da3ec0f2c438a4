use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration, Instant};
use parking_lot::Mutex;

/// Budgets upstream quote requests.
///
/// The semaphore caps concurrent fetches (the worker-pool ceiling); the
/// minimum inter-request delay spreads calls so the provider's
/// queries-per-minute quota is never exceeded even at full concurrency.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    last_request: Arc<Mutex<Instant>>,
    min_delay: Duration,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, requests_per_minute: u32) -> Self {
        let min_delay_ms = 60_000 / requests_per_minute.max(1) as u64;
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            last_request: Arc::new(Mutex::new(Instant::now() - Duration::from_secs(60))),
            min_delay: Duration::from_millis(min_delay_ms),
        }
    }

    pub fn from_env() -> Self {
        let max_concurrent = std::env::var("FETCH_MAX_CONCURRENT")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(3);
        let requests_per_minute = std::env::var("FETCH_REQUESTS_PER_MINUTE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(30);
        Self::new(max_concurrent, requests_per_minute)
    }

    /// Wait for a worker slot and for the inter-request delay to elapse.
    /// The returned guard releases the slot when dropped.
    pub async fn acquire(&self) -> RateLimitGuard {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("rate limiter semaphore closed");

        let wait_time = {
            let last = self.last_request.lock();
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                Some(self.min_delay - elapsed)
            } else {
                None
            }
        };

        // Sleep outside the lock.
        if let Some(delay) = wait_time {
            sleep(delay).await;
        }

        *self.last_request.lock() = Instant::now();

        RateLimitGuard { _permit: permit }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

pub struct RateLimitGuard {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant as StdInstant;

    #[tokio::test]
    async fn enforces_minimum_delay_between_requests() {
        // 60 per minute = 1 per second.
        let limiter = RateLimiter::new(2, 60);

        let start = StdInstant::now();

        let guard = limiter.acquire().await;
        assert!(start.elapsed().as_millis() < 100);
        drop(guard);

        let _guard = limiter.acquire().await;
        assert!(start.elapsed().as_millis() >= 900);
    }

    #[tokio::test]
    async fn caps_concurrent_fetches() {
        let limiter = Arc::new(RateLimiter::new(2, 120));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    let _guard = limiter.acquire().await;
                    sleep(Duration::from_millis(100)).await;
                })
            })
            .collect();

        // The third waits for a slot but all complete.
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
