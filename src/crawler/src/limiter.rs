//! Token-bucket rate limiting for detail lookups

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{CrawlError, RateLimitError, Result};

/// Smallest wait between two refill attempts
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Slowest accepted refill rate in tokens per second
pub const MIN_RATE: f64 = 1e-6;

struct Bucket {
    /// Tokens currently available (fractional while refilling)
    tokens: f64,

    /// Last refill time
    last_refill: Instant,
}

/// Shared token bucket gating outbound detail-lookup calls
///
/// Refills at `rate` tokens per second up to `burst` tokens and starts full. One instance is
/// shared (via `Arc`) by every task of a run, so the bound is global rather than per task.
pub struct RateLimiter {
    rate: f64,
    burst: u32,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` calls per second with bursts of up to `burst` calls
    pub fn new(rate: f64, burst: u32) -> Result<Self> {
        if !rate.is_finite() || rate < MIN_RATE {
            return Err(CrawlError::configuration(format!(
                "rate limit must be at least {} requests per second, got {}",
                MIN_RATE, rate
            )));
        }
        if burst == 0 {
            return Err(CrawlError::configuration("rate limit burst must be at least 1"));
        }

        Ok(Self {
            rate,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Steady-state rate in tokens per second
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Bucket capacity
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Wait until a token is available, or until `cancel` fires
    ///
    /// A cancelled wait consumes nothing and the caller must not proceed with the call it was
    /// gating.
    pub async fn acquire(&self, cancel: &CancellationToken) -> std::result::Result<(), RateLimitError> {
        loop {
            if cancel.is_cancelled() {
                return Err(RateLimitError::Cancelled);
            }

            let wait = {
                let mut bucket = self.bucket.lock();
                self.refill(&mut bucket);

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }

                let deficit = 1.0 - bucket.tokens;
                Duration::from_secs_f64(deficit / self.rate).max(MIN_WAIT)
            };

            debug!("Rate limit reached, waiting {}ms", wait.as_millis());

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                _ = sleep(wait) => {}
            }
        }
    }

    /// Take a token without waiting
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens available right now
    pub fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens.floor() as u32
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill);

        if !elapsed.is_zero() {
            bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst as f64);
            bucket.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_settings() {
        assert!(RateLimiter::new(0.0, 4).is_err());
        assert!(RateLimiter::new(-1.0, 4).is_err());
        assert!(RateLimiter::new(f64::NAN, 4).is_err());
        assert!(RateLimiter::new(4.0, 0).is_err());
        assert!(RateLimiter::new(4.0, 4).is_ok());
    }

    #[test]
    fn test_rejects_rates_below_minimum() {
        assert!(RateLimiter::new(1e-20, 1).is_err());
        assert!(RateLimiter::new(MIN_RATE / 2.0, 1).is_err());
        assert!(RateLimiter::new(MIN_RATE, 1).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slowest_rate_waits_without_overflow() {
        let limiter = std::sync::Arc::new(RateLimiter::new(MIN_RATE, 1).unwrap());
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire(&cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!waiter.is_finished());
        cancel.cancel();

        assert_eq!(waiter.await.unwrap(), Err(RateLimitError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_immediate() {
        let limiter = RateLimiter::new(2.0, 3).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire(&cancel).await.unwrap();
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_refill() {
        let limiter = RateLimiter::new(4.0, 1).unwrap();
        let cancel = CancellationToken::new();

        limiter.acquire(&cancel).await.unwrap();
        let start = Instant::now();
        limiter.acquire(&cancel).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(250), "waited {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(300), "waited {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_caps_at_burst() {
        let limiter = RateLimiter::new(10.0, 2).unwrap();
        assert_eq!(limiter.available(), 2);

        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert_eq!(limiter.available(), 0);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_wait() {
        let limiter = RateLimiter::new(1.0, 1).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(limiter.acquire(&cancel).await, Err(RateLimitError::Cancelled));
        // Nothing was consumed
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_wait() {
        let limiter = std::sync::Arc::new(RateLimiter::new(0.1, 1).unwrap());
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire(&cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let result = waiter.await.unwrap();
        assert_eq!(result, Err(RateLimitError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_pends_on_empty_bucket() {
        use tokio_test::{assert_pending, assert_ready_ok, task};

        let limiter = RateLimiter::new(2.0, 1).unwrap();
        let cancel = CancellationToken::new();
        assert!(limiter.try_acquire());

        let mut acquire = task::spawn(limiter.acquire(&cancel));
        assert_pending!(acquire.poll());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_ready_ok!(acquire.poll());
    }
}
