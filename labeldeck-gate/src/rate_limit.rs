//! Per-service token bucket rate limiter
//!
//! Guards every outbound call to an external service. Each configured service
//! owns one bucket: capacity `burst`, refilled continuously at
//! `rate_per_second`. A caller that finds the bucket empty sleeps one refill
//! interval and then takes its token, possibly leaving the bucket in debt.
//! Callers are not queued: concurrent waiters on an exhausted bucket each sleep
//! the same nominal interval, capped at [`MAX_REFILL_WAIT`].

use labeldeck_common::config::RateLimitConfig;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Longest single wait; one token at the slowest accepted configured rate
pub const MAX_REFILL_WAIT: Duration = Duration::from_secs(1_000_000);

/// Rate limiter errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimiterError {
    #[error("Service not configured for rate limiting: {0}")]
    ServiceNotConfigured(String),
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(limit: RateLimitConfig, now: Instant) -> Self {
        Self {
            tokens: limit.burst,
            max_tokens: limit.burst,
            refill_rate: limit.rate_per_second,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// Time for one token to accrue
    fn refill_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.refill_rate)
            .map_or(MAX_REFILL_WAIT, |interval| interval.min(MAX_REFILL_WAIT))
    }
}

/// Rate limiter over a static table of services
#[derive(Debug)]
pub struct RateLimiter {
    buckets: HashMap<String, Mutex<TokenBucket>>,
}

impl RateLimiter {
    /// Build one full bucket per configured service
    pub fn from_config(limits: &BTreeMap<String, RateLimitConfig>) -> Self {
        let now = Instant::now();
        let buckets = limits
            .iter()
            .map(|(name, limit)| (name.clone(), Mutex::new(TokenBucket::new(*limit, now))))
            .collect();

        Self { buckets }
    }

    /// Wait until a token is available for `service`, then take it.
    ///
    /// Returns how long the caller was held back.
    pub async fn throttle(&self, service: &str) -> Result<Duration, LimiterError> {
        let bucket = self.bucket(service)?;
        let started = Instant::now();

        let wait = {
            let mut state = bucket.lock().await;
            state.refill(started);
            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                return Ok(Duration::ZERO);
            }
            state.refill_interval()
        };

        tracing::debug!(
            service = service,
            wait_ms = wait.as_millis() as u64,
            "Rate limiting: bucket empty, waiting"
        );
        tokio::time::sleep(wait).await;

        // Take the token without re-checking; a burst of waiters leaves debt
        let mut state = bucket.lock().await;
        state.refill(Instant::now());
        state.tokens -= 1.0;

        Ok(started.elapsed())
    }

    /// Current token count for `service` (after refill)
    pub async fn tokens(&self, service: &str) -> Result<f64, LimiterError> {
        let mut state = self.bucket(service)?.lock().await;
        state.refill(Instant::now());
        Ok(state.tokens)
    }

    /// Whether `service` has a bucket
    pub fn is_configured(&self, service: &str) -> bool {
        self.buckets.contains_key(service)
    }

    /// Configured service ids, sorted
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.buckets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn bucket(&self, service: &str) -> Result<&Mutex<TokenBucket>, LimiterError> {
        self.buckets
            .get(service)
            .ok_or_else(|| LimiterError::ServiceNotConfigured(service.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(service: &str, rate: f64, burst: f64) -> RateLimiter {
        let mut limits = BTreeMap::new();
        limits.insert(service.to_string(), RateLimitConfig::new(rate, burst));
        RateLimiter::from_config(&limits)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_refill_interval_waits() {
        let limiter = limiter("svc", 5.0, 10.0);
        let start = Instant::now();

        let mut waits = Vec::new();
        for _ in 0..15 {
            waits.push(limiter.throttle("svc").await.unwrap());
        }

        for wait in &waits[..10] {
            assert_eq!(*wait, Duration::ZERO, "burst capacity should be immediate");
        }
        for wait in &waits[10..] {
            assert_eq!(*wait, Duration::from_millis(200));
        }
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_service_is_rejected() {
        let limiter = limiter("svc", 5.0, 10.0);
        assert_eq!(
            limiter.throttle("nope").await,
            Err(LimiterError::ServiceNotConfigured("nope".to_string()))
        );
        assert!(limiter.tokens("nope").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_never_exceed_capacity() {
        let limiter = limiter("svc", 2.0, 4.0);
        limiter.throttle("svc").await.unwrap();

        tokio::time::advance(Duration::from_secs(3600)).await;

        assert_eq!(limiter.tokens("svc").await.unwrap(), 4.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_stay_within_bounds_over_mixed_sequence() {
        let limiter = limiter("svc", 3.0, 5.0);

        // Deterministic mix of bursts and idle gaps
        let pattern: [(usize, u64); 6] = [(7, 0), (2, 100), (9, 50), (1, 2000), (12, 10), (3, 400)];
        for (calls, idle_ms) in pattern {
            for _ in 0..calls {
                limiter.throttle("svc").await.unwrap();
                let tokens = limiter.tokens("svc").await.unwrap();
                assert!(tokens <= 5.0, "tokens {} above capacity", tokens);
                assert!(tokens >= -1.0, "tokens {} beyond debt bound", tokens);
            }
            tokio::time::advance(Duration::from_millis(idle_ms)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_each_take_one_token() {
        let limiter = Arc::new(limiter("svc", 10.0, 3.0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.throttle("svc").await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Duration::ZERO);
        }

        let remaining = limiter.tokens("svc").await.unwrap();
        assert!(remaining.abs() < 1e-9, "expected empty bucket, got {}", remaining);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanishing_rate_waits_at_most_the_cap() {
        let limiter = limiter("svc", 1e-20, 1.0);

        assert_eq!(limiter.throttle("svc").await.unwrap(), Duration::ZERO);
        assert_eq!(limiter.throttle("svc").await.unwrap(), MAX_REFILL_WAIT);
    }

    #[test]
    fn test_services_listing_is_sorted() {
        let mut limits = BTreeMap::new();
        limits.insert("youtube".to_string(), RateLimitConfig::new(5.0, 20.0));
        limits.insert("instagram".to_string(), RateLimitConfig::new(2.0, 10.0));
        let limiter = RateLimiter::from_config(&limits);

        assert_eq!(limiter.services(), vec!["instagram", "youtube"]);
        assert!(limiter.is_configured("youtube"));
        assert!(!limiter.is_configured("spotify"));
    }
}
