use std::time::Instant;

use dashmap::DashMap;

use crate::config::RateLimitSettings;

/// Token bucket state for a single session.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Buckets start full so a new session gets its burst allowance.
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, capacity: f64, rate_per_sec: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate_per_sec).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-session token bucket limiter for non-heartbeat frames.
///
/// Buckets are created lazily on first use and dropped with the session.
/// The check is O(1) and synchronous; a degenerate configuration (zero
/// refill period) resolves to an infinite rate, i.e. the limiter fails open
/// rather than locking clients out.
pub struct SessionRateLimiter {
    buckets: DashMap<String, TokenBucket>,
    capacity: f64,
    rate_per_sec: f64,
}

impl SessionRateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        let period = settings.refill_period.as_secs_f64();
        let rate_per_sec = if period > 0.0 {
            f64::from(settings.refill_tokens) / period
        } else {
            f64::INFINITY
        };
        Self {
            buckets: DashMap::new(),
            capacity: f64::from(settings.capacity),
            rate_per_sec,
        }
    }

    /// Take one token for the session, reporting whether the frame may
    /// proceed.
    pub fn try_consume(&self, session_id: &str) -> bool {
        let mut bucket = self
            .buckets
            .entry(session_id.to_owned())
            .or_insert_with(|| TokenBucket::new(self.capacity));
        bucket.try_consume(self.capacity, self.rate_per_sec)
    }

    /// Drop the session's bucket as part of lifecycle cleanup. Idempotent.
    pub fn remove_session(&self, session_id: &str) {
        self.buckets.remove(session_id);
    }

    pub fn tracked_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(capacity: u32, refill_tokens: u32, refill_period: Duration) -> RateLimitSettings {
        RateLimitSettings {
            capacity,
            refill_tokens,
            refill_period,
        }
    }

    #[test]
    fn burst_up_to_capacity_then_rejects() {
        let limiter = SessionRateLimiter::new(&settings(10, 5, Duration::from_secs(1)));

        for _ in 0..10 {
            assert!(limiter.try_consume("s1"));
        }
        assert!(!limiter.try_consume("s1"));
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = SessionRateLimiter::new(&settings(2, 10, Duration::from_secs(1)));

        assert!(limiter.try_consume("s1"));
        assert!(limiter.try_consume("s1"));
        assert!(!limiter.try_consume("s1"));

        // 10 tokens/sec: 150 ms buys at least one token back.
        std::thread::sleep(Duration::from_millis(150));
        assert!(limiter.try_consume("s1"));
    }

    #[test]
    fn sessions_are_limited_independently() {
        let limiter = SessionRateLimiter::new(&settings(3, 1, Duration::from_secs(1)));

        for _ in 0..3 {
            assert!(limiter.try_consume("s1"));
            assert!(limiter.try_consume("s2"));
        }
        assert!(!limiter.try_consume("s1"));
        assert!(!limiter.try_consume("s2"));
    }

    #[test]
    fn removal_resets_the_bucket() {
        let limiter = SessionRateLimiter::new(&settings(1, 1, Duration::from_secs(3600)));

        assert!(limiter.try_consume("s1"));
        assert!(!limiter.try_consume("s1"));

        limiter.remove_session("s1");
        assert_eq!(limiter.tracked_count(), 0);
        assert!(limiter.try_consume("s1"));
    }

    #[test]
    fn zero_refill_period_fails_open() {
        let limiter = SessionRateLimiter::new(&settings(1, 1, Duration::ZERO));

        assert!(limiter.try_consume("s1"));
        assert!(limiter.try_consume("s1"));
        assert!(limiter.try_consume("s1"));
    }
}
