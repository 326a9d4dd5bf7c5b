//! Process-wide token bucket used to throttle request admission.
//!
//! ```text
//! capacity (burst) = 4, refill = 2 tokens/s
//!
//! t=0.0s  [####]  request → [###.]
//! t=0.0s  [###.]  3 requests → [....]
//! t=0.0s  [....]  request → rejected, retry in 0.5s
//! t=0.5s  [#...]  request → [....]
//! ```

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterConfig {
    /// Maximum number of tokens (burst capacity)
    pub capacity: u32,
    /// Tokens refilled per second
    pub refill_per_sec: f64,
}

impl RateLimiterConfig {
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        Self {
            capacity: burst.max(1),
            refill_per_sec: f64::from(rate_per_sec),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket shared by every guarded request.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(config.capacity),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token. On rejection returns how long until a token is
    /// available again.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock();

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens =
            (bucket.tokens + elapsed * self.config.refill_per_sec).min(f64::from(self.config.capacity));
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }

        if self.config.refill_per_sec <= 0.0 {
            // Never refills; report a nominal minute.
            return Err(Duration::from_secs(60));
        }
        let missing = 1.0 - bucket.tokens;
        Err(Duration::from_secs_f64(missing / self.config.refill_per_sec))
    }

    pub fn available_tokens(&self) -> f64 {
        self.bucket.lock().tokens
    }

    pub fn config(&self) -> RateLimiterConfig {
        self.config
    }
}
