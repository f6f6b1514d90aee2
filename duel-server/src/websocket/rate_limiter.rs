use std::time::{Duration, Instant};

/// Per-connection token bucket for inbound messages. Guess spam is the only
/// realistic abuse vector on this protocol, so the bucket is small.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tokens: u32,
    max_tokens: u32,
    refill_interval: Duration,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(10, Duration::from_millis(200))
    }

    pub fn with_limits(max_tokens: u32, refill_interval: Duration) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_interval,
            last_refill: Instant::now(),
        }
    }

    /// Take one token, refilling first. False means the caller should drop
    /// the message (and probably the connection).
    pub fn check_rate_limit(&mut self) -> bool {
        self.refill();
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed();
        if elapsed < self.refill_interval {
            return;
        }
        let refills = (elapsed.as_millis() / self.refill_interval.as_millis()) as u32;
        self.tokens = (self.tokens + refills).min(self.max_tokens);
        self.last_refill = Instant::now();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
