//! Inter-retry delay computation.
use rand::Rng;
use tokio::time::Duration;

/// Geometric backoff applied before each retry.
///
/// The first attempt is unconditional; retry `n` (counted from 1) waits
/// `base * (1 + growth)^(n - 1)`, optionally capped and jittered.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    base: Duration,

    /// Growth applied to the delay for each further retry.
    growth: f64,

    /// Upper bound on the computed delay.
    cap: Option<Duration>,

    /// Extra random fraction (0.0 disables jitter).
    jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            growth: 0.3,
            cap: Some(Duration::from_secs(60)),
            jitter: 0.0,
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with an explicit base delay and growth factor.
    pub fn new(base: Duration, growth: f64) -> Self {
        Self {
            base,
            growth,
            cap: None,
            jitter: 0.0,
        }
    }

    /// Bound the computed delay.
    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = Some(cap);
        self
    }

    /// Add up to `jitter` as a random fraction of the delay, spreading
    /// simultaneous retries apart.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Deterministic delay before retry `retry` (counted from 1).
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let secs = self.base.as_secs_f64() * (1.0 + self.growth).powi(exponent as i32);
        let delay = Duration::from_secs_f64(secs);
        match self.cap {
            Some(cap) if delay > cap => cap,
            _ => delay,
        }
    }

    /// Delay with jitter applied, used for the actual sleep.
    pub fn jittered(&self, retry: u32) -> Duration {
        let delay = self.delay(retry);
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(0.0..self.jitter);
        delay.mul_f64(factor)
    }
}
