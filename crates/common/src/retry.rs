use rand::Rng;
use std::time::Duration;

/// How long to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDelay {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `min(max, base * 2^retry) +/- jitter`.
    Exponential {
        base: Duration,
        max: Duration,
        /// Jitter as a fraction of the delay (0.0 to 1.0).
        jitter_factor: f64,
    },
}

/// Retry count plus delay schedule.
///
/// `retries` counts additional attempts, so a policy with `retries = 2`
/// allows three attempts in total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    retries: u32,
    delay: RetryDelay,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: RetryDelay::Fixed(Duration::ZERO),
        }
    }

    /// `retries` additional attempts, each after `delay`.
    pub fn fixed(retries: u32, delay: Duration) -> Self {
        Self {
            retries,
            delay: RetryDelay::Fixed(delay),
        }
    }

    /// `retries` additional attempts with exponentially growing delay.
    ///
    /// Negative jitter factors are clamped to 0.
    pub fn exponential(retries: u32, base: Duration, max: Duration, jitter_factor: f64) -> Self {
        Self {
            retries,
            delay: RetryDelay::Exponential {
                base,
                max,
                jitter_factor: jitter_factor.clamp(0.0, 1.0),
            },
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Upper bound on attempts, first attempt included.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Whether another attempt is allowed after `attempts_made` attempts.
    pub fn allows_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts()
    }

    /// Delay before retry number `retry` (0-based: the wait after the first failure is retry 0).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.delay {
            RetryDelay::Fixed(delay) => delay,
            RetryDelay::Exponential {
                base,
                max,
                jitter_factor,
            } => {
                let capped = base.saturating_mul(2u32.saturating_pow(retry)).min(max);

                let jitter_range = capped.as_secs_f64() * jitter_factor;
                let jitter = if jitter_range > 0.0 {
                    rand::thread_rng().gen_range(-jitter_range..=jitter_range)
                } else {
                    0.0
                };

                Duration::from_secs_f64((capped.as_secs_f64() + jitter).max(0.0))
            }
        }
    }
}
