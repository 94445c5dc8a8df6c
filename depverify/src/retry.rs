use std::time::Duration;

use rand::distr::{Distribution, Uniform};

/// Bounded retry applied to transient key-server failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per server, including the first one.
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
        }
    }
}

/// Compute an exponential backoff delay with jitter.
///
/// `attempt` is zero-based. Jitter is applied in the range [0.5, 1.5] of the computed base delay.
pub fn backoff(base: Duration, attempt: u32) -> Duration {
    let multiplier = 1u128.checked_shl(attempt.min(16)).unwrap_or(1u128 << 16);
    let millis = base.as_millis().max(1);
    let scaled = millis.saturating_mul(multiplier);
    let max = scaled.min(u64::MAX as u128) as u64;
    let jitter = match Uniform::new_inclusive(0.5f64, 1.5f64) {
        Ok(uniform) => uniform.sample(&mut rand::rng()),
        Err(_) => 1.0,
    };
    let jittered = (max as f64 * jitter).round().clamp(1.0, u64::MAX as f64);
    Duration::from_millis(jittered as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_within_jitter_bounds() {
        let base = Duration::from_millis(100);
        for attempt in 0..4 {
            let nominal = 100u64 << attempt;
            let delay = backoff(base, attempt).as_millis() as u64;
            assert!(delay >= nominal / 2, "attempt {attempt}: {delay}ms");
            assert!(delay <= nominal * 3 / 2, "attempt {attempt}: {delay}ms");
        }
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        let delay = backoff(Duration::from_millis(1), 1_000);
        assert!(delay <= Duration::from_millis((1u64 << 16) * 3 / 2));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            base_backoff: Duration::ZERO,
        };
        assert_eq!(policy.attempts(), 1);
    }
}
