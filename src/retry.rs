//! Exponential backoff policy for the connect retry loop

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with a growth multiplier, a per-delay cap, and
/// optional jitter of 0-25% to spread reconnect storms.
#[derive(Debug, Clone)]
pub(crate) struct ExponentialBackoff {
    /// Delay before the first retry.
    pub initial: Duration,

    /// Cap applied to the un-jittered delay.
    pub max: Duration,

    /// Growth factor between consecutive delays.
    pub multiplier: f64,

    /// Add a random 0-25% on top of each delay.
    pub jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 1.5,
            jitter: true,
        }
    }
}

impl ExponentialBackoff {
    /// Delay to sleep before the given zero-indexed retry attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max.as_secs_f64());
        let delay = if self.jitter {
            capped * (1.0 + rand::thread_rng().gen_range(0.0..0.25))
        } else {
            capped
        };
        Duration::from_secs_f64(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn without_jitter() -> ExponentialBackoff {
        ExponentialBackoff {
            jitter: false,
            ..ExponentialBackoff::default()
        }
    }

    #[test]
    fn delays_grow_by_the_multiplier() {
        let backoff = without_jitter();
        assert_eq!(backoff.delay(0), Duration::from_millis(500));
        assert_eq!(backoff.delay(1), Duration::from_millis(750));
        assert_eq!(backoff.delay(2), Duration::from_millis(1125));
    }

    #[test]
    fn delays_are_capped() {
        let backoff = without_jitter();
        assert_eq!(backoff.delay(100), backoff.max);
    }

    #[test]
    fn jitter_stays_within_a_quarter_of_the_base() {
        let backoff = ExponentialBackoff::default();
        for attempt in 0..8 {
            let base = without_jitter().delay(attempt);
            let jittered = backoff.delay(attempt);
            assert!(jittered >= base, "attempt {attempt}");
            assert!(jittered <= base.mul_f64(1.25), "attempt {attempt}");
        }
    }
}
