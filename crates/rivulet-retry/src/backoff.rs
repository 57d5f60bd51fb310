//! Backoff strategies for computing retry delays.

use rand::Rng;
use std::time::Duration;

/// Upper bound applied to every computed delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

const MAX_RETRY_SECS: f64 = 24.0 * 60.0 * 60.0;

/// Strategy for spacing retry attempts.
///
/// `attempt` is the retry index, 1 for the first retry. The jittered
/// strategies draw uniformly from their range on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// `base · 2^(attempt−1)`
    #[default]
    Exponential,
    /// `Uniform[0, base · 2^(attempt−1)]`
    ExponentialJitter,
    /// `Uniform[base, max(base, prev · 3)]`
    DecorrelatedJitter,
    /// `base · attempt`
    Linear,
    /// `Uniform[0, base · attempt]`
    LinearJitter,
}

impl Backoff {
    /// Computes the delay before retry `attempt` (1-indexed).
    ///
    /// `prev` is the delay sampled for the previous retry; only
    /// [`Backoff::DecorrelatedJitter`] consults it. The result is in
    /// `[0, 24h]` regardless of inputs.
    pub fn delay(self, base: Duration, attempt: u32, prev: Duration) -> Duration {
        let attempt = attempt.max(1);
        let base_secs = base.as_secs_f64();

        let secs = match self {
            Backoff::Exponential => ceiling(base_secs * pow2(attempt - 1)),
            Backoff::ExponentialJitter => uniform(0.0, ceiling(base_secs * pow2(attempt - 1))),
            Backoff::DecorrelatedJitter => {
                let lo = ceiling(base_secs);
                let hi = ceiling((prev.as_secs_f64() * 3.0).max(base_secs));
                uniform(lo, hi)
            }
            Backoff::Linear => ceiling(base_secs * f64::from(attempt)),
            Backoff::LinearJitter => uniform(0.0, ceiling(base_secs * f64::from(attempt))),
        };

        Duration::from_secs_f64(secs)
    }
}

fn pow2(k: u32) -> f64 {
    // 2^64 already exceeds the delay ceiling for any base >= 1ns.
    2f64.powi(k.min(64) as i32)
}

fn ceiling(secs: f64) -> f64 {
    secs.clamp(0.0, MAX_RETRY_SECS)
}

fn uniform(lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return lo;
    }
    rand::thread_rng().gen_range(lo..=hi)
}
