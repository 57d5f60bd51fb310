//! The token bucket itself.

use crate::config::RateLimitConfig;
use crate::error::RateLimitedError;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct BucketState {
    /// May go negative: a negative balance is the reservation queue of
    /// waiters that have already been promised tokens, in FIFO order.
    tokens: f64,
    refilled_at: Instant,
}

/// A token bucket with sustained `rate`, burst `capacity`, fractional
/// token accounting and FIFO-fair waits.
///
/// Fairness comes from the reservation scheme: an acquire deducts its
/// cost immediately (possibly driving the balance negative) and then
/// sleeps long enough for the refill to cover its share. A later caller
/// sees a more negative balance and therefore computes a strictly longer
/// wait, so admission order equals arrival order.
pub struct TokenBucket {
    config: RateLimitConfig,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Creates a bucket from its config, initially full.
    pub fn new(config: RateLimitConfig) -> Self {
        let refilled_at = config.clock.now();
        let tokens = config.burst;
        Self {
            config,
            state: Mutex::new(BucketState {
                tokens,
                refilled_at,
            }),
        }
    }

    /// Shorthand for building the config inline.
    pub fn builder(rate: f64) -> crate::config::RateLimitConfigBuilder {
        RateLimitConfig::builder(rate)
    }

    /// The limiter's configured name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The default token cost per operation.
    pub fn tokens_per_operation(&self) -> f64 {
        self.config.tokens_per_operation
    }

    /// True when acquires should fail immediately instead of waiting.
    pub fn is_fail_fast(&self) -> bool {
        self.config.fail_fast
    }

    /// Currently available tokens (never reported below zero).
    pub fn available(&self) -> f64 {
        let now = self.config.clock.now();
        let mut state = self.state.lock().expect("token bucket poisoned");
        self.refill(&mut state, now);
        state.tokens.max(0.0)
    }

    /// Acquires `cost` tokens, waiting for the refill when necessary.
    ///
    /// Returns the time actually waited. Cancel-safe: dropping the
    /// returned future refunds the reservation.
    pub async fn acquire(&self, cost: f64) -> Duration {
        let wait = self.reserve(cost);
        if wait.is_zero() {
            return Duration::ZERO;
        }

        let mut guard = Refund {
            bucket: self,
            cost,
            armed: true,
        };
        self.config.clock.sleep(wait).await;
        guard.armed = false;

        #[cfg(feature = "tracing")]
        tracing::trace!(
            ratelimiter = %self.config.name,
            waited_ms = wait.as_millis() as u64,
            "rate limit wait complete"
        );

        wait
    }

    /// Acquires `cost` tokens only if they are available right now.
    pub fn try_acquire(&self, cost: f64) -> Result<(), RateLimitedError> {
        let now = self.config.clock.now();
        let mut state = self.state.lock().expect("token bucket poisoned");
        self.refill(&mut state, now);
        if state.tokens >= cost {
            state.tokens -= cost;
            Ok(())
        } else {
            let missing = cost - state.tokens;

            #[cfg(feature = "metrics")]
            metrics::counter!(
                "ratelimiter_rejected_total",
                "ratelimiter" => self.config.name.clone()
            )
            .increment(1);

            Err(RateLimitedError {
                retry_after: Duration::from_secs_f64(missing / self.config.rate),
            })
        }
    }

    /// Deducts `cost` and returns how long the caller must wait for the
    /// refill to cover it.
    fn reserve(&self, cost: f64) -> Duration {
        let now = self.config.clock.now();
        let mut state = self.state.lock().expect("token bucket poisoned");
        self.refill(&mut state, now);
        state.tokens -= cost;
        if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.tokens / self.config.rate)
        }
    }

    fn refund(&self, cost: f64) {
        let mut state = self.state.lock().expect("token bucket poisoned");
        state.tokens = (state.tokens + cost).min(self.config.burst);
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.refilled_at);
        state.refilled_at = now;
        state.tokens =
            (state.tokens + elapsed.as_secs_f64() * self.config.rate).min(self.config.burst);
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("name", &self.config.name)
            .field("rate", &self.config.rate)
            .field("burst", &self.config.burst)
            .finish()
    }
}

struct Refund<'a> {
    bucket: &'a TokenBucket,
    cost: f64,
    armed: bool,
}

impl Drop for Refund<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.bucket.refund(self.cost);
        }
    }
}
