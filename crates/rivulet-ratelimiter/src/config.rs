use rivulet_core::clock::{default_clock, Clock};
use std::sync::Arc;

/// Configuration for a [`TokenBucket`](crate::TokenBucket).
pub struct RateLimitConfig {
    pub(crate) name: String,
    pub(crate) rate: f64,
    pub(crate) burst: f64,
    pub(crate) tokens_per_operation: f64,
    pub(crate) fail_fast: bool,
    pub(crate) clock: Arc<dyn Clock>,
}

impl RateLimitConfig {
    /// Starts building a config with the given sustained rate in
    /// tokens per second.
    pub fn builder(rate: f64) -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new(rate)
    }
}

/// Builder for [`RateLimitConfig`].
///
/// Defaults: burst equal to the rate (no burst beyond one second of
/// tokens), one token per operation, blocking acquires.
pub struct RateLimitConfigBuilder {
    name: String,
    rate: f64,
    burst: Option<f64>,
    tokens_per_operation: f64,
    fail_fast: bool,
    clock: Arc<dyn Clock>,
}

impl RateLimitConfigBuilder {
    fn new(rate: f64) -> Self {
        assert!(
            rate.is_finite() && rate > 0.0,
            "rate must be a positive number of tokens per second"
        );
        Self {
            name: "<unnamed>".to_string(),
            rate,
            burst: None,
            tokens_per_operation: 1.0,
            fail_fast: false,
            clock: default_clock(),
        }
    }

    /// Sets the limiter name used in logs and metrics.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the bucket capacity, i.e. the maximum initial burst.
    ///
    /// # Panics
    ///
    /// Panics unless `burst` is positive and finite.
    pub fn burst(mut self, burst: f64) -> Self {
        assert!(
            burst.is_finite() && burst > 0.0,
            "burst must be a positive token count"
        );
        self.burst = Some(burst);
        self
    }

    /// Sets the token cost each acquire requests by default.
    pub fn tokens_per_operation(mut self, tokens: f64) -> Self {
        assert!(
            tokens.is_finite() && tokens > 0.0,
            "tokens_per_operation must be positive"
        );
        self.tokens_per_operation = tokens;
        self
    }

    /// Makes acquires non-blocking: callers get an immediate
    /// rate-limited error instead of waiting.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Replaces the clock, for virtual-time tests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the config.
    pub fn build(self) -> RateLimitConfig {
        RateLimitConfig {
            name: self.name,
            rate: self.rate,
            burst: self.burst.unwrap_or(self.rate),
            tokens_per_operation: self.tokens_per_operation,
            fail_fast: self.fail_fast,
            clock: self.clock,
        }
    }
}
