use crate::circuit::CircuitState;
use crate::events::CircuitBreakerEvent;
use rivulet_core::clock::{default_clock, Clock};
use rivulet_core::events::ListenerSet;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a [`CircuitBreaker`](crate::CircuitBreaker).
pub struct CircuitBreakerConfig {
    pub(crate) name: String,
    pub(crate) failure_threshold: u32,
    pub(crate) sampling_duration: Option<Duration>,
    pub(crate) open_timeout: Duration,
    pub(crate) success_threshold: u32,
    pub(crate) probe_budget: u32,
    pub(crate) listeners: ListenerSet<CircuitBreakerEvent>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl CircuitBreakerConfig {
    /// Starts building a config.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

/// Builder for [`CircuitBreakerConfig`].
///
/// Defaults: 5 consecutive failures trip the breaker, 30s open timeout,
/// 3 half-open successes close it, probe budget equal to the success
/// threshold.
pub struct CircuitBreakerConfigBuilder {
    name: String,
    failure_threshold: u32,
    sampling_duration: Option<Duration>,
    open_timeout: Duration,
    success_threshold: u32,
    probe_budget: Option<u32>,
    listeners: ListenerSet<CircuitBreakerEvent>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerConfigBuilder {
    fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            failure_threshold: 5,
            sampling_duration: None,
            open_timeout: Duration::from_secs(30),
            success_threshold: 3,
            probe_budget: None,
            listeners: ListenerSet::new(),
            clock: default_clock(),
        }
    }

    /// Sets the breaker name used in events.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Number of failures that trips the breaker.
    ///
    /// Without a sampling duration this counts consecutive failures,
    /// reset by any success; with one it counts failures inside the
    /// rolling window.
    ///
    /// # Panics
    ///
    /// Panics if `failure_threshold` is zero.
    pub fn failure_threshold(mut self, failure_threshold: u32) -> Self {
        assert!(failure_threshold > 0, "failure_threshold must be >= 1");
        self.failure_threshold = failure_threshold;
        self
    }

    /// Switches failure accounting to a rolling window of this length.
    pub fn sampling_duration(mut self, sampling_duration: Duration) -> Self {
        self.sampling_duration = Some(sampling_duration);
        self
    }

    /// Minimum time the breaker stays Open before probing.
    pub fn open_timeout(mut self, open_timeout: Duration) -> Self {
        self.open_timeout = open_timeout;
        self
    }

    /// Consecutive half-open successes required to close the breaker.
    ///
    /// # Panics
    ///
    /// Panics if `success_threshold` is zero.
    pub fn success_threshold(mut self, success_threshold: u32) -> Self {
        assert!(success_threshold > 0, "success_threshold must be >= 1");
        self.success_threshold = success_threshold;
        self
    }

    /// Number of probe calls admitted while HalfOpen.
    ///
    /// Defaults to the success threshold.
    pub fn probe_budget(mut self, probe_budget: u32) -> Self {
        assert!(probe_budget > 0, "probe_budget must be >= 1");
        self.probe_budget = Some(probe_budget);
        self
    }

    /// Registers a callback for state transitions.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState, &'static str) + Send + Sync + 'static,
    {
        self.listeners.attach(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                from, to, reason, ..
            } = event
            {
                f(*from, *to, reason);
            }
        });
        self
    }

    /// Registers a listener for every breaker event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.listeners.attach(f);
        self
    }

    /// Replaces the clock, for virtual-time tests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the config.
    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            name: self.name,
            failure_threshold: self.failure_threshold,
            sampling_duration: self.sampling_duration,
            open_timeout: self.open_timeout,
            success_threshold: self.success_threshold,
            probe_budget: self.probe_budget.unwrap_or(self.success_threshold),
            listeners: self.listeners,
            clock: self.clock,
        }
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
