use crate::events::AdaptiveEvent;
use rivulet_core::clock::{default_clock, Clock};
use rivulet_core::events::ListenerSet;
use std::sync::Arc;
use std::time::Duration;

/// How the controller moves the slot target at sample boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdaptationStrategy {
    /// Additive increase (+1), multiplicative decrease (×0.5).
    #[default]
    Aimd,
    /// Multiplicative increase (×1.10, rounded up), decrease ×0.5.
    Aggressive,
    /// Additive increase (+1), gentle decrease (×0.75).
    Gradual,
}

/// Configuration for an [`AdaptiveController`](crate::AdaptiveController).
pub struct AdaptiveConfig {
    pub(crate) name: String,
    pub(crate) min: usize,
    pub(crate) max: usize,
    pub(crate) initial: usize,
    pub(crate) sample_interval: Duration,
    pub(crate) target_latency: Duration,
    pub(crate) min_success_rate: f64,
    pub(crate) strategy: AdaptationStrategy,
    pub(crate) listeners: ListenerSet<AdaptiveEvent>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl AdaptiveConfig {
    /// Starts building a config for targets within `[min, max]`.
    pub fn builder(min: usize, max: usize) -> AdaptiveConfigBuilder {
        AdaptiveConfigBuilder::new(min, max)
    }
}

/// Builder for [`AdaptiveConfig`].
///
/// Defaults: start at `min`, 500ms sample interval, 100ms target p50
/// latency, 0.9 minimum success rate, AIMD strategy.
pub struct AdaptiveConfigBuilder {
    name: String,
    min: usize,
    max: usize,
    initial: Option<usize>,
    sample_interval: Duration,
    target_latency: Duration,
    min_success_rate: f64,
    strategy: AdaptationStrategy,
    listeners: ListenerSet<AdaptiveEvent>,
    clock: Arc<dyn Clock>,
}

impl AdaptiveConfigBuilder {
    fn new(min: usize, max: usize) -> Self {
        assert!(min >= 1, "min concurrency must be >= 1");
        assert!(max >= min, "max concurrency must be >= min");
        Self {
            name: "<unnamed>".to_string(),
            min,
            max,
            initial: None,
            sample_interval: Duration::from_millis(500),
            target_latency: Duration::from_millis(100),
            min_success_rate: 0.9,
            strategy: AdaptationStrategy::Aimd,
            listeners: ListenerSet::new(),
            clock: default_clock(),
        }
    }

    /// Sets the controller name used in events.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the starting slot target (clamped into `[min, max]`).
    pub fn initial(mut self, initial: usize) -> Self {
        self.initial = Some(initial);
        self
    }

    /// Sets the evaluation period.
    pub fn sample_interval(mut self, sample_interval: Duration) -> Self {
        assert!(!sample_interval.is_zero(), "sample_interval must be > 0");
        self.sample_interval = sample_interval;
        self
    }

    /// Sets the p50 latency above which the window counts as congested.
    pub fn target_latency(mut self, target_latency: Duration) -> Self {
        self.target_latency = target_latency;
        self
    }

    /// Sets the success rate below which the window counts as unhealthy.
    pub fn min_success_rate(mut self, min_success_rate: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&min_success_rate),
            "min_success_rate must be within [0, 1]"
        );
        self.min_success_rate = min_success_rate;
        self
    }

    /// Sets the adjustment strategy.
    pub fn strategy(mut self, strategy: AdaptationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Registers a callback for slot-target changes.
    pub fn on_change<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.listeners.attach(move |event| {
            let AdaptiveEvent::LimitChanged { old, new, .. } = event;
            f(*old, *new);
        });
        self
    }

    /// Registers a listener for every controller event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&AdaptiveEvent) + Send + Sync + 'static,
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
    pub fn build(self) -> AdaptiveConfig {
        let initial = self.initial.unwrap_or(self.min).clamp(self.min, self.max);
        AdaptiveConfig {
            name: self.name,
            min: self.min,
            max: self.max,
            initial,
            sample_interval: self.sample_interval,
            target_latency: self.target_latency,
            min_success_rate: self.min_success_rate,
            strategy: self.strategy,
            listeners: self.listeners,
            clock: self.clock,
        }
    }
}
