//! Engine configuration.
//!
//! [`RivuletOptions`] collects every knob the operators accept: the
//! concurrency shape, the resilience pipeline, observability and
//! lifecycle hooks. Build one per run with the builder; resilience
//! components can either be built inline from their config builders or
//! injected pre-built (and shared across runs) behind an `Arc`.

use crate::error::ErrorMode;
use crate::events::EngineEvent;
use crate::hooks::{CallbackResult, Hooks};
use crate::metrics::MetricsConfig;
use crate::outcome::Outcome;
use crate::progress::ProgressConfig;
use rivulet_adaptive::{AdaptiveConfigBuilder, AdaptiveController};
use rivulet_circuitbreaker::{CircuitBreaker, CircuitBreakerConfigBuilder};
use rivulet_core::clock::{default_clock, Clock};
use rivulet_core::counters::Counters;
use rivulet_core::fault::AttemptError;
use rivulet_core::hub::{EventHub, DEFAULT_EVENT_CAPACITY};
use rivulet_ratelimiter::{RateLimitConfigBuilder, TokenBucket};
use rivulet_retry::{Backoff, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fully resolved options for one engine run.
pub struct RivuletOptions<T, R, E> {
    pub(crate) max_parallelism: usize,
    pub(crate) input_buffer: usize,
    pub(crate) ordered_output: bool,
    pub(crate) per_item_timeout: Option<Duration>,
    pub(crate) retry: RetryPolicy<E>,
    pub(crate) error_mode: ErrorMode,
    pub(crate) breaker: Option<Arc<CircuitBreaker>>,
    pub(crate) limiter: Option<Arc<TokenBucket>>,
    pub(crate) adaptive: Option<Arc<AdaptiveController>>,
    pub(crate) progress: Option<ProgressConfig>,
    pub(crate) metrics: Option<MetricsConfig>,
    pub(crate) counters: Arc<Counters>,
    pub(crate) hub: EventHub<EngineEvent>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) expected_total: Option<u64>,
    pub(crate) hooks: Hooks<T, R, E>,
}

impl<T, R, E: 'static> RivuletOptions<T, R, E> {
    /// Starts building options.
    pub fn builder() -> RivuletOptionsBuilder<T, R, E> {
        RivuletOptionsBuilder::new()
    }

    /// A handle for subscribing to the run's event stream.
    ///
    /// Subscribe before starting the operator; events published earlier
    /// than the subscription are not replayed.
    pub fn events(&self) -> EventHub<EngineEvent> {
        self.hub.clone()
    }

    /// The counters this run will write to.
    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    /// The clock this run will use.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }
}

impl<T, R, E: 'static> Default for RivuletOptions<T, R, E> {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl<T, R, E> std::fmt::Debug for RivuletOptions<T, R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RivuletOptions")
            .field("max_parallelism", &self.max_parallelism)
            .field("input_buffer", &self.input_buffer)
            .field("ordered_output", &self.ordered_output)
            .field("per_item_timeout", &self.per_item_timeout)
            .field("error_mode", &self.error_mode)
            .field("retry", &self.retry)
            .field("circuit_breaker", &self.breaker.is_some())
            .field("rate_limit", &self.limiter.is_some())
            .field("adaptive", &self.adaptive.is_some())
            .finish()
    }
}

enum BreakerSetting {
    Off,
    Build(CircuitBreakerConfigBuilder),
    Shared(Arc<CircuitBreaker>),
}

enum LimiterSetting {
    Off,
    Build(RateLimitConfigBuilder),
    Shared(Arc<TokenBucket>),
}

enum AdaptiveSetting {
    Off,
    Build(AdaptiveConfigBuilder),
    Shared(Arc<AdaptiveController>),
}

type Classifier<E> = Arc<dyn Fn(&AttemptError<E>) -> bool + Send + Sync>;

/// Builder for [`RivuletOptions`].
///
/// Defaults: parallelism equal to the hardware thread count, input
/// buffer twice the parallelism, completion-order output, no retries,
/// fail-fast error mode, no resilience components, fresh counters.
pub struct RivuletOptionsBuilder<T, R, E> {
    max_parallelism: Option<usize>,
    input_buffer: Option<usize>,
    ordered_output: bool,
    per_item_timeout: Option<Duration>,
    max_retries: u32,
    base_delay: Duration,
    backoff: Backoff,
    classifier: Option<Classifier<E>>,
    retry_policy: Option<RetryPolicy<E>>,
    error_mode: ErrorMode,
    breaker: BreakerSetting,
    limiter: LimiterSetting,
    adaptive: AdaptiveSetting,
    progress: Option<ProgressConfig>,
    metrics: Option<MetricsConfig>,
    counters: Option<Arc<Counters>>,
    event_capacity: usize,
    clock: Arc<dyn Clock>,
    cancellation: Option<CancellationToken>,
    expected_total: Option<u64>,
    hooks: Hooks<T, R, E>,
}

impl<T, R, E: 'static> RivuletOptionsBuilder<T, R, E> {
    fn new() -> Self {
        Self {
            max_parallelism: None,
            input_buffer: None,
            ordered_output: false,
            per_item_timeout: None,
            max_retries: 0,
            base_delay: Duration::from_millis(100),
            backoff: Backoff::Exponential,
            classifier: None,
            retry_policy: None,
            error_mode: ErrorMode::FailFast,
            breaker: BreakerSetting::Off,
            limiter: LimiterSetting::Off,
            adaptive: AdaptiveSetting::Off,
            progress: None,
            metrics: None,
            counters: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            clock: default_clock(),
            cancellation: None,
            expected_total: None,
            hooks: Hooks::default(),
        }
    }

    /// Hard ceiling on concurrent attempts.
    ///
    /// # Panics
    ///
    /// Panics if `max_parallelism` is zero.
    pub fn max_parallelism(mut self, max_parallelism: usize) -> Self {
        assert!(max_parallelism >= 1, "max_parallelism must be >= 1");
        self.max_parallelism = Some(max_parallelism);
        self
    }

    /// Capacity of the bounded input channel (upstream backpressure).
    ///
    /// # Panics
    ///
    /// Panics if `input_buffer` is zero.
    pub fn input_buffer(mut self, input_buffer: usize) -> Self {
        assert!(input_buffer >= 1, "input_buffer must be >= 1");
        self.input_buffer = Some(input_buffer);
        self
    }

    /// Emit results in input order instead of completion order.
    pub fn ordered_output(mut self, ordered_output: bool) -> Self {
        self.ordered_output = ordered_output;
        self
    }

    /// Wall-clock deadline for a single attempt (retry waits excluded).
    pub fn per_item_timeout(mut self, per_item_timeout: Duration) -> Self {
        self.per_item_timeout = Some(per_item_timeout);
        self
    }

    /// Maximum additional attempts after the first.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Base delay fed into the backoff formula.
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Backoff strategy for retry delays.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces the default tag-based transience classifier.
    pub fn is_transient<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AttemptError<E>) -> bool + Send + Sync + 'static,
    {
        self.classifier = Some(Arc::new(predicate));
        self
    }

    /// Injects a fully built retry policy, overriding the retry knobs.
    pub fn retry_policy(mut self, policy: RetryPolicy<E>) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// How permanent failures are handled; see [`ErrorMode`].
    pub fn error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    /// Guards attempts with a circuit breaker built from this config.
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfigBuilder) -> Self {
        self.breaker = BreakerSetting::Build(config);
        self
    }

    /// Guards attempts with a pre-built breaker shared across runs.
    pub fn circuit_breaker_shared(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = BreakerSetting::Shared(breaker);
        self
    }

    /// Paces attempts with a token bucket built from this config.
    pub fn rate_limit(mut self, config: RateLimitConfigBuilder) -> Self {
        self.limiter = LimiterSetting::Build(config);
        self
    }

    /// Paces attempts with a pre-built bucket shared across runs.
    pub fn rate_limit_shared(mut self, bucket: Arc<TokenBucket>) -> Self {
        self.limiter = LimiterSetting::Shared(bucket);
        self
    }

    /// Replaces the fixed parallelism ceiling with an adaptive
    /// controller built from this config.
    pub fn adaptive(mut self, config: AdaptiveConfigBuilder) -> Self {
        self.adaptive = AdaptiveSetting::Build(config);
        self
    }

    /// Uses a pre-built adaptive controller shared across runs.
    pub fn adaptive_shared(mut self, controller: Arc<AdaptiveController>) -> Self {
        self.adaptive = AdaptiveSetting::Shared(controller);
        self
    }

    /// Enables periodic progress reporting.
    pub fn progress(mut self, progress: ProgressConfig) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Enables periodic counter export.
    pub fn metrics(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Writes counters into a shared handle instead of a fresh one.
    pub fn counters(mut self, counters: Arc<Counters>) -> Self {
        self.counters = Some(counters);
        self
    }

    /// Buffer depth of the broadcast event hub, per collector.
    pub fn event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity.max(1);
        self
    }

    /// Replaces the clock, for virtual-time tests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// External cancellation signal for the run.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Expected item count, for progress ETA when the source cannot
    /// report one.
    pub fn expected_total(mut self, expected_total: u64) -> Self {
        self.expected_total = Some(expected_total);
        self
    }

    /// Hook invoked when an item's first attempt begins.
    pub fn on_start_item<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, &T) -> CallbackResult + Send + Sync + 'static,
    {
        self.hooks.on_start_item = Some(Arc::new(f));
        self
    }

    /// Hook invoked with every item's terminal outcome.
    pub fn on_complete_item<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, &Outcome<R, E>) -> CallbackResult + Send + Sync + 'static,
    {
        self.hooks.on_complete_item = Some(Arc::new(f));
        self
    }

    /// Hook invoked when an item fails terminally.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, &AttemptError<E>) -> CallbackResult + Send + Sync + 'static,
    {
        self.hooks.on_error = Some(Arc::new(f));
        self
    }

    /// Builds the options, constructing and wiring any inline resilience
    /// components into the run's event hub.
    pub fn build(self) -> RivuletOptions<T, R, E> {
        let hub = EventHub::new(self.event_capacity);
        let max_parallelism = self.max_parallelism.unwrap_or_else(default_parallelism);
        let input_buffer = self.input_buffer.unwrap_or(max_parallelism * 2);

        let retry = match self.retry_policy {
            Some(policy) => policy,
            None => {
                let mut builder = RetryPolicy::builder()
                    .name("rivulet")
                    .max_retries(self.max_retries)
                    .base_delay(self.base_delay)
                    .backoff(self.backoff);
                if let Some(classifier) = self.classifier {
                    builder = builder.is_transient(move |error| classifier(error));
                }
                builder.build()
            }
        };

        let breaker = match self.breaker {
            BreakerSetting::Off => None,
            BreakerSetting::Shared(breaker) => Some(breaker),
            BreakerSetting::Build(config) => {
                let bridge = hub.clone();
                Some(Arc::new(CircuitBreaker::new(
                    config
                        .on_event(move |event| bridge.publish(EngineEvent::Circuit(event.clone())))
                        .build(),
                )))
            }
        };

        let limiter = match self.limiter {
            LimiterSetting::Off => None,
            LimiterSetting::Shared(bucket) => Some(bucket),
            LimiterSetting::Build(config) => Some(Arc::new(TokenBucket::new(config.build()))),
        };

        let adaptive = match self.adaptive {
            AdaptiveSetting::Off => None,
            AdaptiveSetting::Shared(controller) => Some(controller),
            AdaptiveSetting::Build(config) => {
                let bridge = hub.clone();
                Some(Arc::new(AdaptiveController::new(
                    config
                        .on_event(move |event| bridge.publish(EngineEvent::Adaptive(event.clone())))
                        .build(),
                )))
            }
        };

        RivuletOptions {
            max_parallelism,
            input_buffer,
            ordered_output: self.ordered_output,
            per_item_timeout: self.per_item_timeout,
            retry,
            error_mode: self.error_mode,
            breaker,
            limiter,
            adaptive,
            progress: self.progress,
            metrics: self.metrics,
            counters: self.counters.unwrap_or_else(|| Arc::new(Counters::new())),
            hub,
            clock: self.clock,
            cancellation: self.cancellation,
            expected_total: self.expected_total,
            hooks: self.hooks,
        }
    }
}

impl<T, R, E: 'static> Default for RivuletOptionsBuilder<T, R, E> {
    fn default() -> Self {
        Self::new()
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
}
