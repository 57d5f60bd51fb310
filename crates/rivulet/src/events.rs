//! The engine-level event stream.
//!
//! Component events (circuit, retry, adaptive) and the engine's own
//! lifecycle events are wrapped into one [`EngineEvent`] enum and
//! published on the run's broadcast hub. Subscribe through
//! [`RivuletOptions::events`](crate::RivuletOptions::events) before
//! starting the run; collectors that fall behind lose the oldest events
//! rather than slowing the engine down.

use rivulet_adaptive::AdaptiveEvent;
use rivulet_circuitbreaker::CircuitBreakerEvent;
use rivulet_core::counters::CounterSnapshot;
use rivulet_retry::RetryEvent;

/// Everything the engine publishes on its event hub.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A circuit breaker event.
    Circuit(CircuitBreakerEvent),
    /// A retry lifecycle event.
    Retry(RetryEvent),
    /// An adaptive concurrency event.
    Adaptive(AdaptiveEvent),
    /// A user hook returned an error or panicked.
    HookFailed {
        /// Which hook failed.
        hook: &'static str,
        /// Item index the hook was invoked for, when applicable.
        index: Option<u64>,
        /// The error or panic message.
        message: String,
    },
    /// A sampler callback returned an error or panicked.
    CallbackFailed {
        /// Which sampler's callback failed.
        sampler: &'static str,
        /// The error or panic message.
        message: String,
    },
    /// The source failed; the run is terminating.
    SourceFailed {
        /// The source's error message.
        message: String,
    },
    /// The run finished draining; terminal counter values attached.
    RunCompleted {
        /// Final counter snapshot.
        counters: CounterSnapshot,
    },
}
