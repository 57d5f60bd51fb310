//! Parallel processing operators for I/O-bound and mixed workloads.
//!
//! Rivulet transforms a source sequence of inputs into results by
//! running a user-supplied asynchronous operation on each item with
//! bounded concurrency, applying a resilience pipeline around every
//! attempt and reporting progress along the way.
//!
//! # Operators
//!
//! - [`map`] — input → result, collected
//! - [`stream`] — input → lazily yielded results
//! - [`for_each`] — input → side effect
//! - [`map_batched`] / [`for_each_batched`] — chunked variants
//!
//! # The pipeline
//!
//! Around each item, in fixed order and each stage only when configured:
//!
//! ```text
//! adaptive slot → rate limit → circuit breaker → (retry × timeout) → op
//! ```
//!
//! Adaptive concurrency gates total load first; rate limiting paces work
//! inside the chosen concurrency; the breaker short-circuits doomed
//! calls; retry is the innermost wrapper over the operation.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use rivulet::{map, ErrorMode, RivuletOptions, Source};
//! use rivulet_core::fault::Fault;
//! use rivulet_retry::Backoff;
//! use std::time::Duration;
//!
//! let options = RivuletOptions::builder()
//!     .max_parallelism(8)
//!     .ordered_output(true)
//!     .max_retries(3)
//!     .base_delay(Duration::from_millis(50))
//!     .backoff(Backoff::ExponentialJitter)
//!     .error_mode(ErrorMode::CollectAndContinue)
//!     .build();
//!
//! let output = map(Source::from_iter(1..=100), options, |id, _cancel| async move {
//!     fetch(id).await
//! })
//! .await?;
//!
//! println!("{} ok, {} failed", output.results.len(), output.failures.len());
//! # Ok(())
//! # }
//! # use rivulet_core::fault::Fault;
//! # async fn fetch(id: u32) -> Result<String, Fault> { Ok(id.to_string()) }
//! ```
//!
//! # Observability
//!
//! Counters are plain atomics behind a [`Counters`] handle; typed events
//! (circuit transitions, retries, concurrency changes, hook failures)
//! are published on a broadcast hub subscribed through
//! [`RivuletOptions::events`]. Periodic [`ProgressSnapshot`]s and counter
//! exports run on dedicated sampler tasks.

pub mod batch;
mod engine;
pub mod error;
pub mod events;
mod hooks;
pub mod metrics;
pub mod operators;
pub mod options;
mod ordering;
pub mod outcome;
pub mod progress;
pub mod source;
mod worker;

pub use batch::BatchOptions;
pub use error::{ErrorMode, ItemFailure, MapOutput, RunError, RunReport};
pub use events::EngineEvent;
pub use hooks::CallbackResult;
pub use metrics::MetricsConfig;
pub use operators::{for_each, for_each_batched, map, map_batched, stream, ResultStream};
pub use options::{RivuletOptions, RivuletOptionsBuilder};
pub use outcome::{Outcome, SkipReason};
pub use progress::{ProgressConfig, ProgressSnapshot};
pub use source::{Source, SourceError};

pub use rivulet_adaptive::{AdaptationStrategy, AdaptiveController};
pub use rivulet_circuitbreaker::{CircuitBreaker, CircuitState};
pub use rivulet_core::counters::{CounterSnapshot, Counters};
pub use rivulet_core::fault::{AttemptError, Fault, FaultKind, FaultTagged};
pub use rivulet_ratelimiter::TokenBucket;
pub use rivulet_retry::{Backoff, RetryPolicy};
