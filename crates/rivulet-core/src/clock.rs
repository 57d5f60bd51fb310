//! Monotonic time source with a cancellable delay primitive.
//!
//! All rivulet components that wait or measure time do so through a
//! [`Clock`] handle. The default [`TokioClock`] delegates to `tokio::time`,
//! which means a runtime started with `start_paused = true` runs the whole
//! engine on virtual time deterministically.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Delay future returned by [`Clock::sleep`].
///
/// The future is cancel-safe: dropping it abandons the wait.
pub type Sleep = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A monotonic time source and delay primitive.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Returns a future that completes after `duration`.
    fn sleep(&self, duration: Duration) -> Sleep;
}

/// The default clock, backed by `tokio::time`.
///
/// Under `#[tokio::test(start_paused = true)]` this clock advances only
/// when the runtime is otherwise idle, so timing-sensitive tests are exact
/// and instantaneous.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Returns a shared handle to the default clock.
pub fn default_clock() -> Arc<dyn Clock> {
    Arc::new(TokioClock)
}
