use std::time::Duration;
use thiserror::Error;

/// Returned by [`CircuitBreaker::try_acquire`](crate::CircuitBreaker::try_acquire)
/// when the circuit refuses the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("circuit is open; call not permitted")]
pub struct CircuitOpenError {
    /// Time until the breaker will probe again, when known.
    ///
    /// `None` while HalfOpen: the probe budget is exhausted but the
    /// in-flight probes decide what happens next.
    pub retry_after: Option<Duration>,
}
