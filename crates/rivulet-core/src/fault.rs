//! The adapter fault taxonomy and per-attempt error type.
//!
//! Domain adapters (HTTP, SQL, object storage) tag their errors with a
//! [`FaultKind`] instead of relying on concrete error types. The default
//! transience classifier consults the tag through [`FaultTagged`], so the
//! engine never inspects adapter types directly.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error kinds adapters may tag their errors with.
///
/// Every kind in this set is retry-eligible under the default classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The operation exceeded a deadline imposed by the adapter.
    Timeout,
    /// The peer reset or dropped the connection.
    ConnectionReset,
    /// The dependency is temporarily unable to serve requests.
    TemporaryUnavailable,
    /// The upstream service rejected the call for rate reasons.
    RateLimitedUpstream,
    /// The store detected a deadlock and chose this call as the victim.
    Deadlock,
}

impl FaultKind {
    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::Timeout => "timeout",
            FaultKind::ConnectionReset => "connection_reset",
            FaultKind::TemporaryUnavailable => "temporary_unavailable",
            FaultKind::RateLimitedUpstream => "rate_limited_upstream",
            FaultKind::Deadlock => "deadlock",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait errors implement to expose their adapter fault kind.
///
/// Returning `None` marks the error permanent under the default
/// classifier; a user predicate can still override.
pub trait FaultTagged {
    /// The fault kind carried by this error, if any.
    fn fault_kind(&self) -> Option<FaultKind>;
}

/// A bare tagged error for adapters with no richer error type of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} fault")]
pub struct Fault {
    /// The kind this fault carries.
    pub kind: FaultKind,
}

impl Fault {
    /// Creates a fault of the given kind.
    pub fn new(kind: FaultKind) -> Self {
        Self { kind }
    }
}

impl FaultTagged for Fault {
    fn fault_kind(&self) -> Option<FaultKind> {
        Some(self.kind)
    }
}

impl FaultTagged for std::io::Error {
    fn fault_kind(&self) -> Option<FaultKind> {
        use std::io::ErrorKind;
        match self.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => Some(FaultKind::Timeout),
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => Some(FaultKind::ConnectionReset),
            ErrorKind::ConnectionRefused | ErrorKind::NotConnected | ErrorKind::Interrupted => {
                Some(FaultKind::TemporaryUnavailable)
            }
            _ => None,
        }
    }
}

/// The error produced by a single attempt on one item.
///
/// `Operation` wraps the user operation's own error; the other variants
/// are produced by the resilience pipeline around it.
#[derive(Debug, Error)]
pub enum AttemptError<E> {
    /// The user operation returned an error.
    #[error("operation failed: {0}")]
    Operation(E),

    /// The attempt exceeded the per-item deadline.
    #[error("attempt timed out after {elapsed:?}")]
    Timeout {
        /// How long the attempt ran before the deadline fired.
        elapsed: Duration,
    },

    /// The circuit breaker refused the call.
    #[error("circuit is open; call not permitted")]
    CircuitOpen,

    /// The rate limiter refused the call (non-blocking mode only).
    #[error("rate limit exceeded")]
    RateLimited,

    /// The run was cancelled while the attempt was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

impl<E> AttemptError<E> {
    /// Returns the user operation error, if that is what this is.
    pub fn into_operation(self) -> Option<E> {
        match self {
            AttemptError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Borrowing accessor for the user operation error.
    pub fn as_operation(&self) -> Option<&E> {
        match self {
            AttemptError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// True for the per-item deadline variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AttemptError::Timeout { .. })
    }

    /// True when the circuit breaker refused the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, AttemptError::CircuitOpen)
    }

    /// True when the run was cancelled mid-attempt.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AttemptError::Cancelled)
    }
}

impl<E: FaultTagged> AttemptError<E> {
    /// The default transience classification.
    ///
    /// User errors are transient when their adapter tag says so; the
    /// pipeline's own refusals (timeout, open circuit, rate limit) are
    /// permanent unless a user predicate overrides, and cancellation is
    /// never retried.
    pub fn default_is_transient(&self) -> bool {
        match self {
            AttemptError::Operation(e) => e.fault_kind().is_some(),
            _ => false,
        }
    }
}
