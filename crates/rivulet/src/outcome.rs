//! Terminal outcomes of items.

use rivulet_core::fault::AttemptError;

/// Why an item was skipped without any attempt being started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The circuit breaker was open when the item's turn came.
    CircuitOpen,
}

/// The terminal classification of one item.
///
/// Exactly one outcome is produced per item read from the source.
#[derive(Debug)]
pub enum Outcome<R, E> {
    /// The operation succeeded.
    Success {
        /// The operation's result.
        value: R,
    },
    /// The operation failed terminally, possibly after retries.
    Failure {
        /// The final attempt's error.
        error: AttemptError<E>,
        /// Whether any retry was attempted.
        retried: bool,
        /// Total attempts made, including the first.
        attempts: u32,
    },
    /// The run was cancelled before the item resolved.
    Cancelled,
    /// The item was refused before its first attempt started.
    Skipped {
        /// Why it was refused.
        reason: SkipReason,
    },
}

impl<R, E> Outcome<R, E> {
    /// True for a successful outcome.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// True for a terminal failure or a skip.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. } | Outcome::Skipped { .. })
    }

    /// Extracts the success value.
    pub fn into_value(self) -> Option<R> {
        match self {
            Outcome::Success { value } => Some(value),
            _ => None,
        }
    }
}
