//! Run-level errors and aggregates.

use crate::source::SourceError;
use rivulet_core::counters::CounterSnapshot;
use rivulet_core::fault::AttemptError;
use std::fmt;

/// How the engine reacts to permanent item failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// The first permanent failure cancels the run; partial results are
    /// not delivered.
    #[default]
    FailFast,
    /// Failures are accumulated and returned alongside the successes.
    CollectAndContinue,
    /// Like [`ErrorMode::CollectAndContinue`]; engine faults still
    /// terminate.
    BestEffort,
}

impl ErrorMode {
    /// True for the modes that accumulate failures instead of aborting.
    pub fn collects(self) -> bool {
        matches!(self, ErrorMode::CollectAndContinue | ErrorMode::BestEffort)
    }
}

/// One item's terminal failure, tagged with its input index.
#[derive(Debug)]
pub struct ItemFailure<E> {
    /// Input index of the failed item.
    pub index: u64,
    /// Attempts made; zero when the item was refused before starting.
    pub attempts: u32,
    /// The final error.
    pub error: AttemptError<E>,
}

impl<E: fmt::Display> fmt::Display for ItemFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "item {} failed after {} attempt(s): {}",
            self.index, self.attempts, self.error
        )
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ItemFailure<E> {}

/// A run that terminated without producing its normal output.
#[derive(Debug)]
pub enum RunError<E> {
    /// A permanent failure tripped fail-fast mode.
    Operation(ItemFailure<E>),

    /// The caller's cancellation signal fired.
    Cancelled,

    /// The source itself failed.
    Source(SourceError),

    /// The engine infrastructure faulted; the run is unreliable.
    Fault(String),
}

impl<E: fmt::Display> fmt::Display for RunError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Operation(failure) => failure.fmt(f),
            RunError::Cancelled => f.write_str("run cancelled"),
            RunError::Source(error) => error.fmt(f),
            RunError::Fault(message) => write!(f, "engine fault: {message}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RunError<E> {}

impl<E> RunError<E> {
    /// The failing item, for [`RunError::Operation`].
    pub fn item_failure(&self) -> Option<&ItemFailure<E>> {
        match self {
            RunError::Operation(f) => Some(f),
            _ => None,
        }
    }

    /// True when the run ended because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled)
    }
}

/// Output of a successful `map` run.
#[derive(Debug)]
pub struct MapOutput<R, E> {
    /// Successful results: in input order when ordering was requested,
    /// completion order otherwise.
    pub results: Vec<R>,
    /// Per-item failures, each tagged with its input index. Empty under
    /// fail-fast (a trip surfaces as [`RunError::Operation`] instead).
    pub failures: Vec<ItemFailure<E>>,
}

impl<R, E> MapOutput<R, E> {
    /// True when every item succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Discards the failure aggregate.
    pub fn into_results(self) -> Vec<R> {
        self.results
    }
}

/// Output of a `for_each` run.
#[derive(Debug)]
pub struct RunReport<E> {
    /// Per-item failures, each tagged with its input index.
    pub failures: Vec<ItemFailure<E>>,
    /// Terminal counter values for the run.
    pub counters: CounterSnapshot,
}

impl<E> RunReport<E> {
    /// True when every item succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
