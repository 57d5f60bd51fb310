//! Input sources for the operators.
//!
//! A [`Source`] is a lazy, possibly unbounded sequence of items. It can
//! be built from any iterator or stream; fallible streams surface their
//! first error once, terminating the run.

use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;

/// Error surfaced when the source itself fails.
#[derive(Debug, Error)]
#[error("source failed: {0}")]
pub struct SourceError(pub Box<dyn std::error::Error + Send + Sync>);

impl SourceError {
    /// Wraps any error as a source failure.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self(error.into())
    }
}

/// A lazy sequence of inputs for an operator.
pub struct Source<T> {
    pub(crate) stream: BoxStream<'static, Result<T, SourceError>>,
    pub(crate) total: Option<u64>,
}

impl<T: Send + 'static> Source<T> {
    /// Builds a source from an iterator.
    ///
    /// When the iterator reports an exact length it is captured for
    /// progress percentages and ETA.
    pub fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let iter = iter.into_iter();
        let total = match iter.size_hint() {
            (lo, Some(hi)) if lo == hi => Some(hi as u64),
            _ => None,
        };
        Self {
            stream: stream::iter(iter).map(Ok).boxed(),
            total,
        }
    }

    /// Builds a source from an infallible stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = T> + Send + 'static,
    {
        Self {
            stream: stream.map(Ok).boxed(),
            total: None,
        }
    }

    /// Builds a source from a fallible stream.
    ///
    /// The first `Err` terminates the run with a source failure.
    pub fn try_from_stream<S, E>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<T, E>> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            stream: stream.map(|r| r.map_err(SourceError::new)).boxed(),
            total: None,
        }
    }

    /// Overrides the expected item count used for progress reporting.
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    /// The expected item count, when known.
    pub fn total(&self) -> Option<u64> {
        self.total
    }
}

impl<T> std::fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source").field("total", &self.total).finish()
    }
}
