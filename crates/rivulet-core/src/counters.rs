//! Process-wide run counters.
//!
//! A [`Counters`] handle is created per engine run (or injected from
//! outside to share across runs). Every write is a relaxed atomic
//! increment; counters are monotonic and never decrease.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters describing the progress of a run.
#[derive(Debug, Default)]
pub struct Counters {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    skipped: AtomicU64,
    throttle_events: AtomicU64,
    drain_events: AtomicU64,
    events_dropped: AtomicU64,
}

impl Counters {
    /// Creates a fresh set of counters, all zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// An item began its first attempt.
    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    /// An item resolved successfully.
    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// An item resolved with a terminal failure.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// One retry attempt was scheduled.
    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    /// An item was refused by an open circuit before any attempt started.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// The input channel was full when the reader tried to push.
    pub fn record_throttle(&self) {
        self.throttle_events.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker found the input channel empty.
    pub fn record_drain(&self) {
        self.drain_events.fetch_add(1, Ordering::Relaxed);
    }

    /// A slow collector lost `n` events to overflow.
    pub fn record_events_dropped(&self, n: u64) {
        self.events_dropped.fetch_add(n, Ordering::Relaxed);
    }

    /// Takes a point-in-time sample of every counter.
    ///
    /// Each field is individually consistent; the snapshot as a whole is
    /// not an atomic cut across counters.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            throttle_events: self.throttle_events.load(Ordering::Relaxed),
            drain_events: self.drain_events.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

/// An immutable sample of [`Counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterSnapshot {
    /// Items whose first attempt has begun.
    pub started: u64,
    /// Items that resolved successfully.
    pub completed: u64,
    /// Items that resolved with a terminal failure.
    pub failed: u64,
    /// Retry attempts scheduled, one per retry.
    pub retried: u64,
    /// Items refused by an open circuit before starting.
    pub skipped: u64,
    /// Times the reader found the input channel full.
    pub throttle_events: u64,
    /// Times a worker found the input channel empty.
    pub drain_events: u64,
    /// Events lost to slow collectors.
    pub events_dropped: u64,
}

impl CounterSnapshot {
    /// Items that reached a terminal outcome.
    pub fn terminal(&self) -> u64 {
        self.completed + self.failed + self.skipped
    }

    /// Items started but not yet terminally resolved.
    ///
    /// Skipped items never start, so they do not participate here.
    pub fn in_flight(&self) -> u64 {
        self.started.saturating_sub(self.completed + self.failed)
    }
}
