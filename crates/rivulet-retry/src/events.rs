//! Events emitted around the retry loop.

use rivulet_core::events::{EventMeta, PipelineEvent};
use std::time::Duration;
use tokio::time::Instant;

/// Events describing the retry lifecycle of a single item.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A transient failure was observed and a retry is scheduled.
    Scheduled {
        /// Policy instance name.
        name: String,
        /// When the retry was scheduled.
        timestamp: Instant,
        /// Input index of the item being retried.
        index: u64,
        /// Retry number, 1 for the first retry.
        attempt: u32,
        /// Delay before the next attempt.
        delay: Duration,
    },
    /// The item eventually succeeded after at least one retry.
    Succeeded {
        /// Policy instance name.
        name: String,
        /// When the success was recorded.
        timestamp: Instant,
        /// Input index of the item.
        index: u64,
        /// Total attempts made, including the first.
        attempts: u32,
    },
    /// Retries were exhausted and the item failed terminally.
    Exhausted {
        /// Policy instance name.
        name: String,
        /// When the final failure was recorded.
        timestamp: Instant,
        /// Input index of the item.
        index: u64,
        /// Total attempts made, including the first.
        attempts: u32,
    },
    /// The error was classified permanent; no retry was attempted.
    NotRetryable {
        /// Policy instance name.
        name: String,
        /// When the classification happened.
        timestamp: Instant,
        /// Input index of the item.
        index: u64,
    },
}

impl PipelineEvent for RetryEvent {
    fn meta(&self) -> EventMeta<'_> {
        let (kind, name, timestamp) = match self {
            RetryEvent::Scheduled {
                name, timestamp, ..
            } => ("retry_scheduled", name, timestamp),
            RetryEvent::Succeeded {
                name, timestamp, ..
            } => ("retry_succeeded", name, timestamp),
            RetryEvent::Exhausted {
                name, timestamp, ..
            } => ("retry_exhausted", name, timestamp),
            RetryEvent::NotRetryable {
                name, timestamp, ..
            } => ("retry_not_retryable", name, timestamp),
        };
        EventMeta {
            kind,
            at: *timestamp,
            emitter: name,
        }
    }
}
