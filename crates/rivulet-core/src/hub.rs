//! Multi-consumer broadcast surface for engine events.
//!
//! Counters and typed events are published on a broadcast channel read by
//! independent collector tasks. Publishing never blocks: a collector that
//! consumes slowly loses the oldest events it has not read, and the loss
//! is surfaced as a dropped count rather than backpressure on the engine.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::counters::Counters;

/// Default broadcast capacity per collector.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A handle for publishing events to any number of collectors.
pub struct EventHub<E> {
    tx: broadcast::Sender<E>,
}

impl<E> Clone for EventHub<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> std::fmt::Debug for EventHub<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("collectors", &self.tx.receiver_count())
            .finish()
    }
}

impl<E: Clone + Send + 'static> EventHub<E> {
    /// Creates a hub whose collectors each buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event. Never blocks; a no-op when nobody listens.
    pub fn publish(&self, event: E) {
        let _ = self.tx.send(event);
    }

    /// Opens a new collector stream starting at the current position.
    pub fn subscribe(&self) -> EventStream<E> {
        EventStream {
            rx: self.tx.subscribe(),
            dropped: 0,
            counters: None,
        }
    }

    /// Opens a collector stream that reports overflow losses to `counters`.
    pub fn subscribe_counted(&self, counters: Arc<Counters>) -> EventStream<E> {
        EventStream {
            rx: self.tx.subscribe(),
            dropped: 0,
            counters: Some(counters),
        }
    }

    /// Number of currently attached collectors.
    pub fn collector_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E: Clone + Send + 'static> Default for EventHub<E> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// One collector's view of the event stream.
pub struct EventStream<E> {
    rx: broadcast::Receiver<E>,
    dropped: u64,
    counters: Option<Arc<Counters>>,
}

impl<E: Clone> EventStream<E> {
    /// Receives the next event.
    ///
    /// Returns `None` once every publisher handle has been dropped and the
    /// buffered events are drained. Overflow (this collector fell behind)
    /// is absorbed: the dropped events are counted and the next available
    /// event is returned.
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.dropped += n;
                    if let Some(counters) = &self.counters {
                        counters.record_events_dropped(n);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Events this collector has lost to overflow so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
