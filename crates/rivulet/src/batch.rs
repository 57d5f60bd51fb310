//! Batching stage for the `*_batched` operators.
//!
//! Sits between the source and the engine: items are grouped into
//! `Vec<T>` slices of `size`, with a partial batch flushed once
//! `timeout` elapses with data pending (for slow or unbounded sources).
//! All engine semantics then apply at batch granularity.

use crate::source::{Source, SourceError};
use futures::stream::{self, StreamExt};
use rivulet_core::clock::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Batch shape for `map_batched` and `for_each_batched`.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub(crate) size: usize,
    pub(crate) timeout: Option<Duration>,
}

impl BatchOptions {
    /// Batches of `size` items, flushed only when full (or at the end of
    /// the source).
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size >= 1, "batch size must be >= 1");
        Self {
            size,
            timeout: None,
        }
    }

    /// Also flushes a partial batch when this long passes without it
    /// filling up. The deadline arms when the first item is buffered.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

enum Step<T> {
    Item(Option<Result<T, SourceError>>),
    Flush,
    ConsumerGone,
}

/// Wraps a source so it yields batches instead of single items.
pub(crate) fn batch_source<T: Send + 'static>(
    source: Source<T>,
    options: BatchOptions,
    clock: Arc<dyn Clock>,
) -> Source<Vec<T>> {
    let size = options.size;
    let timeout = options.timeout;
    // With a flush timeout the batch count is load-dependent.
    let total = match timeout {
        None => source.total.map(|n| n.div_ceil(size as u64)),
        Some(_) => None,
    };

    let mut stream = source.stream;
    let (tx, rx) = mpsc::channel::<Result<Vec<T>, SourceError>>(1);

    tokio::spawn(async move {
        let mut buf: Vec<T> = Vec::with_capacity(size);
        let mut deadline: Option<Instant> = None;

        loop {
            let step = match deadline {
                Some(due) => {
                    let now = clock.now();
                    if now >= due {
                        Step::Flush
                    } else {
                        tokio::select! {
                            item = stream.next() => Step::Item(item),
                            _ = clock.sleep(due - now) => Step::Flush,
                            _ = tx.closed() => Step::ConsumerGone,
                        }
                    }
                }
                None => {
                    tokio::select! {
                        item = stream.next() => Step::Item(item),
                        _ = tx.closed() => Step::ConsumerGone,
                    }
                }
            };

            match step {
                Step::Item(Some(Ok(item))) => {
                    buf.push(item);
                    if buf.len() == 1 {
                        deadline = timeout.map(|t| clock.now() + t);
                    }
                    if buf.len() >= size {
                        deadline = None;
                        let batch = std::mem::replace(&mut buf, Vec::with_capacity(size));
                        if tx.send(Ok(batch)).await.is_err() {
                            return;
                        }
                    }
                }
                Step::Item(Some(Err(error))) => {
                    if !buf.is_empty() {
                        let _ = tx.send(Ok(std::mem::take(&mut buf))).await;
                    }
                    let _ = tx.send(Err(error)).await;
                    return;
                }
                Step::Item(None) => {
                    if !buf.is_empty() {
                        let _ = tx.send(Ok(std::mem::take(&mut buf))).await;
                    }
                    return;
                }
                Step::Flush => {
                    deadline = None;
                    if !buf.is_empty() {
                        let batch = std::mem::replace(&mut buf, Vec::with_capacity(size));
                        if tx.send(Ok(batch)).await.is_err() {
                            return;
                        }
                    }
                }
                Step::ConsumerGone => return,
            }
        }
    });

    Source {
        stream: stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed(),
        total,
    }
}
