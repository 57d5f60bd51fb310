//! The run orchestrator: reader, worker pool, sink and teardown.
//!
//! One engine exists per operator call. Control flow is
//! `Source → bounded input channel → workers → result channel → sink`;
//! the sink either collects outcomes (`map`, `for_each`) or forwards
//! them to the caller (`stream`). Backpressure comes from the two
//! bounded channels; cancellation is a single composed token observed at
//! every suspension point.

use crate::error::{ErrorMode, ItemFailure, RunError};
use crate::events::EngineEvent;
use crate::hooks::Hooks;
use crate::metrics::spawn_metrics_sampler;
use crate::options::RivuletOptions;
use crate::ordering::OrderingBuffer;
use crate::outcome::Outcome;
use crate::progress::spawn_progress_sampler;
use crate::source::{Source, SourceError};
use crate::worker::worker_loop;
use futures::stream::{BoxStream, StreamExt};
use rivulet_adaptive::AdaptiveController;
use rivulet_circuitbreaker::CircuitBreaker;
use rivulet_core::clock::Clock;
use rivulet_core::counters::{CounterSnapshot, Counters};
use rivulet_core::fault::{AttemptError, FaultTagged};
use rivulet_core::hub::EventHub;
use rivulet_ratelimiter::TokenBucket;
use rivulet_retry::RetryPolicy;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// Everything the reader, workers and sink share for one run.
pub(crate) struct EngineShared<T, R, E, F> {
    pub(crate) op: F,
    pub(crate) run_token: CancellationToken,
    pub(crate) counters: Arc<Counters>,
    pub(crate) hub: EventHub<EngineEvent>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) retry: RetryPolicy<E>,
    pub(crate) breaker: Option<Arc<CircuitBreaker>>,
    pub(crate) limiter: Option<Arc<TokenBucket>>,
    pub(crate) adaptive: Option<Arc<AdaptiveController>>,
    pub(crate) per_item_timeout: Option<Duration>,
    pub(crate) error_mode: ErrorMode,
    pub(crate) hooks: Hooks<T, R, E>,
    pub(crate) source_error: Mutex<Option<SourceError>>,
}

type SharedReceiver<T> = Arc<tokio::sync::Mutex<mpsc::Receiver<(u64, T)>>>;

/// Handles to a launched run, consumed by the sink.
pub(crate) struct Launched<T, R, E> {
    reader: JoinHandle<()>,
    workers: JoinSet<()>,
    pub(crate) result_rx: mpsc::Receiver<(u64, Outcome<R, E>)>,
    input_rx: SharedReceiver<T>,
    sampler_stop: CancellationToken,
    samplers: Vec<JoinHandle<()>>,
    pub(crate) caller_token: Option<CancellationToken>,
}

/// Spawns the reader, worker pool and samplers for one run.
pub(crate) fn launch<T, R, E, F, Fut>(
    source: Source<T>,
    options: RivuletOptions<T, R, E>,
    op: F,
) -> (Arc<EngineShared<T, R, E, F>>, Launched<T, R, E>)
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    E: FaultTagged + Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let run_token = options
        .cancellation
        .as_ref()
        .map(CancellationToken::child_token)
        .unwrap_or_default();
    let caller_token = options.cancellation.clone();
    let counters = Arc::clone(&options.counters);
    let hub = options.hub.clone();
    let clock = Arc::clone(&options.clock);
    let total = options.expected_total.or(source.total);

    let shared = Arc::new(EngineShared {
        op,
        run_token: run_token.clone(),
        counters: Arc::clone(&counters),
        hub: hub.clone(),
        clock: Arc::clone(&clock),
        retry: options.retry,
        breaker: options.breaker,
        limiter: options.limiter,
        adaptive: options.adaptive,
        per_item_timeout: options.per_item_timeout,
        error_mode: options.error_mode,
        hooks: options.hooks,
        source_error: Mutex::new(None),
    });

    let (input_tx, input_rx) = mpsc::channel(options.input_buffer);
    let input_rx: SharedReceiver<T> = Arc::new(tokio::sync::Mutex::new(input_rx));
    let (result_tx, result_rx) = mpsc::channel(options.input_buffer);

    let reader = tokio::spawn(read_source(source.stream, input_tx, Arc::clone(&shared)));

    let mut workers = JoinSet::new();
    for worker_id in 0..options.max_parallelism {
        workers.spawn(worker_loop(
            Arc::clone(&shared),
            Arc::clone(&input_rx),
            result_tx.clone(),
            worker_id,
        ));
    }
    drop(result_tx);

    let sampler_stop = CancellationToken::new();
    let started_at = clock.now();
    let mut samplers = Vec::new();
    if let Some(progress) = options.progress {
        samplers.push(spawn_progress_sampler(
            progress,
            Arc::clone(&counters),
            hub.clone(),
            Arc::clone(&clock),
            total,
            started_at,
            sampler_stop.clone(),
        ));
    }
    if let Some(metrics) = options.metrics {
        samplers.push(spawn_metrics_sampler(
            metrics,
            Arc::clone(&counters),
            hub.clone(),
            Arc::clone(&clock),
            sampler_stop.clone(),
        ));
    }

    (
        shared,
        Launched {
            reader,
            workers,
            result_rx,
            input_rx,
            sampler_stop,
            samplers,
            caller_token,
        },
    )
}

/// Drains the source into the bounded input channel, assigning indices.
async fn read_source<T, R, E, F>(
    mut stream: BoxStream<'static, Result<T, SourceError>>,
    tx: mpsc::Sender<(u64, T)>,
    shared: Arc<EngineShared<T, R, E, F>>,
) where
    T: Send + 'static,
{
    let mut index: u64 = 0;
    loop {
        let next = tokio::select! {
            _ = shared.run_token.cancelled() => break,
            next = stream.next() => next,
        };
        let Some(next) = next else { break };

        match next {
            Ok(payload) => {
                let entry = (index, payload);
                index += 1;
                match tx.try_send(entry) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(entry)) => {
                        shared.counters.record_throttle();
                        let sent = tokio::select! {
                            _ = shared.run_token.cancelled() => false,
                            sent = tx.send(entry) => sent.is_ok(),
                        };
                        if !sent {
                            break;
                        }
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
            Err(error) => {
                tracing::warn!(%error, "source failed; cancelling run");
                shared.hub.publish(EngineEvent::SourceFailed {
                    message: error.to_string(),
                });
                *shared.source_error.lock().expect("source error slot") = Some(error);
                shared.run_token.cancel();
                break;
            }
        }
    }
    tracing::debug!(items_read = index, "source drained");
}

/// Joins every task of the run and reports the first engine fault.
async fn shutdown<T, R, E, F>(
    shared: &Arc<EngineShared<T, R, E, F>>,
    launched: &mut Launched<T, R, E>,
) -> Option<String> {
    let mut fault = None;

    if let Err(error) = (&mut launched.reader).await {
        shared.run_token.cancel();
        fault = Some(format!("source reader failed: {error}"));
    }
    while let Some(result) = launched.workers.join_next().await {
        if let Err(error) = result {
            shared.run_token.cancel();
            fault.get_or_insert_with(|| format!("worker failed: {error}"));
        }
    }

    // Items the workers never picked up still owe a terminal outcome.
    {
        let mut input = launched.input_rx.lock().await;
        while let Ok((index, _payload)) = input.try_recv() {
            shared
                .hooks
                .complete_item(&shared.hub, index, &Outcome::Cancelled);
        }
    }

    launched.sampler_stop.cancel();
    for sampler in launched.samplers.drain(..) {
        let _ = sampler.await;
    }

    shared.hub.publish(EngineEvent::RunCompleted {
        counters: shared.counters.snapshot(),
    });

    fault
}

/// Accumulates outcomes for the collecting sinks.
struct Collector<R, E> {
    keep_results: bool,
    fail_fast: bool,
    results: Vec<R>,
    failures: Vec<ItemFailure<E>>,
    trip: Option<ItemFailure<E>>,
}

impl<R, E> Collector<R, E> {
    fn new(keep_results: bool, fail_fast: bool) -> Self {
        Self {
            keep_results,
            fail_fast,
            results: Vec::new(),
            failures: Vec::new(),
            trip: None,
        }
    }

    fn absorb(&mut self, index: u64, outcome: Outcome<R, E>) {
        match outcome {
            Outcome::Success { value } => {
                if self.keep_results {
                    self.results.push(value);
                }
            }
            Outcome::Failure {
                error, attempts, ..
            } => self.fail(ItemFailure {
                index,
                attempts,
                error,
            }),
            Outcome::Skipped { .. } => self.fail(ItemFailure {
                index,
                attempts: 0,
                error: AttemptError::CircuitOpen,
            }),
            Outcome::Cancelled => {}
        }
    }

    fn fail(&mut self, failure: ItemFailure<E>) {
        if self.fail_fast {
            if self.trip.is_none() {
                self.trip = Some(failure);
            }
        } else {
            self.failures.push(failure);
        }
    }
}

/// Runs the engine to completion, collecting results in memory.
///
/// Backs both `map` (`keep_results = true`) and `for_each`.
pub(crate) async fn run_collect<T, R, E, F, Fut>(
    source: Source<T>,
    options: RivuletOptions<T, R, E>,
    op: F,
    keep_results: bool,
) -> Result<(Vec<R>, Vec<ItemFailure<E>>, CounterSnapshot), RunError<E>>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    E: FaultTagged + Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let ordered = options.ordered_output;
    let fail_fast = options.error_mode == ErrorMode::FailFast;
    let (shared, mut launched) = launch(source, options, op);

    let mut collector = Collector::new(keep_results, fail_fast);
    let mut buffer = OrderingBuffer::new();

    while let Some((index, outcome)) = launched.result_rx.recv().await {
        if ordered {
            buffer.push(index, outcome);
            while let Some((ready_index, ready)) = buffer.pop_ready() {
                collector.absorb(ready_index, ready);
            }
        } else {
            collector.absorb(index, outcome);
        }
    }
    // A cancellation can leave holes; whatever remains is still terminal.
    if buffer.len() > 0 {
        for (index, outcome) in buffer.drain() {
            collector.absorb(index, outcome);
        }
    }

    let fault = shutdown(&shared, &mut launched).await;
    let source_error = shared
        .source_error
        .lock()
        .expect("source error slot")
        .take();

    if let Some(fault) = fault {
        return Err(RunError::Fault(fault));
    }
    if let Some(trip) = collector.trip {
        return Err(RunError::Operation(trip));
    }
    if let Some(source_error) = source_error {
        return Err(RunError::Source(source_error));
    }
    if launched
        .caller_token
        .as_ref()
        .is_some_and(CancellationToken::is_cancelled)
    {
        return Err(RunError::Cancelled);
    }

    Ok((
        collector.results,
        collector.failures,
        shared.counters.snapshot(),
    ))
}

/// Runs the engine in the background, forwarding outcomes to a channel.
///
/// Backs the `stream` operator. Dropping the receiver cancels the run.
pub(crate) fn run_streaming<T, R, E, F, Fut>(
    source: Source<T>,
    options: RivuletOptions<T, R, E>,
    op: F,
) -> mpsc::Receiver<Result<R, RunError<E>>>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    E: FaultTagged + Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::channel(options.input_buffer);
    let ordered = options.ordered_output;
    let fail_fast = options.error_mode == ErrorMode::FailFast;

    tokio::spawn(async move {
        let (shared, mut launched) = launch(source, options, op);
        let mut buffer = OrderingBuffer::new();
        let mut trip: Option<ItemFailure<E>> = None;
        let mut consumer_gone = false;

        'recv: while let Some((index, outcome)) = launched.result_rx.recv().await {
            let mut ready = Vec::with_capacity(1);
            if ordered {
                buffer.push(index, outcome);
                while let Some(entry) = buffer.pop_ready() {
                    ready.push(entry);
                }
            } else {
                ready.push((index, outcome));
            }

            for (ready_index, ready_outcome) in ready {
                let message = match ready_outcome {
                    Outcome::Success { value } => {
                        if trip.is_none() {
                            Some(Ok(value))
                        } else {
                            None
                        }
                    }
                    Outcome::Failure {
                        error, attempts, ..
                    } => stream_failure(
                        ItemFailure {
                            index: ready_index,
                            attempts,
                            error,
                        },
                        fail_fast,
                        &mut trip,
                    ),
                    Outcome::Skipped { .. } => stream_failure(
                        ItemFailure {
                            index: ready_index,
                            attempts: 0,
                            error: AttemptError::CircuitOpen,
                        },
                        fail_fast,
                        &mut trip,
                    ),
                    Outcome::Cancelled => None,
                };

                if let Some(message) = message {
                    if out_tx.send(message).await.is_err() {
                        tracing::debug!("result stream dropped; cancelling run");
                        shared.run_token.cancel();
                        consumer_gone = true;
                        break 'recv;
                    }
                }
            }
        }

        let fault = shutdown(&shared, &mut launched).await;
        let source_error = shared
            .source_error
            .lock()
            .expect("source error slot")
            .take();

        let terminal = if let Some(fault) = fault {
            Some(RunError::Fault(fault))
        } else if let Some(trip) = trip {
            Some(RunError::Operation(trip))
        } else if let Some(source_error) = source_error {
            Some(RunError::Source(source_error))
        } else if !consumer_gone
            && launched
                .caller_token
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
        {
            Some(RunError::Cancelled)
        } else {
            None
        };

        if let Some(terminal) = terminal {
            let _ = out_tx.send(Err(terminal)).await;
        }
    });

    out_rx
}

fn stream_failure<R, E>(
    failure: ItemFailure<E>,
    fail_fast: bool,
    trip: &mut Option<ItemFailure<E>>,
) -> Option<Result<R, RunError<E>>> {
    if fail_fast {
        if trip.is_none() {
            *trip = Some(failure);
        }
        None
    } else {
        Some(Err(RunError::Operation(failure)))
    }
}
