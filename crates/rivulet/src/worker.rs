//! The worker loop and the per-item resilience pipeline.
//!
//! Each worker repeatedly pulls one item and runs the pipeline stages in
//! fixed order: adaptive slot → rate limit → circuit breaker guard →
//! (retry × per-attempt timeout) → user operation. Every wait observes
//! the run's cancellation token.

use crate::engine::EngineShared;
use crate::error::ErrorMode;
use crate::events::EngineEvent;
use crate::outcome::{Outcome, SkipReason};
use rivulet_adaptive::SlotPermit;
use rivulet_core::fault::{AttemptError, FaultTagged};
use rivulet_retry::RetryEvent;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub(crate) async fn worker_loop<T, R, E, F, Fut>(
    shared: Arc<EngineShared<T, R, E, F>>,
    input: Arc<tokio::sync::Mutex<mpsc::Receiver<(u64, T)>>>,
    results: mpsc::Sender<(u64, Outcome<R, E>)>,
    worker_id: usize,
) where
    T: Clone + Send + 'static,
    R: Send + 'static,
    E: FaultTagged + Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    tracing::trace!(worker_id, "worker started");
    loop {
        let next = {
            let mut rx = input.lock().await;
            match rx.try_recv() {
                Ok(item) => Some(item),
                Err(mpsc::error::TryRecvError::Empty) => {
                    shared.counters.record_drain();
                    tokio::select! {
                        _ = shared.run_token.cancelled() => None,
                        item = rx.recv() => item,
                    }
                }
                Err(mpsc::error::TryRecvError::Disconnected) => None,
            }
        };
        let Some((index, payload)) = next else { break };

        let outcome = process_item(&shared, index, payload).await;
        shared.hooks.complete_item(&shared.hub, index, &outcome);
        let trips = shared.error_mode == ErrorMode::FailFast && outcome.is_failure();

        // Publish before tripping so the sink always sees the outcome
        // that caused the trip.
        let published = tokio::select! {
            biased;
            sent = results.send((index, outcome)) => sent.is_ok(),
            _ = shared.run_token.cancelled() => false,
        };
        if trips {
            tracing::debug!(index, "permanent failure tripped fail-fast");
            shared.run_token.cancel();
        }
        if !published && !trips {
            // The sink is gone; nothing left to work for.
            shared.run_token.cancel();
            break;
        }
    }
    tracing::trace!(worker_id, "worker stopped");
}

/// Runs the full resilience pipeline for one item.
async fn process_item<T, R, E, F, Fut>(
    shared: &Arc<EngineShared<T, R, E, F>>,
    index: u64,
    payload: T,
) -> Outcome<R, E>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    E: FaultTagged + Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    // One slot per item, held until the item is terminally resolved.
    let _slot: Option<SlotPermit> = match &shared.adaptive {
        Some(controller) => {
            tokio::select! {
                _ = shared.run_token.cancelled() => return Outcome::Cancelled,
                permit = controller.acquire_slot() => Some(permit),
            }
        }
        None => None,
    };

    let mut retries_used: u32 = 0;
    let mut attempts_made: u32 = 0;
    let mut prev_delay = Duration::ZERO;
    let mut started = false;

    loop {
        let mut ran_op = false;
        let mut latency = Duration::ZERO;

        // Rate limit: every attempt pays, retries included.
        let refusal: Option<AttemptError<E>> = match &shared.limiter {
            Some(bucket) if bucket.is_fail_fast() => bucket
                .try_acquire(bucket.tokens_per_operation())
                .err()
                .map(|_| AttemptError::RateLimited),
            Some(bucket) => {
                let acquired = tokio::select! {
                    _ = shared.run_token.cancelled() => false,
                    _ = bucket.acquire(bucket.tokens_per_operation()) => true,
                };
                if !acquired {
                    return Outcome::Cancelled;
                }
                None
            }
            None => None,
        };

        let attempt_result: Result<R, AttemptError<E>> = if let Some(error) = refusal {
            Err(error)
        } else if shared
            .breaker
            .as_ref()
            .is_some_and(|breaker| breaker.try_acquire().is_err())
        {
            if !started {
                shared.counters.record_skipped();
                return Outcome::Skipped {
                    reason: SkipReason::CircuitOpen,
                };
            }
            Err(AttemptError::CircuitOpen)
        } else {
            if !started {
                // Counted after the rate limit is satisfied, before the
                // operation runs.
                shared.counters.record_started();
                started = true;
                shared.hooks.start_item(&shared.hub, index, &payload);
            }
            attempts_made += 1;
            let begun = shared.clock.now();
            let result = run_attempt(shared, payload.clone()).await;
            latency = shared.clock.now().saturating_duration_since(begun);
            ran_op = !matches!(result, Err(AttemptError::Cancelled));
            result
        };

        match attempt_result {
            Ok(value) => {
                if ran_op {
                    if let Some(breaker) = &shared.breaker {
                        breaker.record_success();
                    }
                    if let Some(controller) = &shared.adaptive {
                        controller.record(latency, true);
                    }
                }
                shared.counters.record_completed();

                #[cfg(feature = "metrics")]
                {
                    metrics::counter!("rivulet_items_completed_total").increment(1);
                    metrics::histogram!("rivulet_attempt_duration_seconds")
                        .record(latency.as_secs_f64());
                }

                if retries_used > 0 {
                    let event = RetryEvent::Succeeded {
                        name: shared.retry.name().to_string(),
                        timestamp: shared.clock.now(),
                        index,
                        attempts: attempts_made,
                    };
                    shared.retry.listeners().notify(&event);
                    shared.hub.publish(EngineEvent::Retry(event));
                }
                return Outcome::Success { value };
            }
            Err(AttemptError::Cancelled) => return Outcome::Cancelled,
            Err(error) => {
                if ran_op {
                    if let Some(breaker) = &shared.breaker {
                        breaker.record_failure();
                    }
                    if let Some(controller) = &shared.adaptive {
                        controller.record(latency, false);
                    }

                    #[cfg(feature = "metrics")]
                    metrics::histogram!("rivulet_attempt_duration_seconds")
                        .record(latency.as_secs_f64());
                }

                if shared.retry.should_retry(&error, retries_used) {
                    retries_used += 1;
                    shared.counters.record_retried();
                    let delay = shared.retry.next_delay(retries_used, prev_delay);
                    prev_delay = delay;

                    #[cfg(feature = "metrics")]
                    metrics::counter!("rivulet_items_retried_total").increment(1);

                    let event = RetryEvent::Scheduled {
                        name: shared.retry.name().to_string(),
                        timestamp: shared.clock.now(),
                        index,
                        attempt: retries_used,
                        delay,
                    };
                    shared.retry.listeners().notify(&event);
                    shared.hub.publish(EngineEvent::Retry(event));

                    tokio::select! {
                        _ = shared.run_token.cancelled() => return Outcome::Cancelled,
                        _ = shared.clock.sleep(delay) => {}
                    }
                    continue;
                }

                shared.counters.record_failed();
                shared.hooks.error(&shared.hub, index, &error);

                #[cfg(feature = "metrics")]
                metrics::counter!("rivulet_items_failed_total").increment(1);

                let event = if retries_used > 0 || shared.retry.is_transient(&error) {
                    RetryEvent::Exhausted {
                        name: shared.retry.name().to_string(),
                        timestamp: shared.clock.now(),
                        index,
                        attempts: attempts_made,
                    }
                } else {
                    RetryEvent::NotRetryable {
                        name: shared.retry.name().to_string(),
                        timestamp: shared.clock.now(),
                        index,
                    }
                };
                shared.retry.listeners().notify(&event);
                shared.hub.publish(EngineEvent::Retry(event));

                return Outcome::Failure {
                    error,
                    retried: retries_used > 0,
                    attempts: attempts_made,
                };
            }
        }
    }
}

/// One invocation of the user operation under its per-attempt deadline.
async fn run_attempt<T, R, E, F, Fut>(
    shared: &Arc<EngineShared<T, R, E, F>>,
    payload: T,
) -> Result<R, AttemptError<E>>
where
    T: Clone + Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let attempt_token = shared.run_token.child_token();
    let op_future = (shared.op)(payload, attempt_token.clone());

    match shared.per_item_timeout {
        Some(limit) => {
            tokio::select! {
                result = op_future => result.map_err(AttemptError::Operation),
                _ = shared.clock.sleep(limit) => {
                    // The op may still be running; we stop waiting for it.
                    attempt_token.cancel();
                    Err(AttemptError::Timeout { elapsed: limit })
                }
                _ = shared.run_token.cancelled() => {
                    attempt_token.cancel();
                    Err(AttemptError::Cancelled)
                }
            }
        }
        None => {
            tokio::select! {
                result = op_future => result.map_err(AttemptError::Operation),
                _ = shared.run_token.cancelled() => {
                    attempt_token.cancel();
                    Err(AttemptError::Cancelled)
                }
            }
        }
    }
}
