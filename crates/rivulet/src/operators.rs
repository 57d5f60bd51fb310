//! The public operator surface: `map`, `stream`, `for_each` and the
//! batched variants.
//!
//! Every operator runs the same engine; they differ only in how results
//! leave it. The user operation receives each payload together with a
//! cancellation token it must honour, and is invoked concurrently for
//! different items up to the configured parallelism.

use crate::batch::{batch_source, BatchOptions};
use crate::engine::{run_collect, run_streaming};
use crate::error::{MapOutput, RunError, RunReport};
use crate::options::RivuletOptions;
use crate::source::Source;
use rivulet_core::fault::FaultTagged;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Transforms every item of `source` through `op` with bounded
/// concurrency, collecting the results.
///
/// Results come back in input order when `ordered_output` is set,
/// completion order otherwise. Under
/// [`ErrorMode::FailFast`](crate::ErrorMode::FailFast) the first
/// permanent failure cancels the run and no partial results are
/// returned; the collecting modes return the successes together with a
/// per-item failure aggregate.
///
/// ```no_run
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// use rivulet::{map, RivuletOptions, Source};
/// use rivulet_core::fault::Fault;
///
/// let options = RivuletOptions::builder().max_parallelism(4).build();
/// let output = map(Source::from_iter(1..=10), options, |x, _cancel| async move {
///     Ok::<_, Fault>(x * 2)
/// })
/// .await?;
/// assert_eq!(output.results.len(), 10);
/// # Ok(())
/// # }
/// ```
pub async fn map<T, R, E, F, Fut>(
    source: Source<T>,
    options: RivuletOptions<T, R, E>,
    op: F,
) -> Result<MapOutput<R, E>, RunError<E>>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    E: FaultTagged + Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let (results, failures, _counters) = run_collect(source, options, op, true).await?;
    Ok(MapOutput { results, failures })
}

/// Runs `op` for its side effects on every item of `source`.
///
/// Returns a [`RunReport`] with the failure aggregate and the terminal
/// counter snapshot.
pub async fn for_each<T, E, F, Fut>(
    source: Source<T>,
    options: RivuletOptions<T, (), E>,
    op: F,
) -> Result<RunReport<E>, RunError<E>>
where
    T: Clone + Send + 'static,
    E: FaultTagged + Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    let (_results, failures, counters) = run_collect(source, options, op, false).await?;
    Ok(RunReport { failures, counters })
}

/// Like [`map`], but yields results lazily as they become available.
///
/// The engine runs in the background; dropping the stream cancels it.
/// In the collecting error modes, per-item failures are interleaved as
/// `Err` items and the stream continues; under fail-fast the stream
/// yields results until the trip, then one terminal `Err`, then ends.
pub fn stream<T, R, E, F, Fut>(
    source: Source<T>,
    options: RivuletOptions<T, R, E>,
    op: F,
) -> ResultStream<R, E>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    E: FaultTagged + Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    ResultStream {
        rx: run_streaming(source, options, op),
    }
}

/// Groups items into slices before applying [`map`] at batch level.
///
/// `op` receives whole batches; one failure fails the whole batch. The
/// batch ordinal is the ordering key.
pub async fn map_batched<T, R, E, F, Fut>(
    source: Source<T>,
    batch: BatchOptions,
    options: RivuletOptions<Vec<T>, Vec<R>, E>,
    op: F,
) -> Result<MapOutput<Vec<R>, E>, RunError<E>>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    E: FaultTagged + Send + 'static,
    F: Fn(Vec<T>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<R>, E>> + Send + 'static,
{
    let clock = options.clock();
    map(batch_source(source, batch, clock), options, op).await
}

/// Groups items into slices before applying [`for_each`] at batch level.
pub async fn for_each_batched<T, E, F, Fut>(
    source: Source<T>,
    batch: BatchOptions,
    options: RivuletOptions<Vec<T>, (), E>,
    op: F,
) -> Result<RunReport<E>, RunError<E>>
where
    T: Clone + Send + 'static,
    E: FaultTagged + Send + 'static,
    F: Fn(Vec<T>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    let clock = options.clock();
    for_each(batch_source(source, batch, clock), options, op).await
}

/// The lazy result stream returned by [`stream`].
///
/// Yields `Ok(result)` per successful item and `Err` for per-item
/// failures (collecting modes) or the single terminal error (fail-fast,
/// cancellation, source failure). Dropping it cancels the run.
pub struct ResultStream<R, E> {
    rx: mpsc::Receiver<Result<R, RunError<E>>>,
}

impl<R, E> futures::Stream for ResultStream<R, E> {
    type Item = Result<R, RunError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<R, E> std::fmt::Debug for ResultStream<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream").finish()
    }
}
