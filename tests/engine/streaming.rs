//! The lazy `stream` operator.

use futures::StreamExt;
use rivulet::{stream, ErrorMode, RivuletOptions, RunError, Source};
use rivulet_core::fault::{FaultKind, FaultTagged};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
struct StreamError;

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("stream op failed")
    }
}

impl FaultTagged for StreamError {
    fn fault_kind(&self) -> Option<FaultKind> {
        None
    }
}

#[tokio::test]
async fn stream_yields_every_result() {
    let options = RivuletOptions::builder().max_parallelism(4).build();
    let results: Vec<_> = stream(Source::from_iter(1..=20u32), options, |x, _cancel| async move {
        Ok::<_, StreamError>(x * 3)
    })
    .collect()
    .await;

    let mut values: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
    values.sort_unstable();
    assert_eq!(values, (1..=20).map(|x| x * 3).collect::<Vec<_>>());
}

#[tokio::test]
async fn ordered_stream_is_in_input_order() {
    let options = RivuletOptions::builder()
        .max_parallelism(8)
        .ordered_output(true)
        .build();
    let results: Vec<_> = stream(Source::from_iter(0..30u32), options, |x, _cancel| async move {
        Ok::<_, StreamError>(x)
    })
    .collect()
    .await;

    let values: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(values, (0..30).collect::<Vec<_>>());
}

#[tokio::test]
async fn collecting_stream_interleaves_failures() {
    let options = RivuletOptions::builder()
        .max_parallelism(2)
        .error_mode(ErrorMode::CollectAndContinue)
        .build();

    let items: Vec<_> = stream(Source::from_iter(0..10u32), options, |x, _cancel| async move {
        if x % 3 == 0 {
            Err(StreamError)
        } else {
            Ok(x)
        }
    })
    .collect()
    .await;

    let ok = items.iter().filter(|r| r.is_ok()).count();
    let failed = items.iter().filter(|r| r.is_err()).count();
    assert_eq!(ok, 6);
    assert_eq!(failed, 4);
}

#[tokio::test]
async fn fail_fast_stream_ends_with_one_terminal_error() {
    let options = RivuletOptions::builder()
        .max_parallelism(1)
        .error_mode(ErrorMode::FailFast)
        .build();

    let items: Vec<_> = stream(Source::from_iter(0..10u32), options, |x, _cancel| async move {
        if x == 3 {
            Err(StreamError)
        } else {
            Ok(x)
        }
    })
    .collect()
    .await;

    let (last, yielded) = items.split_last().expect("at least the terminal error");
    assert!(yielded.iter().all(|r| r.is_ok()));
    match last {
        Err(RunError::Operation(failure)) => assert_eq!(failure.index, 3),
        other => panic!("expected terminal operation error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn dropping_the_stream_cancels_the_run() {
    let options = RivuletOptions::builder().max_parallelism(2).build();
    let counters = options.counters();

    let mut results = stream(Source::from_iter(0u64..), options, |x, _cancel| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, StreamError>(x)
    });

    assert!(results.next().await.unwrap().is_ok());
    assert!(results.next().await.unwrap().is_ok());
    drop(results);

    // Give the engine a moment to observe the drop and wind down.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = counters.snapshot().started;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(counters.snapshot().started, settled);
}
