//! Cancellation and per-attempt timeout behavior.

use rivulet::{map, AttemptError, ErrorMode, RivuletOptions, RunError, Source};
use rivulet_core::fault::Fault;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn caller_cancellation_terminates_an_unbounded_run() {
    let token = CancellationToken::new();
    let options = RivuletOptions::builder()
        .max_parallelism(2)
        .cancellation(token.clone())
        .build();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let begun = Instant::now();
    let result = map(Source::from_iter(0u64..), options, |x, _cancel| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, Fault>(x)
    })
    .await;

    assert!(matches!(result, Err(RunError::Cancelled)));
    // Teardown is prompt: one attempt quantum past the signal.
    assert!(begun.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn in_flight_ops_observe_the_cancel_signal() {
    let token = CancellationToken::new();
    let options = RivuletOptions::builder()
        .max_parallelism(4)
        .cancellation(token.clone())
        .build();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let result = map(Source::from_iter(0..8u32), options, |x, cancel| async move {
        // A well-behaved op waits on its own work and the cancel signal.
        tokio::select! {
            _ = cancel.cancelled() => Ok::<_, Fault>(x),
            _ = tokio::time::sleep(Duration::from_secs(3600)) => Ok(x),
        }
    })
    .await;

    assert!(matches!(result, Err(RunError::Cancelled)));
}

#[tokio::test(start_paused = true)]
async fn per_attempt_timeout_fails_the_item() {
    let options = RivuletOptions::builder()
        .max_parallelism(2)
        .per_item_timeout(Duration::from_millis(50))
        .error_mode(ErrorMode::CollectAndContinue)
        .build();

    let begun = Instant::now();
    let output = map(Source::from_iter(0..4u32), options, |x, cancel| async move {
        if x == 2 {
            // Honours cancellation, but would otherwise run for an hour.
            cancel.cancelled().await;
            Err(Fault::new(rivulet_core::fault::FaultKind::Timeout))
        } else {
            Ok(x)
        }
    })
    .await
    .unwrap();

    assert_eq!(output.results.len(), 3);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].index, 2);
    assert!(output.failures[0].error.is_timeout());
    assert!(begun.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn timeout_applies_even_when_the_op_ignores_cancel() {
    let options = RivuletOptions::builder()
        .max_parallelism(1)
        .per_item_timeout(Duration::from_millis(50))
        .error_mode(ErrorMode::CollectAndContinue)
        .build();

    let begun = Instant::now();
    let output = map(Source::from_iter(0..3u32), options, |x, _cancel| async move {
        if x == 1 {
            // Ignores its cancellation token entirely.
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok::<_, Fault>(x)
    })
    .await
    .unwrap();

    // The engine stopped waiting; the item is counted failed.
    assert_eq!(output.results.len(), 2);
    assert!(output.failures[0].error.is_timeout());
    assert!(begun.elapsed() < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn timeout_excludes_retry_waits() {
    // One retry with a long backoff: the second attempt must get a
    // fresh deadline rather than inheriting the first attempt's.
    let options = RivuletOptions::builder()
        .max_parallelism(1)
        .per_item_timeout(Duration::from_millis(100))
        .max_retries(1)
        .base_delay(Duration::from_millis(500))
        .is_transient(|error: &AttemptError<Fault>| error.is_timeout())
        .error_mode(ErrorMode::CollectAndContinue)
        .build();

    let attempts = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let probe = std::sync::Arc::clone(&attempts);

    let begun = Instant::now();
    let output = map(Source::from_iter(0..1u32), options, move |_x, _cancel| {
        let attempts = std::sync::Arc::clone(&probe);
        async move {
            let attempt = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if attempt == 0 {
                // Blows the 100ms attempt budget.
                tokio::time::sleep(Duration::from_millis(150)).await;
            } else {
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            Ok::<_, Fault>(1)
        }
    })
    .await
    .unwrap();

    // First attempt timed out at 100ms, then a 500ms backoff, then a
    // fresh 100ms budget comfortably fits the 80ms second attempt.
    assert_eq!(output.results, vec![1]);
    assert!(output.failures.is_empty());
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    let elapsed = begun.elapsed();
    assert!(elapsed >= Duration::from_millis(680), "elapsed {elapsed:?}");
}
