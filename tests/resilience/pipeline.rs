//! Composition of the pipeline stages.

use rivulet::{map, CircuitBreaker, CircuitState, ErrorMode, RivuletOptions, Source, TokenBucket};
use rivulet_core::fault::{Fault, FaultKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn breaker_counts_retried_attempts_not_items() {
    // One item, three transient failures: the breaker sees three
    // recorded failures and trips mid-retry.
    let breaker = Arc::new(CircuitBreaker::new(
        CircuitBreaker::builder()
            .failure_threshold(3)
            .open_timeout(Duration::from_secs(600))
            .build(),
    ));

    let options = RivuletOptions::builder()
        .max_parallelism(1)
        .max_retries(5)
        .base_delay(Duration::from_millis(1))
        .circuit_breaker_shared(Arc::clone(&breaker))
        .error_mode(ErrorMode::CollectAndContinue)
        .build();

    let output = map(Source::from_iter(0..1u32), options, |_x, _cancel| async move {
        Err::<u32, _>(Fault::new(FaultKind::TemporaryUnavailable))
    })
    .await
    .unwrap();

    assert_eq!(breaker.state(), CircuitState::Open);
    // The item's fourth attempt was refused by the now-open breaker.
    assert_eq!(output.failures.len(), 1);
    assert!(output.failures[0].error.is_circuit_open());
    assert_eq!(output.failures[0].attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_is_paid_per_attempt() {
    let options = RivuletOptions::builder()
        .max_parallelism(1)
        .max_retries(2)
        .base_delay(Duration::from_millis(1))
        .rate_limit(TokenBucket::builder(1.0).burst(1.0))
        .error_mode(ErrorMode::CollectAndContinue)
        .build();

    let begun = Instant::now();
    map(Source::from_iter(0..1u32), options, |_x, _cancel| async move {
        Err::<u32, _>(Fault::new(FaultKind::Timeout))
    })
    .await
    .unwrap();

    // Three attempts, one token each: burst covers the first, the other
    // two wait a second apiece.
    let elapsed = begun.elapsed();
    assert!(elapsed >= Duration::from_millis(1900), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn all_stages_compose_on_the_happy_path() {
    let options = RivuletOptions::builder()
        .max_parallelism(8)
        .adaptive(rivulet::AdaptiveController::builder(1, 8).initial(4))
        .rate_limit(TokenBucket::builder(50.0).burst(50.0))
        .circuit_breaker(CircuitBreaker::builder().failure_threshold(5))
        .max_retries(2)
        .base_delay(Duration::from_millis(5))
        .per_item_timeout(Duration::from_secs(1))
        .ordered_output(true)
        .error_mode(ErrorMode::CollectAndContinue)
        .build();

    let output = map(Source::from_iter(0..100u32), options, |x, _cancel| async move {
        tokio::time::sleep(Duration::from_millis(2)).await;
        Ok::<_, Fault>(x + 1)
    })
    .await
    .unwrap();

    assert_eq!(output.results, (1..=100).collect::<Vec<_>>());
    assert!(output.failures.is_empty());
}
