//! FailFast, CollectAndContinue and BestEffort semantics.

use rivulet::{map, AttemptError, ErrorMode, RivuletOptions, RunError, Source};
use rivulet_core::fault::{FaultKind, FaultTagged};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
struct WorkError {
    message: &'static str,
    kind: Option<FaultKind>,
}

impl WorkError {
    fn permanent(message: &'static str) -> Self {
        Self {
            message,
            kind: None,
        }
    }
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl FaultTagged for WorkError {
    fn fault_kind(&self) -> Option<FaultKind> {
        self.kind
    }
}

#[tokio::test]
async fn fail_fast_surfaces_the_error_and_no_results() {
    let options = RivuletOptions::<u32, u32, WorkError>::builder()
        .max_parallelism(4)
        .error_mode(ErrorMode::FailFast)
        .build();
    let counters = options.counters();

    let result = map(Source::from_iter(1..=100u32), options, |x, _cancel| async move {
        if x == 7 {
            Err(WorkError::permanent("bad item"))
        } else {
            Ok(x)
        }
    })
    .await;

    let failure = match result {
        Err(RunError::Operation(failure)) => failure,
        other => panic!("expected fail-fast operation error, got {other:?}"),
    };
    assert_eq!(failure.index, 6);
    assert!(matches!(failure.error, AttemptError::Operation(ref e) if e.message == "bad item"));

    // Items ahead of the failing one in channel order had started.
    assert!(counters.snapshot().started >= 7);
}

#[tokio::test]
async fn fail_fast_with_ordering_still_returns_nothing() {
    let options = RivuletOptions::<u32, u32, WorkError>::builder()
        .max_parallelism(2)
        .ordered_output(true)
        .error_mode(ErrorMode::FailFast)
        .build();

    let result = map(Source::from_iter(1..=20u32), options, |x, _cancel| async move {
        if x == 5 {
            Err(WorkError::permanent("nope"))
        } else {
            Ok(x)
        }
    })
    .await;

    assert!(matches!(result, Err(RunError::Operation(_))));
}

#[tokio::test]
async fn collect_and_continue_aggregates_failures_by_index() {
    let options = RivuletOptions::<u32, u32, WorkError>::builder()
        .max_parallelism(4)
        .ordered_output(true)
        .error_mode(ErrorMode::CollectAndContinue)
        .build();

    let output = map(Source::from_iter(1..=5u32), options, |x, _cancel| async move {
        if x % 2 == 0 {
            Err(WorkError::permanent("even"))
        } else {
            Ok(x)
        }
    })
    .await
    .unwrap();

    assert_eq!(output.results, vec![1, 3, 5]);
    assert_eq!(output.failures.len(), 2);
    let mut failed_indices: Vec<u64> = output.failures.iter().map(|f| f.index).collect();
    failed_indices.sort_unstable();
    assert_eq!(failed_indices, vec![1, 3]);
}

#[tokio::test]
async fn best_effort_collects_like_collect_and_continue() {
    let options = RivuletOptions::<u32, u32, WorkError>::builder()
        .error_mode(ErrorMode::BestEffort)
        .build();

    let output = map(Source::from_iter(1..=10u32), options, |x, _cancel| async move {
        if x > 8 {
            Err(WorkError::permanent("too big"))
        } else {
            Ok(x)
        }
    })
    .await
    .unwrap();

    assert_eq!(output.results.len(), 8);
    assert_eq!(output.failures.len(), 2);
}

#[tokio::test]
async fn every_read_item_resolves_exactly_once() {
    let resolved = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&resolved);

    let options = RivuletOptions::<u32, u32, WorkError>::builder()
        .max_parallelism(4)
        .error_mode(ErrorMode::CollectAndContinue)
        .on_complete_item(move |_index, _outcome| {
            probe.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build();

    let output = map(Source::from_iter(0..50u32), options, |x, _cancel| async move {
        if x % 5 == 0 {
            Err(WorkError::permanent("multiple of five"))
        } else {
            Ok(x)
        }
    })
    .await
    .unwrap();

    assert_eq!(resolved.load(Ordering::SeqCst), 50);
    assert_eq!(output.results.len() + output.failures.len(), 50);
}
