//! Batched operator behavior.

use rivulet::{map_batched, BatchOptions, ErrorMode, RivuletOptions, Source};
use rivulet_core::fault::{FaultKind, FaultTagged};
use std::fmt;

#[derive(Debug, Clone)]
struct BatchError;

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("batch refused")
    }
}

impl FaultTagged for BatchError {
    fn fault_kind(&self) -> Option<FaultKind> {
        None
    }
}

#[tokio::test]
async fn batches_are_processed_whole_and_in_order() {
    let options = RivuletOptions::builder()
        .max_parallelism(4)
        .ordered_output(true)
        .build();

    let output = map_batched(
        Source::from_iter(1..=7u32),
        BatchOptions::new(3),
        options,
        |batch, _cancel| async move {
            let sum: u32 = batch.iter().sum();
            Ok::<_, BatchError>(vec![sum])
        },
    )
    .await
    .unwrap();

    assert_eq!(output.results, vec![vec![6], vec![15], vec![7]]);
}

#[tokio::test]
async fn batch_results_keep_item_granularity() {
    let options = RivuletOptions::builder().ordered_output(true).build();

    let output = map_batched(
        Source::from_iter(0..10u32),
        BatchOptions::new(4),
        options,
        |batch, _cancel| async move {
            Ok::<_, BatchError>(batch.into_iter().map(|x| x * 10).collect())
        },
    )
    .await
    .unwrap();

    let flattened: Vec<u32> = output.results.into_iter().flatten().collect();
    assert_eq!(flattened, (0..10).map(|x| x * 10).collect::<Vec<_>>());
}

#[tokio::test]
async fn one_bad_batch_fails_as_a_unit() {
    let options = RivuletOptions::builder()
        .error_mode(ErrorMode::CollectAndContinue)
        .ordered_output(true)
        .build();

    let output = map_batched(
        Source::from_iter(0..9u32),
        BatchOptions::new(3),
        options,
        |batch, _cancel| async move {
            if batch.contains(&4) {
                Err(BatchError)
            } else {
                Ok(batch)
            }
        },
    )
    .await
    .unwrap();

    // Batch ordinal 1 (items 3..=5) failed; the other two survive.
    assert_eq!(output.results.len(), 2);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].index, 1);
}
