//! Ordered-output guarantees.

use rivulet::{map, ErrorMode, RivuletOptions, Source};
use rivulet_core::fault::Fault;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn ordered_output_matches_input_order_despite_uneven_latency() {
    let options = RivuletOptions::builder()
        .max_parallelism(8)
        .ordered_output(true)
        .build();

    let output = map(Source::from_iter(0..40u64), options, |x, _cancel| async move {
        // Later items often finish earlier.
        tokio::time::sleep(Duration::from_millis((x % 7) * 10)).await;
        Ok::<_, Fault>(x * 2)
    })
    .await
    .unwrap();

    let expected: Vec<u64> = (0..40).map(|x| x * 2).collect();
    assert_eq!(output.results, expected);
}

#[tokio::test]
async fn ordered_scenario_exact_list() {
    let options = RivuletOptions::builder()
        .max_parallelism(4)
        .ordered_output(true)
        .build();
    let output = map(Source::from_iter(1..=10u32), options, |x, _cancel| async move {
        Ok::<_, Fault>(2 * x)
    })
    .await
    .unwrap();
    assert_eq!(output.results, vec![2, 4, 6, 8, 10, 12, 14, 16, 18, 20]);
}

#[tokio::test(start_paused = true)]
async fn ordered_failures_do_not_block_later_successes() {
    let options = RivuletOptions::builder()
        .max_parallelism(4)
        .ordered_output(true)
        .error_mode(ErrorMode::CollectAndContinue)
        .build();

    let output = map(Source::from_iter(0..10u32), options, |x, _cancel| async move {
        if x == 0 {
            // The failure at index 0 resolves slowly; everything later
            // must still come out in order once its turn has passed.
            tokio::time::sleep(Duration::from_millis(100)).await;
            Err(Fault::new(rivulet_core::fault::FaultKind::Deadlock))
        } else {
            Ok(x)
        }
    })
    .await
    .unwrap();

    assert_eq!(output.results, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].index, 0);
}
