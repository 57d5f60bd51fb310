//! Basic operator behavior.

use rivulet::{for_each, map, ErrorMode, RivuletOptions, Source};
use rivulet_core::fault::Fault;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn map_doubles_every_item() {
    let options = RivuletOptions::builder().max_parallelism(4).build();
    let output = map(Source::from_iter(1..=10), options, |x: u32, _cancel| async move {
        Ok::<_, Fault>(x * 2)
    })
    .await
    .unwrap();

    let mut results = output.results;
    results.sort_unstable();
    assert_eq!(results, vec![2, 4, 6, 8, 10, 12, 14, 16, 18, 20]);
    assert!(output.failures.is_empty());
}

#[tokio::test]
async fn map_over_empty_source_is_empty() {
    let options = RivuletOptions::builder().build();
    let output = map(
        Source::from_iter(Vec::<u32>::new()),
        options,
        |x, _cancel| async move { Ok::<_, Fault>(x) },
    )
    .await
    .unwrap();
    assert!(output.results.is_empty());
    assert!(output.failures.is_empty());
}

#[tokio::test]
async fn for_each_runs_every_side_effect() {
    let sum = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&sum);

    let options = RivuletOptions::builder().max_parallelism(8).build();
    let report = for_each(Source::from_iter(1..=100usize), options, move |x, _cancel| {
        let sink = Arc::clone(&sink);
        async move {
            sink.fetch_add(x, Ordering::SeqCst);
            Ok::<_, Fault>(())
        }
    })
    .await
    .unwrap();

    assert_eq!(sum.load(Ordering::SeqCst), 5050);
    assert!(report.is_complete());
    assert_eq!(report.counters.completed, 100);
}

#[tokio::test(start_paused = true)]
async fn concurrency_never_exceeds_max_parallelism() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let active_probe = Arc::clone(&active);
    let peak_probe = Arc::clone(&peak);

    let options = RivuletOptions::builder().max_parallelism(4).build();
    map(Source::from_iter(0..50u32), options, move |x, _cancel| {
        let active = Arc::clone(&active_probe);
        let peak = Arc::clone(&peak_probe);
        async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, Fault>(x)
        }
    })
    .await
    .unwrap();

    assert!(peak.load(Ordering::SeqCst) <= 4, "peak {peak:?}");
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn bounded_input_buffer_limits_readahead() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let pulled_probe = Arc::clone(&pulled);
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let gate_probe = Arc::clone(&gate);

    let source = Source::from_iter((0..100u32).map(move |x| {
        pulled_probe.fetch_add(1, Ordering::SeqCst);
        x
    }));

    let options = RivuletOptions::builder()
        .max_parallelism(1)
        .input_buffer(2)
        .build();

    let run = tokio::spawn(map(source, options, move |x, _cancel| {
        let gate = Arc::clone(&gate_probe);
        async move {
            let permit = gate.acquire().await.unwrap();
            permit.forget();
            Ok::<_, Fault>(x)
        }
    }));

    // Let the reader run ahead as far as the buffer allows.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let readahead = pulled.load(Ordering::SeqCst);
    // One in flight, two buffered, one stuck in the reader's hand.
    assert!(readahead <= 4, "reader pulled {readahead} items");

    gate.add_permits(100);
    let output = run.await.unwrap().unwrap();
    assert_eq!(output.results.len(), 100);
}

#[tokio::test]
async fn collecting_mode_returns_everything() {
    let options = RivuletOptions::builder()
        .max_parallelism(16)
        .error_mode(ErrorMode::CollectAndContinue)
        .build();
    let output = map(Source::from_iter(0..1000u64), options, |x, _cancel| async move {
        Ok::<_, Fault>(x)
    })
    .await
    .unwrap();
    assert_eq!(output.results.len(), 1000);
}
