//! The broadcast event hub and hook isolation.

use rivulet::{map, EngineEvent, ErrorMode, RivuletOptions, Source};
use rivulet_core::fault::{Fault, FaultKind};
use std::time::Duration;

#[tokio::test]
async fn run_completed_event_carries_final_counters() {
    let options = RivuletOptions::builder().build();
    let mut events = options.events().subscribe();

    map(Source::from_iter(0..10u32), options, |x, _cancel| async move {
        Ok::<_, Fault>(x)
    })
    .await
    .unwrap();

    let mut completed = None;
    while let Some(event) = events.recv().await {
        if let EngineEvent::RunCompleted { counters } = event {
            completed = Some(counters);
        }
    }
    let counters = completed.expect("run completed event");
    assert_eq!(counters.completed, 10);
}

#[tokio::test]
async fn failing_hooks_never_abort_the_run() {
    let options = RivuletOptions::builder()
        .on_start_item(|_index, _item: &u32| Err("start hook broke".into()))
        .on_complete_item(|_index, _outcome| panic!("complete hook panicked"))
        .build();
    let mut events = options.events().subscribe();

    let output = map(Source::from_iter(0..5u32), options, |x, _cancel| async move {
        Ok::<_, Fault>(x)
    })
    .await
    .unwrap();

    assert_eq!(output.results.len(), 5);

    let mut hook_failures = 0;
    while let Some(event) = events.recv().await {
        if matches!(event, EngineEvent::HookFailed { .. }) {
            hook_failures += 1;
        }
    }
    // Five start-hook errors and five complete-hook panics.
    assert_eq!(hook_failures, 10);
}

#[tokio::test]
async fn on_error_hook_sees_terminal_failures() {
    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&seen);

    let options = RivuletOptions::builder()
        .error_mode(ErrorMode::CollectAndContinue)
        .on_error(move |index, _error| {
            sink.lock().unwrap().push(index);
            Ok(())
        })
        .build();

    map(Source::from_iter(0..6u32), options, |x, _cancel| async move {
        if x % 2 == 1 {
            Err(Fault::new(FaultKind::Deadlock))
        } else {
            Ok(x)
        }
    })
    .await
    .unwrap();

    let mut indices = seen.lock().unwrap().clone();
    indices.sort_unstable();
    assert_eq!(indices, vec![1, 3, 5]);
}

#[tokio::test(start_paused = true)]
async fn slow_collectors_lose_events_not_the_run() {
    let options = RivuletOptions::builder()
        .max_retries(1)
        .base_delay(Duration::from_millis(1))
        .error_mode(ErrorMode::CollectAndContinue)
        .event_capacity(4)
        .build();
    let counters = options.counters();
    // Subscribe but do not read until the run is over.
    let mut events = options.events().subscribe_counted(options.counters());

    map(Source::from_iter(0..50u32), options, |_x, _cancel| async move {
        Err::<u32, _>(Fault::new(FaultKind::Timeout))
    })
    .await
    .unwrap();

    let mut received = 0;
    while events.recv().await.is_some() {
        received += 1;
    }

    assert!(received <= 4);
    assert!(events.dropped() > 0);
    assert_eq!(counters.snapshot().events_dropped, events.dropped());
}
