//! Progress and metrics samplers.

use rivulet::{map, MetricsConfig, ProgressConfig, ProgressSnapshot, RivuletOptions, Source};
use rivulet_core::fault::Fault;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn progress_snapshots_reach_the_callback() {
    let snapshots: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);

    let options = RivuletOptions::builder()
        .max_parallelism(2)
        .progress(ProgressConfig::new(Duration::from_millis(25), move |snap| {
            sink.lock().unwrap().push(*snap);
            Ok(())
        }))
        .build();

    map(Source::from_iter(0..20u32), options, |x, _cancel| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, Fault>(x)
    })
    .await
    .unwrap();

    let snapshots = snapshots.lock().unwrap();
    assert!(!snapshots.is_empty());

    // Completions are monotone across samples; the final sample (taken
    // at drain) covers the full run with a known total.
    for pair in snapshots.windows(2) {
        assert!(pair[1].completed >= pair[0].completed);
    }
    let last = snapshots.last().unwrap();
    assert_eq!(last.total, Some(20));
    assert_eq!(last.completed, 20);
    assert_eq!(last.percent, Some(1.0));
    assert!(last.rate > 0.0);
}

#[tokio::test(start_paused = true)]
async fn eta_appears_while_the_run_is_in_flight() {
    let saw_eta = Arc::new(Mutex::new(false));
    let probe = Arc::clone(&saw_eta);

    let options = RivuletOptions::builder()
        .max_parallelism(1)
        .progress(ProgressConfig::new(Duration::from_millis(20), move |snap| {
            if snap.eta.is_some() && snap.completed < snap.total.unwrap_or(0) {
                *probe.lock().unwrap() = true;
            }
            Ok(())
        }))
        .build();

    map(Source::from_iter(0..10u32), options, |x, _cancel| async move {
        tokio::time::sleep(Duration::from_millis(15)).await;
        Ok::<_, Fault>(x)
    })
    .await
    .unwrap();

    assert!(*saw_eta.lock().unwrap());
}

#[tokio::test(start_paused = true)]
async fn failing_progress_callback_is_tolerated() {
    let options = RivuletOptions::builder()
        .progress(ProgressConfig::new(Duration::from_millis(10), |_snap| {
            Err("export pipe broken".into())
        }))
        .build();

    let output = map(Source::from_iter(0..10u32), options, |x, _cancel| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, Fault>(x)
    })
    .await
    .unwrap();

    assert_eq!(output.results.len(), 10);
}

#[tokio::test(start_paused = true)]
async fn metrics_sampler_emits_counter_snapshots() {
    let samples = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&samples);

    let options = RivuletOptions::builder()
        .max_parallelism(2)
        .metrics(MetricsConfig::new(Duration::from_millis(20), move |snap| {
            sink.lock().unwrap().push(*snap);
            Ok(())
        }))
        .build();

    map(Source::from_iter(0..30u32), options, |x, _cancel| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, Fault>(x)
    })
    .await
    .unwrap();

    let samples = samples.lock().unwrap();
    assert!(!samples.is_empty());
    assert_eq!(samples.last().unwrap().completed, 30);
}

#[tokio::test(start_paused = true)]
async fn unknown_total_reports_no_percent() {
    let snapshots: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);

    let endless_chunk = futures::stream::iter(0..10u32);
    let options = RivuletOptions::builder()
        .progress(ProgressConfig::new(Duration::from_millis(10), move |snap| {
            sink.lock().unwrap().push(*snap);
            Ok(())
        }))
        .build();

    map(
        Source::from_stream(endless_chunk),
        options,
        |x, _cancel| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, Fault>(x)
        },
    )
    .await
    .unwrap();

    for snap in snapshots.lock().unwrap().iter() {
        assert_eq!(snap.total, None);
        assert_eq!(snap.percent, None);
        assert_eq!(snap.eta, None);
    }
}
