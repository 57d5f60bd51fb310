//! Periodic counter export for external metrics systems.

use crate::events::EngineEvent;
use crate::hooks::{guarded_callback, CallbackResult};
use rivulet_core::clock::Clock;
use rivulet_core::counters::{CounterSnapshot, Counters};
use rivulet_core::hub::EventHub;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type MetricsCallback = Arc<dyn Fn(&CounterSnapshot) -> CallbackResult + Send + Sync>;

/// Configuration for the metrics sampler.
///
/// On every `sample_interval` a full [`CounterSnapshot`] is handed to the
/// callback on a dedicated task, for export to Prometheus, OpenTelemetry
/// or anything else. With the `metrics` feature enabled the same snapshot
/// also feeds the `metrics` facade gauges.
pub struct MetricsConfig {
    pub(crate) sample_interval: Duration,
    pub(crate) callback: MetricsCallback,
}

impl MetricsConfig {
    /// Samples every `sample_interval` into `callback`.
    pub fn new<F>(sample_interval: Duration, callback: F) -> Self
    where
        F: Fn(&CounterSnapshot) -> CallbackResult + Send + Sync + 'static,
    {
        assert!(!sample_interval.is_zero(), "sample_interval must be > 0");
        Self {
            sample_interval,
            callback: Arc::new(callback),
        }
    }
}

impl std::fmt::Debug for MetricsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsConfig")
            .field("sample_interval", &self.sample_interval)
            .finish()
    }
}

pub(crate) fn spawn_metrics_sampler(
    config: MetricsConfig,
    counters: Arc<Counters>,
    hub: EventHub<EngineEvent>,
    clock: Arc<dyn Clock>,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let stopping = tokio::select! {
                _ = stop.cancelled() => true,
                _ = clock.sleep(config.sample_interval) => false,
            };

            let snapshot = counters.snapshot();
            export_gauges(&snapshot);
            guarded_callback(&hub, "metrics", || (config.callback)(&snapshot));

            if stopping {
                break;
            }
        }
    })
}

#[allow(unused_variables)]
fn export_gauges(snapshot: &CounterSnapshot) {
    #[cfg(feature = "metrics")]
    {
        metrics::gauge!("rivulet_items_started").set(snapshot.started as f64);
        metrics::gauge!("rivulet_items_completed").set(snapshot.completed as f64);
        metrics::gauge!("rivulet_items_failed").set(snapshot.failed as f64);
        metrics::gauge!("rivulet_items_retried").set(snapshot.retried as f64);
        metrics::gauge!("rivulet_items_skipped").set(snapshot.skipped as f64);
        metrics::gauge!("rivulet_throttle_events").set(snapshot.throttle_events as f64);
        metrics::gauge!("rivulet_drain_events").set(snapshot.drain_events as f64);
    }
}
