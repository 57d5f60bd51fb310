//! Periodic progress reporting.

use crate::events::EngineEvent;
use crate::hooks::{guarded_callback, CallbackResult};
use rivulet_core::clock::Clock;
use rivulet_core::counters::Counters;
use rivulet_core::hub::EventHub;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A point-in-time view of the run, handed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProgressSnapshot {
    /// Items whose first attempt has begun.
    pub started: u64,
    /// Items completed successfully.
    pub completed: u64,
    /// Items failed terminally (skips included).
    pub failed: u64,
    /// Expected total, when the source length is known.
    pub total: Option<u64>,
    /// Time since the run began.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub elapsed: Duration,
    /// Completions per second over the whole run.
    pub rate: f64,
    /// Estimated time to completion, when the total is known.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub eta: Option<Duration>,
    /// Fraction complete in `[0, 1]`, when the total is known.
    pub percent: Option<f64>,
}

type ProgressCallback = Arc<dyn Fn(&ProgressSnapshot) -> CallbackResult + Send + Sync>;

/// Configuration for the progress sampler.
pub struct ProgressConfig {
    pub(crate) report_interval: Duration,
    pub(crate) callback: ProgressCallback,
}

impl ProgressConfig {
    /// Reports through `callback` every `report_interval`.
    ///
    /// The callback is fallible; errors and panics are published on the
    /// event hub and never affect the run.
    pub fn new<F>(report_interval: Duration, callback: F) -> Self
    where
        F: Fn(&ProgressSnapshot) -> CallbackResult + Send + Sync + 'static,
    {
        assert!(!report_interval.is_zero(), "report_interval must be > 0");
        Self {
            report_interval,
            callback: Arc::new(callback),
        }
    }
}

impl std::fmt::Debug for ProgressConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressConfig")
            .field("report_interval", &self.report_interval)
            .finish()
    }
}

pub(crate) fn spawn_progress_sampler(
    config: ProgressConfig,
    counters: Arc<Counters>,
    hub: EventHub<EngineEvent>,
    clock: Arc<dyn Clock>,
    total: Option<u64>,
    started_at: Instant,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let stopping = tokio::select! {
                _ = stop.cancelled() => true,
                _ = clock.sleep(config.report_interval) => false,
            };

            let snapshot = build_snapshot(&counters, total, clock.now() - started_at);
            guarded_callback(&hub, "progress", || (config.callback)(&snapshot));

            if stopping {
                break;
            }
        }
    })
}

fn build_snapshot(counters: &Counters, total: Option<u64>, elapsed: Duration) -> ProgressSnapshot {
    let c = counters.snapshot();
    let failed = c.failed + c.skipped;
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        c.completed as f64 / secs
    } else {
        0.0
    };

    let resolved = c.completed + failed;
    let eta = match total {
        Some(total) if rate > 0.0 => {
            let remaining = total.saturating_sub(resolved);
            Some(Duration::from_secs_f64(remaining as f64 / rate))
        }
        _ => None,
    };
    let percent = total.and_then(|total| {
        if total == 0 {
            None
        } else {
            Some((resolved as f64 / total as f64).min(1.0))
        }
    });

    ProgressSnapshot {
        started: c.started,
        completed: c.completed,
        failed,
        total,
        elapsed,
        rate,
        eta,
        percent,
    }
}
