//! The adaptive controller and its slot permits.

use crate::config::{AdaptationStrategy, AdaptiveConfig};
use crate::events::AdaptiveEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

struct Sample {
    at: Instant,
    latency: Duration,
    success: bool,
}

struct SampleWindow {
    samples: VecDeque<Sample>,
    last_eval: Instant,
}

/// Dynamic concurrency controller.
///
/// Create one, wrap it in an `Arc`, and hand it to the engine (or to
/// several engines to share one concurrency budget).
pub struct AdaptiveController {
    config: AdaptiveConfig,
    semaphore: Arc<Semaphore>,
    target: AtomicUsize,
    /// Slots to absorb on release instead of returning to the semaphore.
    deficit: AtomicUsize,
    window: Mutex<SampleWindow>,
}

impl AdaptiveController {
    /// Creates a controller from its config.
    pub fn new(config: AdaptiveConfig) -> Self {
        let now = config.clock.now();
        let initial = config.initial;
        Self {
            semaphore: Arc::new(Semaphore::new(initial)),
            target: AtomicUsize::new(initial),
            deficit: AtomicUsize::new(0),
            window: Mutex::new(SampleWindow {
                samples: VecDeque::new(),
                last_eval: now,
            }),
            config,
        }
    }

    /// Shorthand for building the config inline.
    pub fn builder(min: usize, max: usize) -> crate::config::AdaptiveConfigBuilder {
        AdaptiveConfig::builder(min, max)
    }

    /// The controller's configured name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The current slot target.
    pub fn current_limit(&self) -> usize {
        self.target.load(Ordering::Acquire)
    }

    /// The configured ceiling.
    pub fn max_limit(&self) -> usize {
        self.config.max
    }

    /// Acquires one concurrency slot, waiting until the target allows it.
    ///
    /// The permit is released (or absorbed, when the target has shrunk)
    /// on drop. Cancel-safe: dropping the future before completion
    /// acquires nothing.
    pub async fn acquire_slot(self: &Arc<Self>) -> SlotPermit {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("slot semaphore never closed");
        SlotPermit {
            permit: Some(permit),
            controller: Arc::clone(self),
        }
    }

    /// Records one attempt's latency and outcome, evaluating the window
    /// if a sample boundary has passed.
    pub fn record(&self, latency: Duration, success: bool) {
        let now = self.config.clock.now();
        let change = {
            let mut window = self.window.lock().expect("sample window poisoned");

            window.samples.push_back(Sample {
                at: now,
                latency,
                success,
            });
            let horizon = self.config.sample_interval;
            while let Some(front) = window.samples.front() {
                if now.saturating_duration_since(front.at) > horizon {
                    window.samples.pop_front();
                } else {
                    break;
                }
            }

            if now.saturating_duration_since(window.last_eval) >= self.config.sample_interval {
                self.evaluate(&mut window, now)
            } else {
                None
            }
        };

        // Listener emission happens with the window lock released.
        if let Some((old, new)) = change {
            self.config
                .listeners
                .notify(&AdaptiveEvent::LimitChanged {
                    name: self.config.name.clone(),
                    timestamp: now,
                    old,
                    new,
                });

            #[cfg(feature = "tracing")]
            tracing::debug!(
                controller = %self.config.name,
                old,
                new,
                "concurrency target adjusted"
            );

            #[cfg(feature = "metrics")]
            metrics::gauge!(
                "adaptive_concurrency_limit",
                "controller" => self.config.name.clone()
            )
            .set(new as f64);
        }
    }

    fn evaluate(&self, window: &mut SampleWindow, now: Instant) -> Option<(usize, usize)> {
        window.last_eval = now;
        if window.samples.is_empty() {
            return None;
        }

        let total = window.samples.len();
        let successes = window.samples.iter().filter(|s| s.success).count();
        let success_rate = successes as f64 / total as f64;

        let mut latencies: Vec<Duration> = window.samples.iter().map(|s| s.latency).collect();
        let mid = latencies.len() / 2;
        let (_, p50, _) = latencies.select_nth_unstable(mid);
        let p50 = *p50;

        let old = self.target.load(Ordering::Acquire);
        let healthy =
            success_rate >= self.config.min_success_rate && p50 <= self.config.target_latency;
        let new = if healthy {
            self.increased(old)
        } else {
            self.decreased(old)
        }
        .clamp(self.config.min, self.config.max);

        if new != old {
            self.apply(old, new);
            Some((old, new))
        } else {
            None
        }
    }

    fn increased(&self, target: usize) -> usize {
        match self.config.strategy {
            AdaptationStrategy::Aimd | AdaptationStrategy::Gradual => target + 1,
            AdaptationStrategy::Aggressive => ((target as f64) * 1.10).ceil() as usize,
        }
    }

    fn decreased(&self, target: usize) -> usize {
        let factor = match self.config.strategy {
            AdaptationStrategy::Aimd | AdaptationStrategy::Aggressive => 0.5,
            AdaptationStrategy::Gradual => 0.75,
        };
        ((target as f64) * factor).floor() as usize
    }

    fn apply(&self, old: usize, new: usize) {
        self.target.store(new, Ordering::Release);
        if new > old {
            let mut grow = new - old;
            // Growth first cancels any outstanding shrink debt.
            loop {
                let owed = self.deficit.load(Ordering::Acquire);
                if owed == 0 || grow == 0 {
                    break;
                }
                let settle = owed.min(grow);
                if self
                    .deficit
                    .compare_exchange(owed, owed - settle, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    grow -= settle;
                }
            }
            if grow > 0 {
                self.semaphore.add_permits(grow);
            }
        } else {
            self.deficit.fetch_add(old - new, Ordering::AcqRel);
        }
    }

    /// Returns true when a released permit should be absorbed rather
    /// than returned.
    fn absorb_one(&self) -> bool {
        let mut owed = self.deficit.load(Ordering::Acquire);
        loop {
            if owed == 0 {
                return false;
            }
            match self.deficit.compare_exchange(
                owed,
                owed - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(current) => owed = current,
            }
        }
    }
}

impl std::fmt::Debug for AdaptiveController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveController")
            .field("name", &self.config.name)
            .field("target", &self.current_limit())
            .field("min", &self.config.min)
            .field("max", &self.config.max)
            .finish()
    }
}

/// One concurrency slot, held for the duration of an item.
pub struct SlotPermit {
    permit: Option<OwnedSemaphorePermit>,
    controller: Arc<AdaptiveController>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            if self.controller.absorb_one() {
                permit.forget();
            }
        }
    }
}

impl std::fmt::Debug for SlotPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotPermit").finish()
    }
}
