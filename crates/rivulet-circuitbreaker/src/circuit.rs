use crate::config::CircuitBreakerConfig;
use crate::error::CircuitOpenError;
use crate::events::CircuitBreakerEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

/// The state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls are allowed; failures are being counted.
    Closed = 0,
    /// Calls are refused until the open timeout elapses.
    Open = 1,
    /// A limited budget of probe calls is testing recovery.
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

struct CircuitInner {
    state: CircuitState,
    open_until: Option<Instant>,
    consecutive_failures: u32,
    failure_window: VecDeque<Instant>,
    half_open_probes: u32,
    half_open_successes: u32,
}

/// A three-state circuit breaker.
///
/// All methods are synchronous and take `&self`; internal state sits
/// behind a short-lived mutex that is never held across a wait or a
/// listener callback's blocking work (listeners run under the state
/// machine's decisions but must themselves be non-blocking).
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
    state_cell: AtomicU8,
}

impl CircuitBreaker {
    /// Creates a breaker from its config.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                open_until: None,
                consecutive_failures: 0,
                failure_window: VecDeque::new(),
                half_open_probes: 0,
                half_open_successes: 0,
            }),
            state_cell: AtomicU8::new(CircuitState::Closed as u8),
        }
    }

    /// Shorthand for building the config inline.
    pub fn builder() -> crate::config::CircuitBreakerConfigBuilder {
        CircuitBreakerConfig::builder()
    }

    /// The current state, without locking.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_cell.load(Ordering::Acquire))
    }

    /// The breaker's configured name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Asks permission to run one call.
    ///
    /// Closed always permits. Open refuses until the open timeout has
    /// elapsed, at which point the breaker flips to HalfOpen and admits
    /// this call as the first probe. HalfOpen admits calls while probe
    /// budget remains.
    pub fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        let now = self.config.clock.now();
        let mut pending = Vec::new();
        let mut inner = self.inner.lock().expect("circuit breaker poisoned");

        let decision = match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let open_until = inner.open_until.unwrap_or(now);
                if now >= open_until {
                    self.transition(
                        &mut inner,
                        CircuitState::HalfOpen,
                        "open_timeout_elapsed",
                        &mut pending,
                    );
                    inner.half_open_probes = 1;
                    Ok(())
                } else {
                    Err(CircuitOpenError {
                        retry_after: Some(open_until.saturating_duration_since(now)),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_probes < self.config.probe_budget {
                    inner.half_open_probes += 1;
                    Ok(())
                } else {
                    Err(CircuitOpenError { retry_after: None })
                }
            }
        };

        let state = inner.state;
        drop(inner);
        self.notify_all(pending);

        match decision {
            Ok(()) => {
                self.config
                    .listeners
                    .notify(&CircuitBreakerEvent::CallPermitted {
                        name: self.config.name.clone(),
                        timestamp: now,
                        state,
                    });
                Ok(())
            }
            Err(e) => {
                self.config
                    .listeners
                    .notify(&CircuitBreakerEvent::CallRejected {
                        name: self.config.name.clone(),
                        timestamp: now,
                    });

                #[cfg(feature = "metrics")]
                metrics::counter!(
                    "circuitbreaker_calls_rejected_total",
                    "circuitbreaker" => self.config.name.clone()
                )
                .increment(1);

                Err(e)
            }
        }
    }

    /// Records the success of a permitted call.
    pub fn record_success(&self) {
        let now = self.config.clock.now();
        let mut pending = Vec::new();
        let mut inner = self.inner.lock().expect("circuit breaker poisoned");

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    self.transition(
                        &mut inner,
                        CircuitState::Closed,
                        "success_threshold",
                        &mut pending,
                    );
                }
            }
            // A late completion from before the trip; the window already
            // decided.
            CircuitState::Open => {}
        }

        let state = inner.state;
        drop(inner);
        self.notify_all(pending);

        self.config
            .listeners
            .notify(&CircuitBreakerEvent::SuccessRecorded {
                name: self.config.name.clone(),
                timestamp: now,
                state,
            });

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "circuitbreaker_calls_total",
            "circuitbreaker" => self.config.name.clone(),
            "outcome" => "success"
        )
        .increment(1);
    }

    /// Records the failure of a permitted call.
    pub fn record_failure(&self) {
        let now = self.config.clock.now();
        let mut pending = Vec::new();
        let mut inner = self.inner.lock().expect("circuit breaker poisoned");

        match inner.state {
            CircuitState::Closed => match self.config.sampling_duration {
                None => {
                    inner.consecutive_failures += 1;
                    if inner.consecutive_failures >= self.config.failure_threshold {
                        self.trip_open(&mut inner, now, "failure_threshold", &mut pending);
                    }
                }
                Some(window) => {
                    while let Some(&front) = inner.failure_window.front() {
                        if now.saturating_duration_since(front) > window {
                            inner.failure_window.pop_front();
                        } else {
                            break;
                        }
                    }
                    inner.failure_window.push_back(now);
                    if inner.failure_window.len() as u32 >= self.config.failure_threshold {
                        self.trip_open(&mut inner, now, "failure_threshold", &mut pending);
                    }
                }
            },
            CircuitState::HalfOpen => {
                self.trip_open(&mut inner, now, "probe_failed", &mut pending);
            }
            CircuitState::Open => {}
        }

        let state = inner.state;
        drop(inner);
        self.notify_all(pending);

        self.config
            .listeners
            .notify(&CircuitBreakerEvent::FailureRecorded {
                name: self.config.name.clone(),
                timestamp: now,
                state,
            });

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "circuitbreaker_calls_total",
            "circuitbreaker" => self.config.name.clone(),
            "outcome" => "failure"
        )
        .increment(1);
    }

    /// Forces the breaker Open, e.g. for maintenance windows.
    pub fn force_open(&self) {
        let now = self.config.clock.now();
        let mut pending = Vec::new();
        let mut inner = self.inner.lock().expect("circuit breaker poisoned");
        self.trip_open(&mut inner, now, "forced", &mut pending);
        drop(inner);
        self.notify_all(pending);
    }

    /// Resets the breaker to Closed, clearing all accounting.
    pub fn reset(&self) {
        let mut pending = Vec::new();
        let mut inner = self.inner.lock().expect("circuit breaker poisoned");
        self.transition(&mut inner, CircuitState::Closed, "reset", &mut pending);
        drop(inner);
        self.notify_all(pending);
    }

    fn trip_open(
        &self,
        inner: &mut CircuitInner,
        now: Instant,
        reason: &'static str,
        pending: &mut Vec<CircuitBreakerEvent>,
    ) {
        self.transition(inner, CircuitState::Open, reason, pending);
        inner.open_until = Some(now + self.config.open_timeout);
    }

    // Listener notification is deferred to `notify_all` so the state lock is
    // never held across user callbacks.
    fn transition(
        &self,
        inner: &mut CircuitInner,
        to: CircuitState,
        reason: &'static str,
        pending: &mut Vec<CircuitBreakerEvent>,
    ) {
        if inner.state == to {
            return;
        }
        let from = inner.state;

        inner.state = to;
        inner.open_until = None;
        inner.consecutive_failures = 0;
        inner.failure_window.clear();
        inner.half_open_probes = 0;
        inner.half_open_successes = 0;
        self.state_cell.store(to as u8, Ordering::Release);

        pending.push(CircuitBreakerEvent::StateTransition {
            name: self.config.name.clone(),
            timestamp: self.config.clock.now(),
            from,
            to,
            reason,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(
            circuitbreaker = %self.config.name,
            from = from.as_str(),
            to = to.as_str(),
            reason,
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "circuitbreaker_transitions_total",
            "circuitbreaker" => self.config.name.clone(),
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
    }

    fn notify_all(&self, pending: Vec<CircuitBreakerEvent>) {
        for event in pending {
            self.config.listeners.notify(&event);
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .finish()
    }
}
