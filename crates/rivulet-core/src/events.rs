//! Panic-isolated event fan-out for the component crates.
//!
//! Components (circuit breaker, retry policy, adaptive controller)
//! publish typed events to the closures a caller attached at
//! configuration time. A [`ListenerSet`] is a plain vector of shared
//! closures: attaching is cheap, cloning a config shares the closures
//! already attached, and a listener that panics is cut off from that
//! one notification without affecting the other listeners or the run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::time::Instant;

/// Identity of one emitted event, used for log and metric labels.
#[derive(Debug, Clone, Copy)]
pub struct EventMeta<'a> {
    /// Short machine-readable label, e.g. `"state_transition"`.
    pub kind: &'static str,
    /// When the event occurred.
    pub at: Instant,
    /// Configured name of the component instance that emitted it.
    pub emitter: &'a str,
}

/// Implemented by every event type a rivulet component publishes.
pub trait PipelineEvent: Send + Sync {
    /// Describes this event for observability surfaces.
    fn meta(&self) -> EventMeta<'_>;
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// The listener closures attached to one component instance.
pub struct ListenerSet<E> {
    listeners: Vec<Listener<E>>,
}

impl<E: PipelineEvent> ListenerSet<E> {
    /// An empty set.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Attaches a closure invoked on every event.
    pub fn attach<F>(&mut self, listener: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Hands the event to every attached closure.
    ///
    /// A panicking listener loses only its own notification; the rest
    /// still run, and the panic is reported through tracing and the
    /// metrics facade when those features are enabled.
    pub fn notify(&self, event: &E) {
        for listener in &self.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                report_panicked_listener(event.meta());
            }
        }
    }

    /// True when nothing is attached.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of attached closures.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: PipelineEvent> Default for ListenerSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for ListenerSet<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E> std::fmt::Debug for ListenerSet<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[allow(unused_variables)]
fn report_panicked_listener(meta: EventMeta<'_>) {
    #[cfg(feature = "tracing")]
    tracing::warn!(
        emitter = meta.emitter,
        kind = meta.kind,
        "rivulet event listener panicked"
    );

    #[cfg(feature = "metrics")]
    metrics::counter!(
        "rivulet_listener_panics_total",
        "emitter" => meta.emitter.to_string(),
        "kind" => meta.kind.to_string()
    )
    .increment(1);
}
