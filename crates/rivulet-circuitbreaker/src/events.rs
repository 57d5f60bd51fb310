//! Events emitted by the circuit breaker.

use crate::circuit::CircuitState;
use rivulet_core::events::{EventMeta, PipelineEvent};
use tokio::time::Instant;

/// Events describing breaker activity.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The breaker moved between states.
    StateTransition {
        /// Breaker instance name.
        name: String,
        /// When the transition happened.
        timestamp: Instant,
        /// State before the transition.
        from: CircuitState,
        /// State after the transition.
        to: CircuitState,
        /// Why the transition happened.
        reason: &'static str,
    },
    /// A call was allowed through.
    CallPermitted {
        /// Breaker instance name.
        name: String,
        /// When the call was permitted.
        timestamp: Instant,
        /// The state that permitted it.
        state: CircuitState,
    },
    /// A call was refused.
    CallRejected {
        /// Breaker instance name.
        name: String,
        /// When the call was refused.
        timestamp: Instant,
    },
    /// A permitted call completed successfully.
    SuccessRecorded {
        /// Breaker instance name.
        name: String,
        /// When the success was recorded.
        timestamp: Instant,
        /// The state at recording time.
        state: CircuitState,
    },
    /// A permitted call failed.
    FailureRecorded {
        /// Breaker instance name.
        name: String,
        /// When the failure was recorded.
        timestamp: Instant,
        /// The state at recording time.
        state: CircuitState,
    },
}

impl PipelineEvent for CircuitBreakerEvent {
    fn meta(&self) -> EventMeta<'_> {
        let (kind, name, timestamp) = match self {
            CircuitBreakerEvent::StateTransition {
                name, timestamp, ..
            } => ("state_transition", name, timestamp),
            CircuitBreakerEvent::CallPermitted {
                name, timestamp, ..
            } => ("call_permitted", name, timestamp),
            CircuitBreakerEvent::CallRejected { name, timestamp } => {
                ("call_rejected", name, timestamp)
            }
            CircuitBreakerEvent::SuccessRecorded {
                name, timestamp, ..
            } => ("success_recorded", name, timestamp),
            CircuitBreakerEvent::FailureRecorded {
                name, timestamp, ..
            } => ("failure_recorded", name, timestamp),
        };
        EventMeta {
            kind,
            at: *timestamp,
            emitter: name,
        }
    }
}
