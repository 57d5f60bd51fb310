//! Circuit breaker for the rivulet pipeline.
//!
//! The breaker guards the user operation: while Open every call is
//! refused immediately with [`CircuitOpenError`], and after the open
//! timeout a limited budget of half-open probes tests whether the
//! dependency has recovered.
//!
//! Failure accounting has two modes, chosen by configuration: a
//! consecutive-failure counter (reset by any success), or a rolling
//! time window of failures. See [`CircuitBreakerConfig`].
//!
//! Breakers are cheap to share: wrap one in an `Arc` and reference it
//! from any number of engine runs to give them a common view of the
//! downstream dependency.

pub mod circuit;
pub mod config;
pub mod error;
pub mod events;

pub use circuit::{CircuitBreaker, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitOpenError;
pub use events::CircuitBreakerEvent;
