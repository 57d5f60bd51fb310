//! Core infrastructure shared by the rivulet operator crates.
//!
//! This crate provides the pieces every other rivulet crate builds on:
//! - A monotonic [`Clock`] abstraction with a cancellable delay, swappable
//!   for virtual time in tests
//! - Lock-free run [`Counters`] and point-in-time [`CounterSnapshot`]s
//! - Panic-isolated listener fan-out ([`ListenerSet`]) and the
//!   multi-consumer broadcast [`EventHub`]
//! - The adapter fault taxonomy ([`FaultKind`], [`FaultTagged`]) used to
//!   classify transient errors by tag rather than by concrete type

pub mod clock;
pub mod counters;
pub mod events;
pub mod fault;
pub mod hub;

pub use clock::{Clock, TokioClock};
pub use counters::{CounterSnapshot, Counters};
pub use events::{EventMeta, ListenerSet, PipelineEvent};
pub use fault::{AttemptError, Fault, FaultKind, FaultTagged};
pub use hub::{EventHub, EventStream};
