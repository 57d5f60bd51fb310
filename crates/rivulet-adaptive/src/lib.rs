//! Adaptive concurrency control for the rivulet engine.
//!
//! An [`AdaptiveController`] owns a dynamic pool of concurrency slots
//! within `[min, max]`. Workers hold one slot per item; the controller
//! records the latency and success of every attempt and, at each sample
//! boundary, raises or lowers the slot target based on the window's p50
//! latency and success rate.
//!
//! Strategies: AIMD (additive increase, halve on pressure), Aggressive
//! (10% multiplicative increase, halve on pressure) and Gradual (additive
//! increase, 25% decrease).
//!
//! Shrinking is lazy: excess slots are absorbed as workers finish their
//! current items, never by interrupting work in flight.

pub mod config;
pub mod controller;
pub mod events;

pub use config::{AdaptationStrategy, AdaptiveConfig, AdaptiveConfigBuilder};
pub use controller::{AdaptiveController, SlotPermit};
pub use events::AdaptiveEvent;
