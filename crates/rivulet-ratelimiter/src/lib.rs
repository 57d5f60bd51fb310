//! Token-bucket rate limiter for the rivulet pipeline.
//!
//! A [`TokenBucket`] admits work at a sustained `rate` with an initial
//! burst of `burst` tokens. Each attempt acquires a configurable token
//! cost; waiters are admitted strictly in arrival order. The bucket is
//! cheap to share across engine runs through an `Arc`.
//!
//! [`TokenBucket::acquire`] blocks (cooperatively) until tokens are
//! available and is cancel-safe: dropping the future refunds the
//! reservation. [`TokenBucket::try_acquire`] is the non-blocking variant
//! used when the limiter is configured fail-fast.

pub mod bucket;
pub mod config;
pub mod error;

pub use bucket::TokenBucket;
pub use config::{RateLimitConfig, RateLimitConfigBuilder};
pub use error::RateLimitedError;
