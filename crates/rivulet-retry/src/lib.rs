//! Retry policy for the rivulet engine.
//!
//! A [`RetryPolicy`] decides whether a failed attempt is transient and how
//! long to wait before the next one. Classification defaults to the
//! adapter fault tag (see `rivulet_core::FaultTagged`); a user predicate
//! can replace it. Delays come from a [`Backoff`] strategy and are clamped
//! to a 24-hour ceiling.
//!
//! ```
//! use rivulet_retry::{Backoff, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy: RetryPolicy<std::io::Error> = RetryPolicy::builder()
//!     .max_retries(3)
//!     .base_delay(Duration::from_millis(50))
//!     .backoff(Backoff::Exponential)
//!     .build();
//! assert_eq!(policy.max_retries(), 3);
//! ```

pub mod backoff;
pub mod events;
pub mod policy;

pub use backoff::{Backoff, MAX_RETRY_DELAY};
pub use events::RetryEvent;
pub use policy::{RetryPolicy, RetryPolicyBuilder};
