use std::time::Duration;
use thiserror::Error;

/// Returned by [`TokenBucket::try_acquire`](crate::TokenBucket::try_acquire)
/// when the bucket cannot cover the requested cost right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limit exceeded; retry after {retry_after:?}")]
pub struct RateLimitedError {
    /// How long until the requested cost would be covered.
    pub retry_after: Duration,
}
