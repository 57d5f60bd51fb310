//! The retry policy: transience classification plus delay computation.

use crate::backoff::Backoff;
use crate::events::RetryEvent;
use rivulet_core::events::ListenerSet;
use rivulet_core::fault::{AttemptError, FaultTagged};
use std::sync::Arc;
use std::time::Duration;

type Classifier<E> = Arc<dyn Fn(&AttemptError<E>) -> bool + Send + Sync>;

/// Decides whether an error is transient and how long to wait before the
/// next attempt.
///
/// A policy with `max_retries == 0` never retries; errors are still
/// classified so callers can distinguish "permanent" from "would have
/// retried".
pub struct RetryPolicy<E> {
    max_retries: u32,
    base_delay: Duration,
    backoff: Backoff,
    classifier: Option<Classifier<E>>,
    listeners: ListenerSet<RetryEvent>,
    name: String,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            backoff: self.backoff,
            classifier: self.classifier.clone(),
            listeners: self.listeners.clone(),
            name: self.name.clone(),
        }
    }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("name", &self.name)
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("backoff", &self.backoff)
            .field("custom_classifier", &self.classifier.is_some())
            .finish()
    }
}

impl<E> RetryPolicy<E> {
    /// Starts building a policy.
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new()
    }

    /// A policy that never retries and classifies by fault tag only.
    pub fn none() -> Self {
        Self::builder().build()
    }

    /// Maximum additional attempts after the first.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Base delay fed into the backoff formula.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// The configured backoff strategy.
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Policy instance name, used in events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Listeners attached to this policy.
    pub fn listeners(&self) -> &ListenerSet<RetryEvent> {
        &self.listeners
    }

    /// Computes the delay before retry `attempt` (1-indexed); `prev` is
    /// the previously sampled delay.
    pub fn next_delay(&self, attempt: u32, prev: Duration) -> Duration {
        self.backoff.delay(self.base_delay, attempt, prev)
    }
}

impl<E: FaultTagged> RetryPolicy<E> {
    /// Classifies an attempt error as transient or permanent.
    pub fn is_transient(&self, error: &AttemptError<E>) -> bool {
        match &self.classifier {
            Some(f) => !error.is_cancelled() && f(error),
            None => error.default_is_transient(),
        }
    }

    /// True when `error` should be retried after `retries_used` retries
    /// have already been spent.
    pub fn should_retry(&self, error: &AttemptError<E>, retries_used: u32) -> bool {
        retries_used < self.max_retries && self.is_transient(error)
    }
}

/// Builder for [`RetryPolicy`].
///
/// Defaults: no retries, 100ms base delay, exponential backoff,
/// classification by adapter fault tag.
pub struct RetryPolicyBuilder<E> {
    max_retries: u32,
    base_delay: Duration,
    backoff: Backoff,
    classifier: Option<Classifier<E>>,
    listeners: ListenerSet<RetryEvent>,
    name: String,
}

impl<E> RetryPolicyBuilder<E> {
    fn new() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(100),
            backoff: Backoff::Exponential,
            classifier: None,
            listeners: ListenerSet::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the maximum number of retries after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base delay fed into the backoff formula.
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Sets the backoff strategy.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces the default tag-based classifier.
    ///
    /// The predicate sees the full [`AttemptError`], so it can also
    /// override the classification of pipeline refusals such as the
    /// per-item timeout. Cancellation is never retried regardless.
    pub fn is_transient<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AttemptError<E>) -> bool + Send + Sync + 'static,
    {
        self.classifier = Some(Arc::new(predicate));
        self
    }

    /// Sets the policy name used in events.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when a retry is scheduled.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.listeners.attach(move |event| {
            if let RetryEvent::Scheduled { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        });
        self
    }

    /// Registers a callback invoked when retries are exhausted.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.listeners.attach(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        });
        self
    }

    /// Builds the policy.
    pub fn build(self) -> RetryPolicy<E> {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            backoff: self.backoff,
            classifier: self.classifier,
            listeners: self.listeners,
            name: self.name,
        }
    }
}

impl<E> Default for RetryPolicyBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}
