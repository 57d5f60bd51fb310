//! Lifecycle hooks and panic-isolated callback invocation.

use crate::events::EngineEvent;
use crate::outcome::Outcome;
use rivulet_core::fault::AttemptError;
use rivulet_core::hub::EventHub;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// The result type every user hook and sampler callback returns.
pub type CallbackResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type StartHook<T> = Arc<dyn Fn(u64, &T) -> CallbackResult + Send + Sync>;
type CompleteHook<R, E> = Arc<dyn Fn(u64, &Outcome<R, E>) -> CallbackResult + Send + Sync>;
type ErrorHook<E> = Arc<dyn Fn(u64, &AttemptError<E>) -> CallbackResult + Send + Sync>;

/// The optional per-item lifecycle hooks.
pub(crate) struct Hooks<T, R, E> {
    pub(crate) on_start_item: Option<StartHook<T>>,
    pub(crate) on_complete_item: Option<CompleteHook<R, E>>,
    pub(crate) on_error: Option<ErrorHook<E>>,
}

impl<T, R, E> Default for Hooks<T, R, E> {
    fn default() -> Self {
        Self {
            on_start_item: None,
            on_complete_item: None,
            on_error: None,
        }
    }
}

impl<T, R, E> Clone for Hooks<T, R, E> {
    fn clone(&self) -> Self {
        Self {
            on_start_item: self.on_start_item.clone(),
            on_complete_item: self.on_complete_item.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T, R, E> Hooks<T, R, E> {
    pub(crate) fn start_item(&self, hub: &EventHub<EngineEvent>, index: u64, payload: &T) {
        if let Some(hook) = &self.on_start_item {
            guarded_hook(hub, "on_start_item", Some(index), || hook(index, payload));
        }
    }

    pub(crate) fn complete_item(
        &self,
        hub: &EventHub<EngineEvent>,
        index: u64,
        outcome: &Outcome<R, E>,
    ) {
        if let Some(hook) = &self.on_complete_item {
            guarded_hook(hub, "on_complete_item", Some(index), || {
                hook(index, outcome)
            });
        }
    }

    pub(crate) fn error(&self, hub: &EventHub<EngineEvent>, index: u64, error: &AttemptError<E>) {
        if let Some(hook) = &self.on_error {
            guarded_hook(hub, "on_error", Some(index), || hook(index, error));
        }
    }
}

/// Runs a user hook, capturing errors and panics onto the event hub.
fn guarded_hook<F>(hub: &EventHub<EngineEvent>, hook: &'static str, index: Option<u64>, f: F)
where
    F: FnOnce() -> CallbackResult,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::warn!(hook, ?index, %error, "lifecycle hook failed");
            hub.publish(EngineEvent::HookFailed {
                hook,
                index,
                message: error.to_string(),
            });
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!(hook, ?index, message, "lifecycle hook panicked");
            hub.publish(EngineEvent::HookFailed {
                hook,
                index,
                message: message.to_string(),
            });
        }
    }
}

/// Runs a sampler callback, capturing errors and panics onto the hub.
pub(crate) fn guarded_callback<F>(hub: &EventHub<EngineEvent>, sampler: &'static str, f: F)
where
    F: FnOnce() -> CallbackResult,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::warn!(sampler, %error, "sampler callback failed");
            hub.publish(EngineEvent::CallbackFailed {
                sampler,
                message: error.to_string(),
            });
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!(sampler, message, "sampler callback panicked");
            hub.publish(EngineEvent::CallbackFailed {
                sampler,
                message: message.to_string(),
            });
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
