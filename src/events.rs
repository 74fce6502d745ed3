//! Observer registry for the proxy's `listening` and `error` events.

use std::sync::{Arc, Mutex};

use crate::error::ServerError;

pub type ListeningCallback = Arc<dyn Fn(u16) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&ServerError) + Send + Sync>;

/// Ordered subscriber lists, one per event kind.
///
/// Emission is synchronous and follows subscription order. Subscribers are
/// snapshotted before they run, so a callback may subscribe further
/// callbacks; those only see later events.
#[derive(Default)]
pub struct EventRegistry {
    listening: Mutex<Vec<ListeningCallback>>,
    error: Mutex<Vec<ErrorCallback>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_listening(&self, callback: ListeningCallback) {
        lock(&self.listening).push(callback);
    }

    pub fn on_error(&self, callback: ErrorCallback) {
        lock(&self.error).push(callback);
    }

    pub fn emit_listening(&self, port: u16) {
        let subscribers = lock(&self.listening).clone();
        tracing::debug!(port, subscribers = subscribers.len(), "Emitting listening event");
        for callback in subscribers {
            callback(port);
        }
    }

    pub fn emit_error(&self, error: &ServerError) {
        let subscribers = lock(&self.error).clone();
        if subscribers.is_empty() {
            tracing::warn!(error = %error, "Error event emitted with no subscribers");
        }
        for callback in subscribers {
            callback(error);
        }
    }
}

/// Lock `m`, ignoring poisoning. Every guarded value in this crate stays
/// consistent if a holder panics.
pub(crate) fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
