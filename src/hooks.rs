//! Before/after hook dispatch around lifecycle operations.
//!
//! Other subsystems register handlers under event names like
//! `before_restart` and can veto the operation by returning an error.
//! The coordinator only depends on the zero/nonzero result of
//! [`EventHooks::trigger`]; it never inspects handler internals.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Handler = Arc<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct EventHooks {
    handlers: Mutex<HashMap<String, Vec<Handler>>>,
    last_error: Mutex<Option<String>>,
}

impl EventHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event. Handlers run in registration order
    /// and receive the service name the operation targets.
    pub fn register<F>(&self, event: &str, handler: F)
    where
        F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap()
            .entry(event.to_string())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Fire an event. Returns 0 when every handler approved; the first
    /// failing handler stops dispatch and its message is kept for
    /// [`EventHooks::last_error`].
    pub fn trigger(&self, event: &str, service: &str) -> i32 {
        let handlers: Vec<Handler> = self
            .handlers
            .lock()
            .unwrap()
            .get(event)
            .cloned()
            .unwrap_or_default();

        for handler in handlers {
            if let Err(err) = handler(service) {
                tracing::debug!("hook {} vetoed for {}: {:#}", event, service, err);
                *self.last_error.lock().unwrap() = Some(format!("{:#}", err));
                return 1;
            }
        }

        0
    }

    /// Message of the most recent veto, if any. Consumed by the
    /// coordinator to build its diagnostics.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }
}
