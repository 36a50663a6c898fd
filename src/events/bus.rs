use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Emitted by the data manager after every save and load
pub const DATA_OPERATION_COMPLETE: &str = "data_operation_complete";

/// Error a handler may return; logged, never propagated
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Subscriber callback
pub type EventHandler = Arc<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

/// An emitted event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

/// Statistics for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusStats {
    /// Handlers across all event types
    pub handler_count: usize,
    /// Events emitted (lifetime)
    pub total_emitted: u64,
    /// Handler invocations that returned an error or panicked
    pub handler_failures: u64,
    pub event_types: Vec<String>,
}

/// Synchronous in-process publish/subscribe
///
/// Handlers run on the emitting thread, in subscription order. A handler
/// that errors or panics is logged and skipped; the emitter never sees it.
pub struct EventBus {
    handlers: RwLock<HashMap<String, Vec<EventHandler>>>,
    total_emitted: AtomicU64,
    handler_failures: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            total_emitted: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
        }
    }

    pub fn subscribe<F>(&self, event_type: impl Into<String>, handler: F)
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let mut handlers = self.handlers.write();
        let list = handlers.entry(event_type.clone()).or_default();
        list.push(Arc::new(handler));

        tracing::debug!("Subscribed handler #{} to '{}'", list.len(), event_type);
    }

    /// Invoke every handler registered for `event_type`. Returns how many succeeded.
    pub fn emit(&self, event_type: &str, payload: serde_json::Value) -> usize {
        // handlers run without the lock so they may subscribe or emit themselves
        let handlers: Vec<EventHandler> = match self.handlers.read().get(event_type) {
            Some(list) => list.clone(),
            None => Vec::new(),
        };

        self.total_emitted.fetch_add(1, Ordering::Relaxed);
        if handlers.is_empty() {
            return 0;
        }

        let event = Event {
            event_type: event_type.to_string(),
            payload,
            emitted_at: Utc::now(),
        };

        let mut delivered = 0;
        for (index, handler) in handlers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    self.handler_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Handler #{} for '{}' failed: {}", index + 1, event_type, e);
                }
                Err(panic) => {
                    self.handler_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        "Handler #{} for '{}' panicked: {}",
                        index + 1,
                        event_type,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        delivered
    }

    pub fn handler_count(&self, event_type: &str) -> usize {
        self.handlers.read().get(event_type).map_or(0, Vec::len)
    }

    /// Event types with at least one handler, sorted
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .handlers
            .read()
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        types.sort();
        types
    }

    pub fn stats(&self) -> EventBusStats {
        let handlers = self.handlers.read();
        EventBusStats {
            handler_count: handlers.values().map(Vec::len).sum(),
            total_emitted: self.total_emitted.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            event_types: {
                let mut types: Vec<String> = handlers.keys().cloned().collect();
                types.sort();
                types
            },
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in 1..=3 {
            let seen = Arc::clone(&seen);
            bus.subscribe("tick", move |event| {
                seen.lock().push((id, event.payload["price"].as_f64()));
                Ok(())
            });
        }

        let delivered = bus.emit("tick", json!({"price": 10.5}));
        assert_eq!(delivered, 3);
        assert_eq!(
            *seen.lock(),
            vec![(1, Some(10.5)), (2, Some(10.5)), (3, Some(10.5))]
        );
    }

    #[test]
    fn test_emit_without_handlers() {
        let bus = EventBus::new();
        assert_eq!(bus.emit("nobody_listens", json!(null)), 0);
        assert_eq!(bus.stats().total_emitted, 1);
    }

    #[test]
    fn test_failing_and_panicking_handlers_are_isolated() {
        let bus = EventBus::new();
        let reached = Arc::new(Mutex::new(false));

        bus.subscribe(DATA_OPERATION_COMPLETE, |_| Err("monitoring offline".into()));
        bus.subscribe(DATA_OPERATION_COMPLETE, |_| panic!("handler bug"));
        {
            let reached = Arc::clone(&reached);
            bus.subscribe(DATA_OPERATION_COMPLETE, move |_| {
                *reached.lock() = true;
                Ok(())
            });
        }

        let delivered = bus.emit(DATA_OPERATION_COMPLETE, json!({"success": true}));
        assert_eq!(delivered, 1);
        assert!(*reached.lock());
        assert_eq!(bus.stats().handler_failures, 2);
    }

    #[test]
    fn test_handler_may_emit_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(Mutex::new(0));

        {
            let count = Arc::clone(&count);
            bus.subscribe("inner", move |_| {
                *count.lock() += 1;
                Ok(())
            });
        }
        {
            let inner_bus = Arc::clone(&bus);
            bus.subscribe("outer", move |_| {
                inner_bus.emit("inner", json!({}));
                Ok(())
            });
        }

        assert_eq!(bus.emit("outer", json!({})), 1);
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_handler_count_and_event_types() {
        let bus = EventBus::new();
        bus.subscribe("b", |_| Ok(()));
        bus.subscribe("a", |_| Ok(()));
        bus.subscribe("a", |_| Ok(()));

        assert_eq!(bus.handler_count("a"), 2);
        assert_eq!(bus.handler_count("c"), 0);
        assert_eq!(bus.event_types(), vec!["a", "b"]);
        assert_eq!(bus.stats().handler_count, 3);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
