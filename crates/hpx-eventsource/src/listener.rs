//! Listener registry: one handler per event name plus one error handler.
//!
//! Registration and lookup may happen from different threads. Handlers are
//! cloned out of the lock before they run, so a handler may itself register or
//! remove listeners without deadlocking.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{DecodeError, StreamError};

/// Handler for decoded payloads. Returning `Err` reports a dispatch error
/// instead of a successful dispatch.
pub(crate) type DecodedHandler = Arc<dyn Fn(Value) -> Result<(), DecodeError> + Send + Sync>;

/// Handler for undecoded payloads.
pub(crate) type RawHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Handler for [`StreamError`]s.
pub(crate) type ErrorHandler = Arc<dyn Fn(StreamError) + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Listener {
    /// Payload goes through the client's decoder first.
    Decoded(DecodedHandler),
    /// Payload is delivered as-is.
    Raw(RawHandler),
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: RwLock<HashMap<String, Listener>>,
    error_handler: RwLock<Option<ErrorHandler>>,
}

impl ListenerRegistry {
    /// Register a listener, replacing any previous one for the same name.
    ///
    /// Returns `true` if a listener was replaced.
    pub(crate) fn insert(&self, event_name: &str, listener: Listener) -> bool {
        self.listeners
            .write()
            .insert(event_name.to_string(), listener)
            .is_some()
    }

    pub(crate) fn remove(&self, event_name: &str) -> bool {
        self.listeners.write().remove(event_name).is_some()
    }

    pub(crate) fn get(&self, event_name: &str) -> Option<Listener> {
        self.listeners.read().get(event_name).cloned()
    }

    pub(crate) fn contains(&self, event_name: &str) -> bool {
        self.listeners.read().contains_key(event_name)
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub(crate) fn set_error_handler(&self, handler: ErrorHandler) -> bool {
        self.error_handler.write().replace(handler).is_some()
    }

    pub(crate) fn error_handler(&self) -> Option<ErrorHandler> {
        self.error_handler.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ConnectionError;

    fn counting_raw(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = Arc::clone(counter);
        Listener::Raw(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn invoke(listener: Listener) {
        match listener {
            Listener::Raw(handler) => handler(String::new()),
            Listener::Decoded(handler) => handler(Value::Null).expect("handler ok"),
        }
    }

    #[test]
    fn test_insert_overwrites() {
        let registry = ListenerRegistry::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        assert!(!registry.insert("notify", counting_raw(&first)));
        assert!(registry.insert("notify", counting_raw(&second)));
        assert_eq!(registry.len(), 1);

        invoke(registry.get("notify").expect("listener"));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_missing() {
        let registry = ListenerRegistry::default();
        assert!(registry.get("missing").is_none());
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn test_remove() {
        let registry = ListenerRegistry::default();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.insert("tick", counting_raw(&counter));

        assert!(registry.remove("tick"));
        assert!(!registry.remove("tick"));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_error_handler_overwrites() {
        let registry = ListenerRegistry::default();
        assert!(registry.error_handler().is_none());

        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&first);
        assert!(!registry.set_error_handler(Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })));
        let c = Arc::clone(&second);
        assert!(registry.set_error_handler(Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })));

        let handler = registry.error_handler().expect("handler");
        handler(StreamError::from(ConnectionError::stream_ended()));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_can_register_during_invocation() {
        let registry = Arc::new(ListenerRegistry::default());
        let inner = Arc::clone(&registry);
        registry.insert(
            "outer",
            Listener::Raw(Arc::new(move |_| {
                inner.insert("added", Listener::Raw(Arc::new(|_| {})));
            })),
        );

        invoke(registry.get("outer").expect("listener"));
        assert!(registry.contains("added"));
    }
}
