//! Event bus: subscriber registry and synchronous publishing.
//!
//! Subscribers register for one event kind, or for every kind via
//! [`EventBus::subscribe_all`]. Publishing calls each matching subscriber in
//! registration order, on the caller's task, before returning.
//!
//! Every invocation is isolated. A handler that returns `Err` or panics is
//! logged and counted; the remaining subscribers still run. Publishing works
//! on a snapshot of the registry, so handlers may subscribe or unsubscribe
//! (themselves included) while an event is being delivered.
//!
//! Handlers run inline with the read loop. Anything slow should be handed to
//! a spawned task.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use beacon_core::NotificationEvent;

use crate::errors::HandlerError;

/// A subscriber callback.
pub trait EventHandler: Send + Sync {
    /// Handle one event. Errors are logged by the bus and otherwise ignored.
    fn handle(&self, event: &NotificationEvent) -> Result<(), HandlerError>;
}

impl<F> EventHandler for F
where
    F: Fn(&NotificationEvent) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, event: &NotificationEvent) -> Result<(), HandlerError> {
        self(event)
    }
}

/// Outcome of one [`EventBus::publish`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers that returned `Ok`.
    pub delivered: usize,
    /// Handlers that returned `Err` or panicked.
    pub failed: usize,
}

struct Entry {
    id: u64,
    /// `None` subscribes to every kind.
    kind: Option<String>,
    handler: Arc<dyn EventHandler>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<Entry>,
}

/// Subscriber registry. Clones share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events whose discriminant equals `kind`.
    pub fn subscribe<F>(&self, kind: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&NotificationEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.insert(Some(kind.into()), Arc::new(handler))
    }

    /// Register `handler` for every event, including kinds no one else handles.
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&NotificationEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.insert(None, Arc::new(handler))
    }

    /// Register a shared handler object. `kind: None` subscribes to every kind.
    pub fn subscribe_handler(
        &self,
        kind: Option<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Subscription {
        self.insert(kind, handler)
    }

    fn insert(&self, kind: Option<String>, handler: Arc<dyn EventHandler>) -> Subscription {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        debug!(id, kind = kind.as_deref().unwrap_or("*"), "subscriber registered");
        registry.entries.push(Entry { id, kind, handler });
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every matching subscriber, in registration order.
    pub fn publish(&self, event: &NotificationEvent) -> PublishReport {
        let snapshot: Vec<(u64, Arc<dyn EventHandler>)> = {
            let registry = self.registry.lock();
            registry
                .entries
                .iter()
                .filter(|entry| entry.kind.as_deref().is_none_or(|k| k == event.kind))
                .map(|entry| (entry.id, Arc::clone(&entry.handler)))
                .collect()
        };

        if snapshot.is_empty() {
            debug!(kind = %event.kind, "no subscribers for event");
        }

        let mut report = PublishReport::default();
        for (id, handler) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(subscriber = id, kind = %event.kind, error = %e, "subscriber failed");
                }
                Err(payload) => {
                    report.failed += 1;
                    warn!(
                        subscriber = id,
                        kind = %event.kind,
                        panic = panic_message(payload.as_ref()),
                        "subscriber panicked"
                    );
                }
            }
        }
        report
    }

    /// Number of subscribers that would receive an event of `kind`.
    pub fn subscriber_count(&self, kind: &str) -> usize {
        self.registry
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.kind.as_deref().is_none_or(|k| k == kind))
            .count()
    }

    /// Total number of registered subscribers.
    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    /// Whether no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.len())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Handle returned by subscribe calls.
///
/// Dropping it keeps the subscription; call [`unsubscribe`](Self::unsubscribe)
/// to remove it.
#[derive(Debug)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove this subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.lock();
        let before = registry.entries.len();
        registry.entries.retain(|entry| entry.id != self.id);
        let removed = registry.entries.len() < before;
        if removed {
            debug!(id = self.id, "subscriber removed");
        }
        removed
    }

    /// Registry id of this subscriber.
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: &str) -> NotificationEvent {
        NotificationEvent::new(kind, json!({ "type": kind }))
    }

    #[test]
    fn delivers_only_to_matching_kind() {
        let bus = EventBus::new();
        let log: Arc<Mutex<Vec<String>>> = Arc::default();

        let a = Arc::clone(&log);
        let _sub_a = bus.subscribe("a", move |e: &NotificationEvent| {
            a.lock().push(format!("a:{}", e.kind));
            Ok(())
        });
        let b = Arc::clone(&log);
        let _sub_b = bus.subscribe("b", move |e: &NotificationEvent| {
            b.lock().push(format!("b:{}", e.kind));
            Ok(())
        });

        let report = bus.publish(&event("a"));
        assert_eq!(report, PublishReport { delivered: 1, failed: 0 });
        assert_eq!(*log.lock(), vec!["a:a"]);
    }

    #[test]
    fn registration_order_is_delivery_order() {
        let bus = EventBus::new();
        let log: Arc<Mutex<Vec<String>>> = Arc::default();
        let mut subs = Vec::new();
        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            subs.push(bus.subscribe("x", move |_: &NotificationEvent| {
                log.lock().push(name.to_string());
                Ok(())
            }));
        }

        let _ = bus.publish(&event("x"));
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn failing_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let log: Arc<Mutex<Vec<String>>> = Arc::default();

        let _bad = bus.subscribe("x", |_: &NotificationEvent| Err("boom".into()));
        let good = Arc::clone(&log);
        let _good = bus.subscribe("x", move |e: &NotificationEvent| {
            good.lock().push(e.kind.clone());
            Ok(())
        });

        let report = bus.publish(&event("x"));
        assert_eq!(report, PublishReport { delivered: 1, failed: 1 });
        assert_eq!(*log.lock(), vec!["x"]);
    }

    #[test]
    fn panicking_subscriber_is_isolated() {
        let bus = EventBus::new();
        let log: Arc<Mutex<Vec<String>>> = Arc::default();

        let _bad = bus.subscribe("x", |_: &NotificationEvent| -> Result<(), HandlerError> {
            panic!("subscriber exploded")
        });
        let good = Arc::clone(&log);
        let _good = bus.subscribe("x", move |e: &NotificationEvent| {
            good.lock().push(e.kind.clone());
            Ok(())
        });

        let report = bus.publish(&event("x"));
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(*log.lock(), vec!["x"]);
    }

    #[test]
    fn subscribe_all_sees_unknown_kinds() {
        let bus = EventBus::new();
        let log: Arc<Mutex<Vec<String>>> = Arc::default();
        let raw = Arc::clone(&log);
        let _all = bus.subscribe_all(move |e: &NotificationEvent| {
            raw.lock().push(e.kind.clone());
            Ok(())
        });

        let _ = bus.publish(&event("never_heard_of_it"));
        let _ = bus.publish(&event("chat_status_update"));
        assert_eq!(*log.lock(), vec!["never_heard_of_it", "chat_status_update"]);
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl EventHandler for Recorder {
        fn handle(&self, event: &NotificationEvent) -> Result<(), HandlerError> {
            self.log.lock().push(format!("{}:{}", self.name, event.kind));
            Ok(())
        }
    }

    #[test]
    fn handler_objects_interleave_with_closures() {
        let bus = EventBus::new();
        let log: Arc<Mutex<Vec<String>>> = Arc::default();
        let recorder = |name| -> Arc<dyn EventHandler> {
            Arc::new(Recorder {
                name,
                log: Arc::clone(&log),
            })
        };

        let _typed = bus.subscribe_handler(Some("x".to_string()), recorder("typed"));
        let closure_log = Arc::clone(&log);
        let _closure = bus.subscribe("x", move |e: &NotificationEvent| {
            closure_log.lock().push(format!("closure:{}", e.kind));
            Ok(())
        });
        let everything = bus.subscribe_handler(None, recorder("all"));

        assert_eq!(bus.subscriber_count("x"), 3);
        assert_eq!(bus.subscriber_count("y"), 1);

        let _ = bus.publish(&event("x"));
        let _ = bus.publish(&event("y"));
        assert_eq!(*log.lock(), vec!["typed:x", "closure:x", "all:x", "all:y"]);

        assert!(everything.unsubscribe());
        let report = bus.publish(&event("y"));
        assert_eq!(report, PublishReport::default());
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(&event("x")), PublishReport::default());
    }

    #[test]
    fn unsubscribe_removes_only_that_subscriber() {
        let bus = EventBus::new();
        let first = bus.subscribe("x", |_: &NotificationEvent| Ok(()));
        let _second = bus.subscribe("x", |_: &NotificationEvent| Ok(()));
        assert_eq!(bus.subscriber_count("x"), 2);

        assert!(first.unsubscribe());
        assert_eq!(bus.subscriber_count("x"), 1);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn unsubscribe_during_publish_is_safe() {
        let bus = EventBus::new();
        let log: Arc<Mutex<Vec<String>>> = Arc::default();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let own = Arc::clone(&slot);
        let once = Arc::clone(&log);
        let sub = bus.subscribe("x", move |_: &NotificationEvent| {
            once.lock().push("once".to_string());
            if let Some(sub) = own.lock().take() {
                let _ = sub.unsubscribe();
            }
            Ok(())
        });
        *slot.lock() = Some(sub);

        let after = Arc::clone(&log);
        let _after = bus.subscribe("x", move |_: &NotificationEvent| {
            after.lock().push("after".to_string());
            Ok(())
        });

        let first = bus.publish(&event("x"));
        assert_eq!(first.delivered, 2);
        let second = bus.publish(&event("x"));
        assert_eq!(second.delivered, 1);
        assert_eq!(*log.lock(), vec!["once", "after", "after"]);
    }

    #[test]
    fn unsubscribe_after_bus_dropped() {
        let bus = EventBus::new();
        let sub = bus.subscribe("x", |_: &NotificationEvent| Ok(()));
        drop(bus);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn clones_share_registry() {
        let bus = EventBus::new();
        let view = bus.clone();
        let _sub = bus.subscribe_all(|_: &NotificationEvent| Ok(()));
        assert_eq!(view.len(), 1);
        assert!(!view.is_empty());
    }
}
