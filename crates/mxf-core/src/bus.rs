// C1 Event Bus: an in-process typed dispatcher (§4.1).
//
// Delivery is synchronous to subscribers that share the dispatch thread,
// and ordered per event name (subscribers fire in subscription order).
// Handlers must not block the dispatcher — they are plain synchronous
// closures; long work is expected to be posted to the owning component's
// own queue rather than performed inline. A panicking or erroring
// handler never prevents delivery to the remaining subscribers; the
// failure is caught and re-published as an `on_handler_error` meta-event
// after the current dispatch completes.

use crate::events::LoopEvent;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub type Filter = Box<dyn Fn(&LoopEvent) -> bool + Send + Sync>;
pub type Handler = Box<dyn Fn(&LoopEvent) + Send + Sync>;

/// An opaque handle returned by `subscribe`, used to `unsubscribe` later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
}

struct Entry {
    id: u64,
    filter: Option<Filter>,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<&'static str, Vec<Entry>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `event_name`, with an optional filter
    /// predicate (e.g. "`channelId == X`"). Returns a handle usable with
    /// `unsubscribe`.
    pub fn subscribe(
        &self,
        event_name: &'static str,
        filter: Option<Filter>,
        handler: Handler,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .lock()
            .expect("event bus mutex poisoned")
            .entry(event_name)
            .or_default()
            .push(Entry { id, filter, handler });
        Subscription { id }
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        let mut subscribers = self.subscribers.lock().expect("event bus mutex poisoned");
        for entries in subscribers.values_mut() {
            entries.retain(|e| e.id != subscription.id);
        }
    }

    /// Dispatches `event` synchronously to every matching subscriber of
    /// `event.name()`, in subscription order. A subscriber whose handler
    /// panics or whose filter panics is isolated: delivery continues to
    /// the rest, and one `on_handler_error` event per failure is returned
    /// for the caller to re-publish (re-entrant publish from inside
    /// `publish` itself would violate per-event-name ordering).
    pub fn publish(&self, event: LoopEvent) -> Vec<LoopEvent> {
        let name = event.name();
        let mut handler_errors = Vec::new();

        let subscribers = self.subscribers.lock().expect("event bus mutex poisoned");
        if let Some(entries) = subscribers.get(name) {
            for entry in entries {
                let matches = entry
                    .filter
                    .as_ref()
                    .map(|f| catch_unwind(AssertUnwindSafe(|| f(&event))).unwrap_or(false))
                    .unwrap_or(true);
                if !matches {
                    continue;
                }
                let result = catch_unwind(AssertUnwindSafe(|| (entry.handler)(&event)));
                if result.is_err() {
                    tracing::error!(event_name = name, "event bus subscriber panicked");
                    handler_errors.push(LoopEvent::handler_error(name, "subscriber panicked"));
                }
            }
        }
        handler_errors
    }

    /// Dispatches `event` and immediately re-publishes any resulting
    /// `on_handler_error` meta-events (as `on_handler_error` subscribers,
    /// if any, expect to actually receive them).
    pub fn publish_and_propagate_errors(&self, event: LoopEvent) {
        for err in self.publish(event) {
            self.publish(err);
        }
    }

    pub fn subscriber_count(&self, event_name: &str) -> usize {
        self.subscribers
            .lock()
            .expect("event bus mutex poisoned")
            .get(event_name)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn delivers_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        bus.subscribe("loop_started", None, Box::new(move |_| o1.lock().unwrap().push(1)));
        let o2 = order.clone();
        bus.subscribe("loop_started", None, Box::new(move |_| o2.lock().unwrap().push(2)));

        bus.publish(LoopEvent::loop_started("agent-1"));
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn filter_excludes_non_matching_events() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bus.subscribe(
            "iteration_started",
            Some(Box::new(|e: &LoopEvent| matches!(e, LoopEvent::IterationStarted { iteration, .. } if *iteration == 2))),
            Box::new(move |_| { c.fetch_add(1, Ordering::SeqCst); }),
        );

        bus.publish(LoopEvent::iteration_started("agent-1", 1));
        bus.publish(LoopEvent::iteration_started("agent-1", 2));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_does_not_block_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.subscribe("loop_started", None, Box::new(|_| panic!("boom")));
        let c = count.clone();
        bus.subscribe("loop_started", None, Box::new(move |_| { c.fetch_add(1, Ordering::SeqCst); }));

        let errors = bus.publish(LoopEvent::loop_started("agent-1"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LoopEvent::HandlerError { .. }));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = bus.subscribe("loop_started", None, Box::new(move |_| { c.fetch_add(1, Ordering::SeqCst); }));

        bus.publish(LoopEvent::loop_started("agent-1"));
        bus.unsubscribe(sub);
        bus.publish(LoopEvent::loop_started("agent-1"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
