// A per-channel filtered view over wire `Envelope` traffic (§9 design
// note: "a lightweight, per-channel filtered view over the Event Bus
// exposing only whitelisted public events").
//
// `mxf_core::bus::EventBus` is hard-typed to the in-process `LoopEvent`
// enum (agent-loop telemetry), so it cannot carry wire `Envelope`
// frames without losing type honesty. `ChannelEventBus` mirrors its
// exact dispatch idiom — synchronous delivery, ordered per event name,
// panic-isolated subscribers — generalized to `Envelope` instead, which
// is what a channel's inbound traffic (`task:assigned`,
// `message:channel_message`, `agent:status_change`, ...) actually is.
// `ChannelMonitor` is the whitelist-enforcing subscription surface
// built on top of it; the spec's two divergent source implementations
// collapse into this one contract.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use mxf_contracts::envelope::{event_names, Envelope};

pub type Filter = Box<dyn Fn(&Envelope) -> bool + Send + Sync>;
pub type Handler = Box<dyn Fn(&Envelope) + Send + Sync>;

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
pub struct ChannelEventBus {
    subscribers: Mutex<HashMap<String, Vec<Entry>>>,
    next_id: AtomicU64,
}

impl ChannelEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, event_type: impl Into<String>, filter: Option<Filter>, handler: Handler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .lock()
            .expect("channel event bus mutex poisoned")
            .entry(event_type.into())
            .or_default()
            .push(Entry { id, filter, handler });
        Subscription { id }
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        let mut subscribers = self.subscribers.lock().expect("channel event bus mutex poisoned");
        for entries in subscribers.values_mut() {
            entries.retain(|e| e.id != subscription.id);
        }
    }

    /// Dispatches `envelope` synchronously to every matching subscriber
    /// of `envelope.event_type`, in subscription order. A panicking
    /// handler or filter is isolated and logged; it never blocks
    /// delivery to the remaining subscribers.
    pub fn publish(&self, envelope: Envelope) {
        let subscribers = self.subscribers.lock().expect("channel event bus mutex poisoned");
        let Some(entries) = subscribers.get(&envelope.event_type) else {
            return;
        };
        for entry in entries {
            let matches = entry
                .filter
                .as_ref()
                .map(|f| catch_unwind(AssertUnwindSafe(|| f(&envelope))).unwrap_or(false))
                .unwrap_or(true);
            if !matches {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| (entry.handler)(&envelope))).is_err() {
                tracing::error!(event_type = %envelope.event_type, "channel event bus subscriber panicked");
            }
        }
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.subscribers
            .lock()
            .expect("channel event bus mutex poisoned")
            .get(event_type)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

/// A channel-scoped, whitelist-enforcing view over a `ChannelEventBus`.
/// Subscriptions outside `event_names::PUBLIC_WHITELIST`, or for a
/// different channel, are rejected (logged, not an error return —
/// mirrors the bus's own "never block the dispatcher" philosophy).
pub struct ChannelMonitor {
    bus: Arc<ChannelEventBus>,
    channel_id: String,
}

impl ChannelMonitor {
    pub fn new(bus: Arc<ChannelEventBus>, channel_id: impl Into<String>) -> Self {
        Self {
            bus,
            channel_id: channel_id.into(),
        }
    }

    pub fn subscribe(&self, event_type: &'static str, handler: Handler) -> Option<Subscription> {
        if !event_names::PUBLIC_WHITELIST.contains(&event_type) {
            tracing::warn!(event_type, "rejected subscription to non-whitelisted event");
            return None;
        }
        let channel_id = self.channel_id.clone();
        Some(self.bus.subscribe(
            event_type,
            Some(Box::new(move |e: &Envelope| e.channel_id == channel_id)),
            handler,
        ))
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.bus.unsubscribe(subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn envelope(event_type: &str, channel_id: &str) -> Envelope {
        Envelope::new(event_type, "agent-1", channel_id, json!({}))
    }

    #[test]
    fn delivers_in_subscription_order() {
        let bus = ChannelEventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        bus.subscribe("task:assigned", None, Box::new(move |_| o1.lock().unwrap().push(1)));
        let o2 = order.clone();
        bus.subscribe("task:assigned", None, Box::new(move |_| o2.lock().unwrap().push(2)));

        bus.publish(envelope("task:assigned", "channel-1"));
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let bus = ChannelEventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.subscribe("task:assigned", None, Box::new(|_| panic!("boom")));
        let c = count.clone();
        bus.subscribe("task:assigned", None, Box::new(move |_| { c.fetch_add(1, Ordering::SeqCst); }));

        bus.publish(envelope("task:assigned", "channel-1"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn channel_monitor_rejects_non_whitelisted_events() {
        let bus = Arc::new(ChannelEventBus::new());
        let monitor = ChannelMonitor::new(bus, "channel-1");
        let subscription = monitor.subscribe(event_names::MESSAGE_PERSIST_BULK, Box::new(|_| {}));
        assert!(subscription.is_none());
    }

    #[test]
    fn channel_monitor_filters_to_its_own_channel() {
        let bus = Arc::new(ChannelEventBus::new());
        let monitor = ChannelMonitor::new(bus.clone(), "channel-1");
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        monitor
            .subscribe(event_names::TASK_ASSIGNED, Box::new(move |_| { c.fetch_add(1, Ordering::SeqCst); }))
            .unwrap();

        bus.publish(envelope(event_names::TASK_ASSIGNED, "channel-1"));
        bus.publish(envelope(event_names::TASK_ASSIGNED, "channel-2"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
