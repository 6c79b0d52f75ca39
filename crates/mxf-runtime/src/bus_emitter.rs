// Bridges `mxf_core::traits::EventEmitter` (async, one event at a
// time) onto `mxf_core::bus::EventBus` (synchronous, per-event-name
// ordered dispatch) — the one seam between C6's loop-internal telemetry
// and C1's dispatcher that the core crate deliberately leaves for the
// owning runtime to wire (see `mxf_core::bus` and `mxf_transport::gateway`
// module docs).

use std::sync::Arc;

use async_trait::async_trait;
use mxf_core::bus::EventBus;
use mxf_core::error::Result;
use mxf_core::events::LoopEvent;
use mxf_core::traits::EventEmitter;

pub struct BusEventEmitter {
    bus: Arc<EventBus>,
}

impl BusEventEmitter {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl EventEmitter for BusEventEmitter {
    async fn emit(&self, event: LoopEvent) -> Result<()> {
        self.bus.publish_and_propagate_errors(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_events_to_the_bus() {
        let bus = Arc::new(EventBus::new());
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = count.clone();
        bus.subscribe(
            "loop_started",
            None,
            Box::new(move |_| {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }),
        );

        let emitter = BusEventEmitter::new(bus);
        emitter.emit(LoopEvent::loop_started("agent-1")).await.unwrap();
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
