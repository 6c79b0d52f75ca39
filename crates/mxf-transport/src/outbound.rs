// Outbound ordering and backpressure (§5 "Concurrency & backpressure").
//
// Every outbound frame is tagged critical or non-critical at enqueue
// time. Producers block on a full queue for critical frames (task
// results, control-loop transitions) and drop non-critical ones
// (heartbeats, progress chatter) rather than stall the agent loop.
// Frames are drained in a single FIFO, so the per-`(agentId, channelId,
// eventType)` ordering guarantee in §4.2 falls out for free as long as
// nothing reorders the queue — which nothing here does.
//
// Sent-but-unacknowledged frames are retained (bounded) so the gateway
// can replay them in original order after a reconnect (§8 scenario 6:
// "agent reconnects mid-task, pending tool results are replayed").

use std::collections::VecDeque;

use mxf_contracts::envelope::Envelope;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::error::{Result, TransportError};

/// Caps how many unacknowledged frames are retained for replay. Past
/// this, the oldest are dropped — a reconnect after this many frames
/// have queued up without a single ack is treated as too stale to
/// fully recover and is logged, not silently perfect.
const REPLAY_BUFFER_CAP: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Task results, control-loop transitions, registration traffic.
    /// Enqueue blocks rather than drop these.
    Critical,
    /// Heartbeats, progress chatter. Dropped when the queue is full.
    NonCritical,
}

#[derive(Debug, Clone)]
pub struct QueuedFrame {
    pub envelope: Envelope,
    pub criticality: Criticality,
}

pub struct OutboundQueue {
    tx: mpsc::Sender<QueuedFrame>,
    rx: Mutex<mpsc::Receiver<QueuedFrame>>,
    unacked: Mutex<VecDeque<Envelope>>,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            unacked: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueue a frame for sending. Blocks when full for `Critical`
    /// frames; drops (with a warning) when full for `NonCritical` ones.
    pub async fn enqueue(&self, envelope: Envelope, criticality: Criticality) -> Result<()> {
        match criticality {
            Criticality::Critical => self
                .tx
                .send(QueuedFrame {
                    envelope,
                    criticality,
                })
                .await
                .map_err(|_| TransportError::connection_lost("outbound queue closed")),
            Criticality::NonCritical => {
                let event_type = envelope.event_type.clone();
                if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(QueuedFrame {
                    envelope,
                    criticality,
                }) {
                    tracing::warn!(
                        event_type = %event_type,
                        "dropping non-critical frame: outbound queue is full"
                    );
                }
                Ok(())
            }
        }
    }

    /// Pull the next frame to send. Returns `None` once the queue is
    /// closed (all senders dropped).
    pub async fn next(&self) -> Option<QueuedFrame> {
        self.rx.lock().await.recv().await
    }

    /// Record a frame as sent but not yet acknowledged, for replay on
    /// reconnect.
    pub async fn record_sent(&self, envelope: Envelope) {
        let mut unacked = self.unacked.lock().await;
        unacked.push_back(envelope);
        if unacked.len() > REPLAY_BUFFER_CAP {
            let dropped = unacked.pop_front();
            if let Some(dropped) = dropped {
                tracing::warn!(
                    event_id = %dropped.event_id,
                    "replay buffer overflowed, oldest unacked frame dropped"
                );
            }
        }
    }

    /// Mark a frame as acknowledged by the server; it no longer needs
    /// to be replayed.
    pub async fn ack(&self, event_id: Uuid) {
        self.unacked.lock().await.retain(|e| e.event_id != event_id);
    }

    /// Frames sent but never acked, in original send order. The
    /// gateway resends these first after a reconnect, before draining
    /// any newly enqueued traffic.
    pub async fn pending_replay(&self) -> Vec<Envelope> {
        self.unacked.lock().await.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(event_type: &str) -> Envelope {
        Envelope::new(event_type, "agent-1", "channel-1", json!({}))
    }

    #[tokio::test]
    async fn critical_frames_are_delivered_in_order() {
        let queue = OutboundQueue::new(4);
        queue
            .enqueue(env("task:assigned"), Criticality::Critical)
            .await
            .unwrap();
        queue
            .enqueue(env("task:completed"), Criticality::Critical)
            .await
            .unwrap();

        let first = queue.next().await.unwrap();
        let second = queue.next().await.unwrap();
        assert_eq!(first.envelope.event_type, "task:assigned");
        assert_eq!(second.envelope.event_type, "task:completed");
    }

    #[tokio::test]
    async fn non_critical_frames_drop_when_full_without_blocking() {
        let queue = OutboundQueue::new(1);
        queue
            .enqueue(env("heartbeat"), Criticality::NonCritical)
            .await
            .unwrap();
        // Queue is now full (capacity 1, one unread frame); this must
        // return immediately instead of blocking.
        queue
            .enqueue(env("heartbeat"), Criticality::NonCritical)
            .await
            .unwrap();

        let first = queue.next().await.unwrap();
        assert_eq!(first.envelope.event_type, "heartbeat");
    }

    #[tokio::test]
    async fn pending_replay_preserves_send_order() {
        let queue = OutboundQueue::new(4);
        queue.record_sent(env("task:progress_updated")).await;
        queue.record_sent(env("task:completed")).await;

        let pending = queue.pending_replay().await;
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].event_type, "task:progress_updated");
        assert_eq!(pending[1].event_type, "task:completed");
    }

    #[tokio::test]
    async fn acked_frames_are_excluded_from_replay() {
        let queue = OutboundQueue::new(4);
        let first = env("task:progress_updated");
        let first_id = first.event_id;
        queue.record_sent(first).await;
        queue.record_sent(env("task:completed")).await;

        queue.ack(first_id).await;

        let pending = queue.pending_replay().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, "task:completed");
    }
}
