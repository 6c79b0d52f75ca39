// One agent's share of the runtime: owns its memory, tool registry,
// invoker and control loop, and drives them off inbound envelopes
// pulled from the transport gateway. Mirrors the shape of
// `everruns-worker`'s per-job supervisor, generalized from "one job,
// one outcome" to "one agent, many tasks over its lifetime".

use std::sync::Arc;

use mxf_contracts::envelope::{event_names, Envelope};
use mxf_core::executor::TaskContext;
use mxf_core::memory::{ConversationMemory, DurableStore, IndexSink};
use mxf_core::traits::LlmProvider;
use mxf_coordinator::{is_assignable_to, task_context, ControlLoop};
use mxf_transport::{Criticality, OutboundQueue};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::envelope_bridge::{
    channel_message_envelope, parse_task_assigned, parse_task_cancelled_id, task_completed_envelope,
    task_failed_envelope,
};
use crate::error::Result;

pub struct AgentProcess<L: LlmProvider> {
    agent_id: String,
    channel_id: String,
    memory: Arc<Mutex<ConversationMemory>>,
    control_loop: Arc<ControlLoop<L>>,
    durable: Arc<dyn DurableStore>,
    index: Arc<dyn IndexSink>,
    outbound: Arc<OutboundQueue>,
}

impl<L: LlmProvider> AgentProcess<L> {
    pub fn new(
        agent_id: impl Into<String>,
        channel_id: impl Into<String>,
        memory: Arc<Mutex<ConversationMemory>>,
        control_loop: Arc<ControlLoop<L>>,
        durable: Arc<dyn DurableStore>,
        index: Arc<dyn IndexSink>,
        outbound: Arc<OutboundQueue>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            channel_id: channel_id.into(),
            memory,
            control_loop,
            durable,
            index,
            outbound,
        }
    }

    /// Dispatches one inbound envelope. Unrecognized event types are
    /// logged and dropped — this process only reacts to the subset of
    /// channel traffic that bears on its own task lifecycle.
    pub async fn handle_envelope(&self, envelope: Envelope) -> Result<()> {
        match envelope.event_type.as_str() {
            event_names::TASK_ASSIGNED => self.on_task_assigned(envelope).await,
            event_names::TASK_CANCELLED => self.on_task_cancelled(envelope).await,
            other => {
                info!(agent_id = %self.agent_id, event_type = other, "ignoring envelope outside agent process scope");
                Ok(())
            }
        }
    }

    async fn on_task_assigned(&self, envelope: Envelope) -> Result<()> {
        let task = parse_task_assigned(&envelope)?;
        if !is_assignable_to(&task, &self.agent_id) {
            warn!(agent_id = %self.agent_id, task_id = %task.task_id, "rejecting task not assignable to this agent");
            return Ok(());
        }

        let TaskContext { task_id, .. } = task_context(&task);

        let outcome = self.control_loop.start(&task).await?;

        {
            let mut memory = self.memory.lock().await;
            memory.persist(self.durable.as_ref()).await?;
            let indexed = memory.load_for_indexing(self.durable.as_ref(), self.index.as_ref()).await?;
            info!(agent_id = %self.agent_id, task_id = %task_id, indexed, "persisted conversation suffix");
        }

        if let Some(text) = &outcome.final_text {
            self.outbound
                .enqueue(channel_message_envelope(&self.agent_id, &self.channel_id, text), Criticality::Critical)
                .await?;
        }

        use mxf_core::executor::LoopExit;
        let task_is_done = matches!(
            outcome.exit,
            LoopExit::TaskCompleted | LoopExit::CompletionHeuristic { auto_completed: true, .. }
        );
        if task_is_done {
            self.outbound
                .enqueue(task_completed_envelope(&self.agent_id, &self.channel_id, &task_id), Criticality::Critical)
                .await?;
        }

        Ok(())
    }

    async fn on_task_cancelled(&self, envelope: Envelope) -> Result<()> {
        let Some(task_id) = parse_task_cancelled_id(&envelope) else {
            warn!(agent_id = %self.agent_id, "task:cancelled envelope missing taskId");
            return Ok(());
        };
        self.control_loop.cancellation().cancel();
        info!(agent_id = %self.agent_id, task_id, "task cancellation requested");
        Ok(())
    }

    /// Surfaces an unrecoverable loop error to the channel (§4.6
    /// `AgentLoopError::is_fatal`), rather than silently dropping the task.
    pub async fn report_failure(&self, task_id: &str, error: &str) -> Result<()> {
        self.outbound
            .enqueue(
                task_failed_envelope(&self.agent_id, &self.channel_id, task_id, error),
                Criticality::Critical,
            )
            .await?;
        Ok(())
    }
}
