// The explicit composition root (§9 "Global state": "no process-wide
// singletons; an explicit `Runtime` value owns the Event Bus, the
// transport gateway, and every agent process, and is constructed once
// at startup"). Multiplexes inbound envelopes to the agent process they
// name and republishes whitelisted traffic on the channel-scoped bus so
// `ChannelMonitor` subscribers see it.

use std::collections::HashMap;
use std::sync::Arc;

use mxf_contracts::envelope::{event_names, Envelope};
use mxf_core::traits::LlmProvider;
use mxf_coordinator::ChannelEventBus;
use tokio::sync::mpsc;
use tracing::warn;

use crate::agent_process::AgentProcess;
use crate::error::{Result, RuntimeError};

pub struct Runtime<L: LlmProvider> {
    channel_bus: Arc<ChannelEventBus>,
    agents: HashMap<String, Arc<AgentProcess<L>>>,
}

impl<L: LlmProvider> Runtime<L> {
    pub fn new(channel_bus: Arc<ChannelEventBus>) -> Self {
        Self {
            channel_bus,
            agents: HashMap::new(),
        }
    }

    pub fn register_agent(&mut self, agent_id: impl Into<String>, process: Arc<AgentProcess<L>>) {
        self.agents.insert(agent_id.into(), process);
    }

    /// Drains inbound envelopes until the gateway closes the channel
    /// (orderly shutdown) or dispatch to an agent process fails fatally.
    pub async fn run(&self, mut inbound_rx: mpsc::Receiver<Envelope>) -> Result<()> {
        while let Some(envelope) = inbound_rx.recv().await {
            if event_names::PUBLIC_WHITELIST.contains(&envelope.event_type.as_str()) {
                self.channel_bus.publish(envelope.clone());
            }

            let Some(process) = self.agents.get(&envelope.agent_id) else {
                warn!(agent_id = %envelope.agent_id, event_type = %envelope.event_type, "no agent process registered for envelope target");
                continue;
            };

            if let Err(err) = process.handle_envelope(envelope.clone()).await {
                warn!(agent_id = %envelope.agent_id, error = %err, "agent process failed to handle envelope");
                if err.is_fatal() {
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    pub fn agent(&self, agent_id: &str) -> Result<Arc<AgentProcess<L>>> {
        self.agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownAgent(agent_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mxf_contracts::task::{Task, TaskStatus};
    use mxf_core::breaker::CircuitBreaker;
    use mxf_core::config::AgentConfig;
    use mxf_core::memory::ConversationMemory;
    use mxf_core::testutil::FakeEventEmitter;
    use mxf_core::tool_types::{ToolCall, ToolResult};
    use mxf_core::tools::{ToolInvoker, ToolRegistry};
    use mxf_core::traits::{LlmCallConfig, LlmMessage, LlmResponse, LlmResponseStream, ToolExecutor};
    use mxf_coordinator::{ControlLoop, GatePublisher};
    use mxf_transport::OutboundQueue;
    use tokio::sync::Mutex;

    struct ImmediateCompletionProvider;
    #[async_trait]
    impl LlmProvider for ImmediateCompletionProvider {
        async fn chat_completion(&self, _messages: Vec<LlmMessage>, _config: &LlmCallConfig) -> mxf_core::error::Result<LlmResponse> {
            Ok(LlmResponse {
                text: String::new(),
                reasoning_text: None,
                tool_calls: Some(vec![ToolCall {
                    id: "c1".into(),
                    name: "task_complete".into(),
                    input: serde_json::json!({}),
                }]),
                metadata: Default::default(),
            })
        }

        async fn chat_completion_stream(&self, messages: Vec<LlmMessage>, config: &LlmCallConfig) -> mxf_core::error::Result<LlmResponseStream> {
            let response = self.chat_completion(messages, config).await?;
            Ok(Box::pin(tokio_stream::once(Ok(mxf_core::traits::LlmStreamEvent::Done(response.metadata)))))
        }
    }

    struct EchoExecutor;
    #[async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute(&self, call: &ToolCall, _def: &mxf_core::tool_types::ToolDefinition) -> mxf_core::error::Result<ToolResult> {
            Ok(ToolResult::success(&call.id, "ok"))
        }
    }

    struct NoopPublisher;
    #[async_trait]
    impl GatePublisher for NoopPublisher {
        async fn publish_allowed_tools(&self, _agent_id: &str, _channel_id: &str, _tools: &[String]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct NoopDurableStore;
    #[async_trait]
    impl mxf_core::memory::DurableStore for NoopDurableStore {
        async fn persist_suffix(&self, _agent_id: &str, _suffix: &[mxf_core::message::ConversationMessage]) -> mxf_core::error::Result<()> {
            Ok(())
        }
        async fn load_all(&self, _agent_id: &str) -> mxf_core::error::Result<Vec<mxf_core::message::ConversationMessage>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct NoopIndexSink;
    #[async_trait]
    impl mxf_core::memory::IndexSink for NoopIndexSink {
        async fn index_batch(&self, _messages: &[mxf_core::message::ConversationMessage]) -> mxf_core::error::Result<()> {
            Ok(())
        }
    }

    fn build_agent_process() -> Arc<AgentProcess<ImmediateCompletionProvider>> {
        let memory = Arc::new(Mutex::new(ConversationMemory::new("agent-1", 500, 10)));
        let registry = Arc::new(ToolRegistry::new());
        let invoker = Arc::new(ToolInvoker::new(Arc::new(EchoExecutor), CircuitBreaker::new(Default::default())));
        let emitter = Arc::new(FakeEventEmitter::new());
        let reasoning_loop = Arc::new(mxf_core::executor::ReasoningLoop::new(
            "agent-1",
            memory.clone(),
            registry.clone(),
            invoker,
            emitter,
            Arc::new(ImmediateCompletionProvider),
        ));
        let mut config = AgentConfig::new("be helpful", "gpt-5.2");
        config.max_iterations = 5;
        let control_loop = Arc::new(ControlLoop::new(
            "agent-1",
            "channel-1",
            reasoning_loop,
            config,
            registry,
            Arc::new(NoopPublisher),
        ));
        Arc::new(AgentProcess::new(
            "agent-1",
            "channel-1",
            memory,
            control_loop,
            Arc::new(NoopDurableStore),
            Arc::new(NoopIndexSink),
            Arc::new(OutboundQueue::new(8)),
        ))
    }

    #[tokio::test]
    async fn dispatches_inbound_envelope_to_the_named_agent() {
        let mut runtime = Runtime::new(Arc::new(ChannelEventBus::new()));
        runtime.register_agent("agent-1", build_agent_process());

        let (tx, rx) = mpsc::channel(8);
        let mut task = Task::new("t1", "Title", "Description");
        task.status = TaskStatus::InProgress;
        task.assigned_agents = vec!["agent-1".to_string()];
        tx.send(Envelope::new(
            event_names::TASK_ASSIGNED,
            "agent-1",
            "channel-1",
            serde_json::to_value(task).unwrap(),
        ))
        .await
        .unwrap();
        drop(tx);

        runtime.run(rx).await.unwrap();
    }

    #[tokio::test]
    async fn envelope_for_unregistered_agent_is_dropped_without_error() {
        let runtime: Runtime<ImmediateCompletionProvider> = Runtime::new(Arc::new(ChannelEventBus::new()));
        let (tx, rx) = mpsc::channel(8);
        tx.send(Envelope::new(event_names::TASK_ASSIGNED, "agent-ghost", "channel-1", serde_json::json!({})))
            .await
            .unwrap();
        drop(tx);

        assert!(runtime.run(rx).await.is_ok());
    }
}
