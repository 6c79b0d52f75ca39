// ORPAR control loop (§3 "ControlLoop", §4.7). Drives one
// Observe→Reason→Plan→Act→Reflect cycle per task-observation by
// issuing one `ReasoningLoop::run` call per phase, widening the tool
// gate in `acting`, and stopping early on task completion.

use std::sync::Arc;

use mxf_contracts::task::Task;
use mxf_core::config::AgentConfig;
use mxf_core::executor::{CancellationFlag, LoopExit, LoopOutcome, LoopTrigger, ReasoningLoop};
use mxf_core::tool_types::ToolDefinition;
use mxf_core::tools::ToolRegistry;
use mxf_core::traits::LlmProvider;
use tokio::sync::Mutex;

use crate::error::{CoordinatorError, Result};
use crate::gate::{update_allowed_tools, GatePublisher};
use crate::phase::ControlLoopPhase;
use crate::task::task_context;

pub struct ControlLoop<L: LlmProvider> {
    agent_id: String,
    channel_id: String,
    reasoning_loop: Arc<ReasoningLoop<L>>,
    config: Mutex<AgentConfig>,
    registry: Arc<ToolRegistry>,
    publisher: Arc<dyn GatePublisher>,
    phase: Mutex<ControlLoopPhase>,
    cancellation: CancellationFlag,
}

impl<L: LlmProvider> ControlLoop<L> {
    pub fn new(
        agent_id: impl Into<String>,
        channel_id: impl Into<String>,
        reasoning_loop: Arc<ReasoningLoop<L>>,
        config: AgentConfig,
        registry: Arc<ToolRegistry>,
        publisher: Arc<dyn GatePublisher>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            channel_id: channel_id.into(),
            reasoning_loop,
            config: Mutex::new(config),
            registry,
            publisher,
            phase: Mutex::new(ControlLoopPhase::Idle),
            cancellation: CancellationFlag::new(),
        }
    }

    pub async fn phase(&self) -> ControlLoopPhase {
        *self.phase.lock().await
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    pub async fn stop(&self) {
        *self.phase.lock().await = ControlLoopPhase::Stopped;
    }

    /// §4.7: "a control loop is initialized on first task arrival and
    /// started; the task is injected as a task-observation." Runs
    /// exactly one ORPAR cycle: either to task completion, or through
    /// `reflecting`, whichever comes first.
    pub async fn start(&self, task: &Task) -> Result<LoopOutcome> {
        *self.phase.lock().await = ControlLoopPhase::Observing;
        self.run_cycle(task).await
    }

    async fn run_cycle(&self, task: &Task) -> Result<LoopOutcome> {
        loop {
            let phase = *self.phase.lock().await;
            if matches!(phase, ControlLoopPhase::Stopped | ControlLoopPhase::Error) {
                return Err(CoordinatorError::NotRunning);
            }

            self.enter_phase(phase).await?;

            let config_snapshot = self.config.lock().await.clone();
            let task_tools: Vec<String> = config_snapshot.tools.iter().map(|t| t.name.clone()).collect();
            let trigger = LoopTrigger {
                task: Some(task_context(task)),
                phase_gate: phase.tool_gate(&task_tools),
                phase_label: Some(phase.label().to_string()),
                cancellation: self.cancellation.clone(),
            };

            let outcome = self.reasoning_loop.run(&config_snapshot, trigger).await?;

            if outcome.exit == LoopExit::TaskCompleted {
                *self.phase.lock().await = ControlLoopPhase::Stopped;
                return Ok(outcome);
            }

            if phase == ControlLoopPhase::Reflecting {
                // One full cycle elapsed without completion; back to
                // observing so the next task-observation starts fresh.
                *self.phase.lock().await = ControlLoopPhase::Observing;
                return Ok(outcome);
            }

            *self.phase.lock().await = phase.next();
        }
    }

    /// `acting` is the one phase that calls `updateAllowedTools` (§4.7:
    /// "refresh the tool cache (remote tools may appear only here)").
    /// The other phases rely on their fixed single-tool gate and need
    /// no cache refresh.
    async fn enter_phase(&self, phase: ControlLoopPhase) -> Result<()> {
        if phase != ControlLoopPhase::Acting {
            return Ok(());
        }
        let mut config = self.config.lock().await;
        let task_tools: Vec<String> = config.tools.iter().map(|t| t.name.clone()).collect();
        update_allowed_tools(&mut config, &self.registry, self.publisher.as_ref(), &self.agent_id, &self.channel_id, task_tools)
            .await
            .map_err(CoordinatorError::Internal)?;
        Ok(())
    }

    pub async fn available_tools(&self) -> Vec<ToolDefinition> {
        self.registry.snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mxf_contracts::task::TaskStatus;
    use mxf_core::memory::ConversationMemory;
    use mxf_core::message::ConversationMessage;
    use mxf_core::tool_types::{ToolCall, ToolResult};
    use mxf_core::tools::ToolInvoker;
    use mxf_core::traits::{LlmCallConfig, LlmResponse, LlmResponseStream};
    use mxf_core::breaker::CircuitBreaker;
    use mxf_core::testutil::FakeEventEmitter;
    use std::sync::Mutex as StdMutex;

    struct RecordingPublisher {
        pushed: StdMutex<Vec<Vec<String>>>,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            Self { pushed: StdMutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl GatePublisher for RecordingPublisher {
        async fn publish_allowed_tools(&self, _agent_id: &str, _channel_id: &str, tools: &[String]) -> anyhow::Result<()> {
            self.pushed.lock().unwrap().push(tools.to_vec());
            Ok(())
        }
    }

    /// Always completes the task on its very first call, regardless of
    /// phase, by returning a `task_complete` tool call.
    struct ImmediateCompletionProvider;

    #[async_trait]
    impl LlmProvider for ImmediateCompletionProvider {
        async fn chat_completion(
            &self,
            _messages: Vec<mxf_core::traits::LlmMessage>,
            _config: &LlmCallConfig,
        ) -> mxf_core::error::Result<LlmResponse> {
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

        async fn chat_completion_stream(
            &self,
            messages: Vec<mxf_core::traits::LlmMessage>,
            config: &LlmCallConfig,
        ) -> mxf_core::error::Result<LlmResponseStream> {
            let response = self.chat_completion(messages, config).await?;
            Ok(Box::pin(tokio_stream::once(Ok(mxf_core::traits::LlmStreamEvent::Done(response.metadata)))))
        }
    }

    struct EchoExecutor;
    #[async_trait]
    impl mxf_core::traits::ToolExecutor for EchoExecutor {
        async fn execute(&self, call: &ToolCall, _def: &mxf_core::tool_types::ToolDefinition) -> mxf_core::error::Result<ToolResult> {
            Ok(ToolResult::success(&call.id, "ok"))
        }
    }

    fn build_control_loop() -> ControlLoop<ImmediateCompletionProvider> {
        let memory = Arc::new(Mutex::new(ConversationMemory::new("agent-1", 500, 10)));
        let registry = Arc::new(ToolRegistry::new());
        let invoker = Arc::new(ToolInvoker::new(Arc::new(EchoExecutor), CircuitBreaker::new(Default::default())));
        let emitter = Arc::new(FakeEventEmitter::new());
        let reasoning_loop = Arc::new(ReasoningLoop::new(
            "agent-1",
            memory,
            registry.clone(),
            invoker,
            emitter,
            Arc::new(ImmediateCompletionProvider),
        ));
        let mut config = AgentConfig::new("be helpful", "gpt-5.2");
        config.max_iterations = 5;
        ControlLoop::new(
            "agent-1",
            "channel-1",
            reasoning_loop,
            config,
            registry,
            Arc::new(RecordingPublisher::new()),
        )
    }

    fn task() -> Task {
        let mut t = Task::new("t1", "Title", "Description");
        t.status = TaskStatus::InProgress;
        t.assigned_agents = vec!["agent-1".to_string()];
        t
    }

    #[tokio::test]
    async fn starts_in_observing_phase_and_completes_immediately() {
        let control_loop = build_control_loop();
        let task = task();

        let outcome = control_loop.start(&task).await.unwrap();
        assert_eq!(outcome.exit, LoopExit::TaskCompleted);
        assert_eq!(control_loop.phase().await, ControlLoopPhase::Stopped);
    }
}
