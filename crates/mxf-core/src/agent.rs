// Agent entity and capability handle (§3 "Agent", §9 "Cyclic references
// and back-pointers").
//
// The source has an agent referencing managers that reference the agent
// back. Rather than reproduce that cycle, components that need to act on
// behalf of an agent hold an `AgentHandle` — a narrow capability value
// exposing only append-message, emit-event, and get-tools — instead of
// the `Agent` itself.

use crate::config::AgentConfig;
use crate::error::Result;
use crate::events::LoopEvent;
use crate::memory::ConversationMemory;
use crate::message::ConversationMessage;
use crate::tool_types::ToolDefinition;
use crate::tools::ToolRegistry;
use crate::traits::EventEmitter;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Stable identity `(agentId, channelId)` plus configuration. Mutated
/// only through `update_allowed_tools` (atomic swap, see
/// `mxf-coordinator`'s phase machine); destroyed on disconnect.
pub struct Agent {
    pub agent_id: String,
    pub channel_id: String,
    pub config: AgentConfig,
}

impl Agent {
    pub fn new(agent_id: impl Into<String>, channel_id: impl Into<String>, config: AgentConfig) -> Self {
        Self {
            agent_id: agent_id.into(),
            channel_id: channel_id.into(),
            config,
        }
    }

    pub fn identity(&self) -> (&str, &str) {
        (&self.agent_id, &self.channel_id)
    }

    /// Atomic swap of the allowed-tool list, used by the phase machine's
    /// `updateAllowedTools`. Prompt regeneration and server push are the
    /// caller's responsibility (they cross a component boundary this
    /// type doesn't own).
    pub fn update_allowed_tools(&mut self, tools: Vec<String>) {
        self.config.allowed_tools = tools;
    }
}

/// A narrow capability value handed to collaborators (the reasoning
/// loop, the coordinator) that need to act on an agent's behalf without
/// owning it.
#[derive(Clone)]
pub struct AgentHandle {
    agent_id: String,
    memory: Arc<Mutex<ConversationMemory>>,
    emitter: Arc<dyn EventEmitter>,
    registry: Arc<ToolRegistry>,
}

impl AgentHandle {
    pub fn new(
        agent_id: impl Into<String>,
        memory: Arc<Mutex<ConversationMemory>>,
        emitter: Arc<dyn EventEmitter>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            memory,
            emitter,
            registry,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub async fn append_message(&self, message: ConversationMessage) -> Result<()> {
        self.memory.lock().await.append(message)
    }

    pub async fn emit_event(&self, event: LoopEvent) -> Result<()> {
        self.emitter.emit(event).await
    }

    pub async fn get_tools(&self) -> Vec<ToolDefinition> {
        self.registry.snapshot().await
    }
}
