// Pluggable backend traits (§1 "out of scope, interface-only").
//
// LLM provider adapters, tool execution backends, and durable storage
// are all external collaborators per the spec; these traits are the
// seams the loop is built against, mirroring everruns-core::traits.

use crate::config::AgentConfig;
use crate::error::Result;
use crate::events::LoopEvent;
use crate::message::ConversationMessage;
use crate::tool_types::{ToolCall, ToolDefinition, ToolResult};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Emits loop-internal events. The default implementation forwards to an
/// `EventBus`; tests can swap in a no-op or collecting emitter.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: LoopEvent) -> Result<()>;

    async fn emit_batch(&self, events: Vec<LoopEvent>) -> Result<()> {
        for event in events {
            self.emit(event).await?;
        }
        Ok(())
    }
}

pub type LlmResponseStream = Pin<Box<dyn Stream<Item = Result<LlmStreamEvent>> + Send>>;

#[derive(Debug, Clone)]
pub enum LlmStreamEvent {
    TextDelta(String),
    /// Opaque reasoning text, emitted only when `config.reasoning.enabled`.
    ReasoningDelta(String),
    ToolCalls(Vec<ToolCall>),
    Done(LlmCompletionMetadata),
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct LlmCompletionMetadata {
    pub total_tokens: Option<u32>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmMessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: LlmMessageRole,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
}

impl From<&ConversationMessage> for LlmMessage {
    fn from(msg: &ConversationMessage) -> Self {
        let role = match msg.role {
            crate::message::MessageRole::System => LlmMessageRole::System,
            crate::message::MessageRole::User => LlmMessageRole::User,
            crate::message::MessageRole::Assistant => LlmMessageRole::Assistant,
            crate::message::MessageRole::Tool => LlmMessageRole::Tool,
        };
        LlmMessage {
            role,
            content: msg.content.clone(),
            tool_calls: msg.tool_calls.clone(),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmCallConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolDefinition>,
    pub reasoning_enabled: bool,
}

impl From<&AgentConfig> for LlmCallConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            tools: config.tools.iter().map(tool_definition_from_core).collect(),
            reasoning_enabled: config.reasoning.enabled,
        }
    }
}

fn tool_definition_from_core(def: &crate::tool_types::ToolDefinition) -> ToolDefinition {
    def.clone()
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub reasoning_text: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub metadata: LlmCompletionMetadata,
}

/// Provider-agnostic LLM call seam (OpenAI/Anthropic/etc. adapters are
/// out of scope per §1; this is the boundary they would implement).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat_completion_stream(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponseStream>;

    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponse> {
        use futures::StreamExt;

        let mut stream = self.chat_completion_stream(messages, config).await?;
        let mut text = String::new();
        let mut reasoning_text: Option<String> = None;
        let mut tool_calls = None;
        let mut metadata = LlmCompletionMetadata::default();

        while let Some(event) = stream.next().await {
            match event? {
                LlmStreamEvent::TextDelta(delta) => text.push_str(&delta),
                LlmStreamEvent::ReasoningDelta(delta) => {
                    reasoning_text.get_or_insert_with(String::new).push_str(&delta)
                }
                LlmStreamEvent::ToolCalls(calls) => tool_calls = Some(calls),
                LlmStreamEvent::Done(meta) => metadata = meta,
                LlmStreamEvent::Error(err) => return Err(crate::error::AgentLoopError::llm(err)),
            }
        }

        Ok(LlmResponse {
            text,
            reasoning_text,
            tool_calls,
            metadata,
        })
    }
}

/// Executes a single tool call against its definition.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool_call: &ToolCall, tool_def: &ToolDefinition) -> Result<ToolResult>;
}
