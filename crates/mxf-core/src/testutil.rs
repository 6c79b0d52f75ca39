// Shared test fakes, in the spirit of everruns-core::memory's
// `InMemoryMessageStore` / `MockLlmProvider` / `MockToolExecutor` —
// trivial in-process stand-ins for the out-of-scope collaborators named
// in spec §1, so the loop and its callers can be exercised without a
// real LLM adapter, transport, or document store.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::events::LoopEvent;
use crate::traits::{EventEmitter, LlmCallConfig, LlmMessage, LlmProvider, LlmResponseStream, LlmStreamEvent};

/// Records every event it receives; tests assert against `events()`.
#[derive(Default)]
pub struct FakeEventEmitter {
    events: Mutex<Vec<LoopEvent>>,
}

#[async_trait]
impl EventEmitter for FakeEventEmitter {
    async fn emit(&self, event: LoopEvent) -> Result<()> {
        self.events.lock().expect("event log poisoned").push(event);
        Ok(())
    }
}

impl FakeEventEmitter {
    pub fn events(&self) -> Vec<LoopEvent> {
        self.events.lock().expect("event log poisoned").clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().expect("event log poisoned").iter().filter(|e| e.name() == name).count()
    }
}

/// Replays a fixed script of `LlmResponse`s, one per call, in order.
/// Panics if called more times than the script provides — tests should
/// size the script to the number of LLM turns they expect.
pub struct ScriptedLlmProvider {
    responses: Mutex<std::collections::VecDeque<crate::traits::LlmResponse>>,
}

impl ScriptedLlmProvider {
    pub fn new(responses: Vec<crate::traits::LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    async fn chat_completion_stream(
        &self,
        _messages: Vec<LlmMessage>,
        _config: &LlmCallConfig,
    ) -> Result<LlmResponseStream> {
        unimplemented!("ScriptedLlmProvider only implements the non-streaming chat_completion path")
    }

    async fn chat_completion(
        &self,
        _messages: Vec<LlmMessage>,
        _config: &LlmCallConfig,
    ) -> Result<crate::traits::LlmResponse> {
        let mut responses = self.responses.lock().expect("scripted responses poisoned");
        responses
            .pop_front()
            .ok_or_else(|| crate::error::AgentLoopError::llm("ScriptedLlmProvider script exhausted"))
    }
}

/// A provider that always returns the same canned stream of text
/// deltas, useful for exercising `chat_completion`'s default streaming
/// aggregation path rather than overriding it.
pub struct EchoStreamLlmProvider {
    pub text: String,
}

#[async_trait]
impl LlmProvider for EchoStreamLlmProvider {
    async fn chat_completion_stream(
        &self,
        _messages: Vec<LlmMessage>,
        _config: &LlmCallConfig,
    ) -> Result<LlmResponseStream> {
        let text = self.text.clone();
        let events = vec![
            Ok(LlmStreamEvent::TextDelta(text)),
            Ok(LlmStreamEvent::Done(crate::traits::LlmCompletionMetadata::default())),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{LlmCallConfig, LlmCompletionMetadata, LlmResponse};

    #[tokio::test]
    async fn fake_event_emitter_records_events_in_order() {
        let emitter = FakeEventEmitter::default();
        emitter.emit(LoopEvent::loop_started("a1")).await.unwrap();
        emitter.emit(LoopEvent::iteration_started("a1", 1)).await.unwrap();
        assert_eq!(emitter.events().len(), 2);
        assert_eq!(emitter.count("loop_started"), 1);
    }

    #[tokio::test]
    async fn echo_stream_provider_aggregates_through_default_chat_completion() {
        let provider = EchoStreamLlmProvider { text: "hello".to_string() };
        let config = LlmCallConfig {
            model: "gpt-5.2".into(),
            temperature: None,
            max_tokens: None,
            tools: vec![],
            reasoning_enabled: false,
        };
        let response = provider.chat_completion(vec![], &config).await.unwrap();
        assert_eq!(response.text, "hello");
    }

    #[tokio::test]
    async fn scripted_provider_replays_in_order() {
        let provider = ScriptedLlmProvider::new(vec![
            LlmResponse { text: "first".into(), reasoning_text: None, tool_calls: None, metadata: LlmCompletionMetadata::default() },
            LlmResponse { text: "second".into(), reasoning_text: None, tool_calls: None, metadata: LlmCompletionMetadata::default() },
        ]);
        let config = LlmCallConfig { model: "gpt-5.2".into(), temperature: None, max_tokens: None, tools: vec![], reasoning_enabled: false };
        assert_eq!(provider.chat_completion(vec![], &config).await.unwrap().text, "first");
        assert_eq!(provider.chat_completion(vec![], &config).await.unwrap().text, "second");
        assert!(provider.chat_completion(vec![], &config).await.is_err());
    }
}
