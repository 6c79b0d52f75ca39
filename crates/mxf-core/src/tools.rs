// C4 Tool Registry & Invoker (§4.4).
//
// The registry is single-writer (itself), many-reader, guarded by a
// `tokio::sync::RwLock` exactly as §5 requires ("the tool cache is
// single-writer... many-reader"). The invoker consults the circuit
// breaker before every dispatch and always produces exactly one result
// per call, real or synthetic, to uphold the pairing contract (P6).

use crate::breaker::CircuitBreaker;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::tool_types::{to_display_text, ToolCall, ToolDefinition, ToolResult};
use crate::traits::ToolExecutor;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Tools that are always kept by contextual filtering regardless of
/// recent conversation content: channel communication, the completion
/// tool, and the tool-recommender.
const ALWAYS_KEPT_TOOLS: &[&str] = &["messaging_send", "task_complete", "tool_recommend"];

/// Lexical cues that, when present in recent conversation, admit any
/// tool whose name references them even though it wasn't always-kept.
const LEXICAL_CUES: &[&str] = &["file", "shell", "memory", "time"];

/// When the loop selects a minimal tool set after a tool acknowledgement
/// (§4.6 step 2), only completion and discovery tools are offered —
/// every messaging tool is excluded.
const MINIMAL_SET_AFTER_ACK: &[&str] = &["task_complete", "tool_recommend"];

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<Vec<ToolDefinition>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached tool set (discovery on connect, or on every
    /// `tools:updated` event). The single writer for this registry.
    pub async fn refresh(&self, tools: Vec<ToolDefinition>) {
        *self.tools.write().await = tools;
    }

    pub async fn snapshot(&self) -> Vec<ToolDefinition> {
        self.tools.read().await.clone()
    }

    pub async fn find(&self, name: &str) -> Option<ToolDefinition> {
        self.tools.read().await.iter().find(|t| t.name == name).cloned()
    }

    /// Gating precedence (§4.4): an authoritative, non-empty
    /// `allowedTools` skips all further filtering; otherwise contextual
    /// filtering applies.
    pub async fn select_tools(
        &self,
        config: &AgentConfig,
        recent_ack_lines: &[String],
        recent_conversation_text: &str,
        minimal_after_ack: bool,
    ) -> Vec<ToolDefinition> {
        let all = self.snapshot().await;

        if config.has_authoritative_allow_list() {
            let allowed: HashSet<&str> = config.allowed_tools.iter().map(|s| s.as_str()).collect();
            return all.into_iter().filter(|t| allowed.contains(t.name.as_str())).collect();
        }

        if minimal_after_ack {
            return all
                .into_iter()
                .filter(|t| MINIMAL_SET_AFTER_ACK.contains(&t.name.as_str()))
                .collect();
        }

        contextual_filter(&all, recent_ack_lines, recent_conversation_text)
    }
}

fn contextual_filter(all: &[ToolDefinition], recent_ack_lines: &[String], recent_text: &str) -> Vec<ToolDefinition> {
    let acked = extract_acked_names(recent_ack_lines);
    let mut seen = HashSet::new();
    let mut kept: Vec<ToolDefinition> = Vec::new();

    for tool in all {
        if acked.contains(&tool.name) || !seen.insert(tool.name.clone()) {
            continue;
        }
        if ALWAYS_KEPT_TOOLS.contains(&tool.name.as_str()) {
            kept.push(tool.clone());
        }
    }

    let lower = recent_text.to_lowercase();
    for cue in LEXICAL_CUES {
        if !lower.contains(cue) {
            continue;
        }
        for tool in all {
            if acked.contains(&tool.name) || kept.iter().any(|k| k.name == tool.name) {
                continue;
            }
            if tool.name.to_lowercase().contains(cue) {
                kept.push(tool.clone());
            }
        }
    }

    kept
}

fn extract_acked_names(lines: &[String]) -> HashSet<String> {
    lines
        .iter()
        .flat_map(|line| line.split_whitespace())
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Wraps a raw-JSON-returning executor (e.g. a remote MCP bridge) with
/// the explicit tool-result-shape normalization step from §9 — the
/// invoker boundary where the runtime's dynamic-dispatch sniffing used
/// to live becomes one parse call instead.
pub struct NormalizingToolExecutor<E> {
    inner: E,
}

impl<E> NormalizingToolExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

#[async_trait]
pub trait RawToolExecutor: Send + Sync {
    async fn invoke(&self, tool_call: &ToolCall, tool_def: &ToolDefinition) -> Result<serde_json::Value>;
}

#[async_trait]
impl<E: RawToolExecutor + Send + Sync> ToolExecutor for NormalizingToolExecutor<E> {
    async fn execute(&self, tool_call: &ToolCall, tool_def: &ToolDefinition) -> Result<ToolResult> {
        let raw = self.inner.invoke(tool_call, tool_def).await?;
        let shape = crate::tool_types::parse_tool_result_shape(&raw);
        let text = to_display_text(&shape);
        Ok(ToolResult::success(&tool_call.id, text))
    }
}

/// The outcome of one invocation through the breaker-guarded invoker.
pub struct InvocationOutcome {
    pub result: ToolResult,
    /// Deferred user-role feedback to append after the full tool batch,
    /// e.g. a circuit-breaker intervention message.
    pub deferred_feedback: Option<String>,
}

/// Breaker-guarded tool invoker. One instance per agent; the breaker is
/// single-writer, guarded by a `tokio::sync::Mutex` so the check-and-record
/// step and the dispatch it gates never interleave across concurrent calls.
pub struct ToolInvoker {
    executor: Arc<dyn ToolExecutor>,
    breaker: Mutex<CircuitBreaker>,
}

impl ToolInvoker {
    pub fn new(executor: Arc<dyn ToolExecutor>, breaker: CircuitBreaker) -> Self {
        Self {
            executor,
            breaker: Mutex::new(breaker),
        }
    }

    pub async fn stuck_detections(&self) -> u64 {
        self.breaker.lock().await.stuck_detections()
    }

    pub async fn reset_breaker_streaks(&self) {
        self.breaker.lock().await.reset_streaks();
    }

    /// Checks the breaker before dispatch; on a trip, returns a synthetic
    /// blocked result and a deferred intervention message instead of
    /// invoking the tool at all.
    pub async fn execute(&self, call: &ToolCall, tool_def: &ToolDefinition) -> InvocationOutcome {
        let intervention = self.breaker.lock().await.check_and_record(&call.name, &call.input);

        if let Some(intervention) = intervention {
            let message = format!(
                "circuit breaker tripped ({:?}) on `{}`: {}",
                intervention.rule, intervention.tool_name, intervention.suggested_alternative
            );
            return InvocationOutcome {
                result: ToolResult::synthetic(&call.id, message.clone()),
                deferred_feedback: Some(message),
            };
        }

        let result = match self.executor.execute(call, tool_def).await {
            Ok(result) => result,
            Err(err) => ToolResult::synthetic(&call.id, err.to_string()),
        };

        InvocationOutcome {
            result,
            deferred_feedback: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_types::ToolSource;
    use crate::traits::ToolExecutor as _;

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition::internal(name, format!("{name} description"), serde_json::json!({}))
    }

    #[tokio::test]
    async fn authoritative_allow_list_skips_contextual_filtering() {
        let registry = ToolRegistry::new();
        registry
            .refresh(vec![tool("read_file"), tool("messaging_send"), tool("shell_exec")])
            .await;

        let mut cfg = AgentConfig::default();
        cfg.allowed_tools = vec!["read_file".to_string()];
        let selected = registry.select_tools(&cfg, &[], "", false).await;
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "read_file");
    }

    #[tokio::test]
    async fn contextual_filter_always_keeps_core_tools() {
        let registry = ToolRegistry::new();
        registry.refresh(vec![tool("messaging_send"), tool("shell_exec")]).await;

        let cfg = AgentConfig::default();
        let selected = registry.select_tools(&cfg, &[], "", false).await;
        assert!(selected.iter().any(|t| t.name == "messaging_send"));
        assert!(!selected.iter().any(|t| t.name == "shell_exec"));
    }

    #[tokio::test]
    async fn contextual_filter_admits_lexical_cue_matches() {
        let registry = ToolRegistry::new();
        registry.refresh(vec![tool("shell_exec"), tool("read_file")]).await;

        let cfg = AgentConfig::default();
        let selected = registry
            .select_tools(&cfg, &[], "please run a shell command for me", false)
            .await;
        assert!(selected.iter().any(|t| t.name == "shell_exec"));
    }

    #[tokio::test]
    async fn minimal_set_after_ack_excludes_messaging() {
        let registry = ToolRegistry::new();
        registry
            .refresh(vec![tool("messaging_send"), tool("task_complete"), tool("tool_recommend")])
            .await;

        let cfg = AgentConfig::default();
        let selected = registry.select_tools(&cfg, &[], "", true).await;
        assert!(!selected.iter().any(|t| t.name == "messaging_send"));
        assert!(selected.iter().any(|t| t.name == "task_complete"));
    }

    struct EchoExecutor;
    #[async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute(&self, tool_call: &ToolCall, _tool_def: &ToolDefinition) -> Result<ToolResult> {
            Ok(ToolResult::success(&tool_call.id, "ok"))
        }
    }

    /// Stands in for a remote `read_file` tool whose raw result reports
    /// an existing but empty file as `{"content": {"type": "text", "text": ""}}`.
    struct EmptyFileExecutor;
    #[async_trait]
    impl RawToolExecutor for EmptyFileExecutor {
        async fn invoke(&self, _tool_call: &ToolCall, _tool_def: &ToolDefinition) -> Result<serde_json::Value> {
            Ok(serde_json::json!({"content": {"type": "text", "text": ""}}))
        }
    }

    #[tokio::test]
    async fn empty_file_read_yields_explicit_marker_not_empty_text() {
        let executor = NormalizingToolExecutor::new(EmptyFileExecutor);
        let call = ToolCall {
            id: "c1".into(),
            name: "read_file".into(),
            input: serde_json::json!({"path": "empty.txt"}),
        };
        let def = tool("read_file");

        let result = executor.execute(&call, &def).await.unwrap();

        assert!(result.is_success());
        let content = result.content.expect("successful read has content");
        assert!(content.starts_with(crate::tool_types::EMPTY_FILE_MARKER));
        assert_ne!(content, "");
    }

    #[tokio::test]
    async fn stuck_params_streak_produces_synthetic_blocked_result() {
        let invoker = ToolInvoker::new(Arc::new(EchoExecutor), CircuitBreaker::new(Default::default()));
        let call = ToolCall {
            id: "c1".into(),
            name: "web_custom_tool".into(),
            input: serde_json::json!({"q": "x"}),
        };
        let def = tool("web_custom_tool");
        assert_eq!(def.source, ToolSource::Internal);

        for _ in 0..2 {
            let outcome = invoker.execute(&call, &def).await;
            assert!(outcome.result.is_success());
        }
        let outcome = invoker.execute(&call, &def).await;
        assert!(!outcome.result.is_success());
        assert!(outcome.result.synthetic);
        assert!(outcome.deferred_feedback.is_some());
        assert_eq!(invoker.stuck_detections().await, 1);
    }
}
