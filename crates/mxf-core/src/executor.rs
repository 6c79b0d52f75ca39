// C6 Agent Reasoning Loop (§4.6) — the core orchestrator.
//
// Mirrors the shape of everruns-core::executor::AgentLoop (config +
// event emitter + message store + llm driver + tool executor, a `run`
// entry point that loops until a terminal condition), generalized from
// "call LLM, execute tools, repeat until no tool calls" to the full
// iteration algorithm: phase-gated tool selection, reasoning-text tool
// intent folding, embedded-JSON tool-call scanning, intent enhancement,
// the circuit breaker, and the completion heuristic.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::AgentConfig;
use crate::error::Result;
use crate::events::LoopEvent;
use crate::memory::ConversationMemory;
use crate::message::{ConversationMessage, MessageRole};
use crate::tool_types::{ToolCall, ToolDefinition, ToolResult};
use crate::tools::{ToolInvoker, ToolRegistry};
use crate::traits::{EventEmitter, LlmCallConfig, LlmMessage, LlmProvider};

/// How many of the most recent messages are scanned for tool-name
/// acknowledgements when selecting the contextual tool set (§4.4).
const RECENT_ACK_WINDOW: usize = 5;
/// Cap on the recent-actions digest folded into the assembled context.
const RECENT_ACTIONS_DIGEST_CAP: usize = 8;
/// Response length under which, combined with no tool calls, the short-
/// response-no-tool-usage completion signal fires.
const SHORT_RESPONSE_CHARS: usize = 200;
/// Consecutive no-tool-call iterations considered "sustained inactivity".
const SUSTAINED_INACTIVITY_ITERATIONS: usize = 2;
/// Per §9's resolved open question: a repeated-response counter must
/// reach 2 (not 1) before the repetition signal contributes.
const REPEAT_PATTERN_THRESHOLD: u32 = 2;

const COMPLETION_SCORE_THRESHOLD: f64 = 0.7;
const AUTO_COMPLETE_THRESHOLD: f64 = 0.8;

const EXPLICIT_COMPLETION_PHRASES: &[&str] = &[
    "task is complete",
    "task complete",
    "i have completed",
    "i've completed",
    "all done",
    "this completes",
    "finished the task",
    "completed successfully",
];

const WAITING_PHRASES: &[&str] = &[
    "waiting for",
    "let me know if",
    "please let me know",
    "awaiting your",
    "i'll wait for",
    "standing by",
];

const SHORT_ACK_PHRASES: &[&str] = &[
    "ok", "okay", "thanks", "thank you", "got it", "sounds good", "noted", "understood", "great",
];

/// Why the loop stopped iterating.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// A `task_complete` call was observed (step 8).
    TaskCompleted,
    /// `maxIterations` was reached without another exit condition.
    MaxIterationsReached,
    /// The task was cancelled externally and no task-prompt was pinned.
    Cancelled,
    /// The completion heuristic scored ≥ 0.7; `auto_completed` is true
    /// only when it additionally scored ≥ 0.8 and the agent's role
    /// permits auto-completion.
    CompletionHeuristic { score: f64, auto_completed: bool },
}

/// The result of a full `run()` call (§4.6 "Return value is the text
/// content of the last assistant message").
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub exit: LoopExit,
    pub iterations: usize,
    pub final_text: Option<String>,
}

/// Per-run task context (§3 "Task", "ControlLoop"). `pinned` mirrors
/// "no task-prompt is pinned" in the step-1 cancellation check: a
/// pinned task-prompt keeps the loop running one more iteration even
/// after external cancellation so the agent can acknowledge it.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: String,
    pub summary: String,
    pub pinned: bool,
}

/// Externally-observable cancellation flag, set by the coordinator or
/// transport layer when a `task:cancelled` event arrives.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything that varies per invocation of the loop: the triggering
/// task (if any), an explicit phase gate forced by the ORPAR machine
/// (§4.7's `updateAllowedTools`, consumed here rather than owned here),
/// and the cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct LoopTrigger {
    pub task: Option<TaskContext>,
    /// When `Some`, this list is used verbatim as the allow-list for
    /// this run (a phase gate always wins over contextual filtering,
    /// and forces a cache refresh — §4.6 step 2).
    pub phase_gate: Option<Vec<String>>,
    /// The ORPAR phase name driving this run, if any (§4.7). Surfaced
    /// to the LLM via `AgentContext::phase`; otherwise unused here.
    pub phase_label: Option<String>,
    pub cancellation: CancellationFlag,
}

/// Builds the per-iteration prompt context (§4.6 step 3). Kept as a
/// plain data value so tests can assert on its shape without invoking
/// the LLM provider.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub system_prompt: String,
    pub agent_id: String,
    pub task_summary: Option<String>,
    pub dialogue: Vec<ConversationMessage>,
    pub recent_actions: Vec<String>,
    pub phase: Option<String>,
    pub tools: Vec<ToolDefinition>,
}

struct CompletionTracker {
    response_hash_counts: HashMap<u64, u32>,
    recent_scores: VecDeque<f64>,
    consecutive_no_tool_iterations: usize,
}

impl CompletionTracker {
    fn new() -> Self {
        Self {
            response_hash_counts: HashMap::new(),
            recent_scores: VecDeque::with_capacity(3),
            consecutive_no_tool_iterations: 0,
        }
    }

    fn record_score(&mut self, score: f64) {
        if self.recent_scores.len() == 3 {
            self.recent_scores.pop_front();
        }
        self.recent_scores.push_back(score);
    }

    fn is_confidence_uptrend(&self) -> bool {
        self.recent_scores.len() == 3
            && self.recent_scores[0] < self.recent_scores[1]
            && self.recent_scores[1] < self.recent_scores[2]
    }
}

fn normalized_hash(text: &str) -> u64 {
    let normalized: String = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("sha256 digest is at least 8 bytes"))
}

/// Scans `text` for syntactically balanced `{...}` JSON objects,
/// tracking quote and backslash-escape state so braces inside string
/// literals don't throw off the balance count. Returns the raw slice of
/// each top-level candidate object found.
fn scan_balanced_json_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut candidates = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            candidates.push(&text[s..=i]);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    candidates
}

/// Converts a balanced-JSON candidate declaring a known tool (the MCP
/// `{type: tool_use, id, name, input}` shape, or the bare `{name,
/// input}` shorthand) into a `ToolCall`. Returns `Err` with the raw
/// snippet when the candidate looks tool-call-shaped but fails to parse
/// (used to synthesize the self-describing correction message).
fn try_parse_embedded_tool_call(candidate: &str, known_tools: &[ToolDefinition]) -> Option<std::result::Result<ToolCall, String>> {
    let value: serde_json::Value = match serde_json::from_str(candidate) {
        Ok(v) => v,
        Err(_) => {
            // Only treat as a malformed tool-call candidate if it at least
            // mentions a known tool name; otherwise it's prose that
            // happened to contain braces.
            if known_tools.iter().any(|t| candidate.contains(&t.name)) {
                return Some(Err(candidate.to_string()));
            }
            return None;
        }
    };
    let obj = value.as_object()?;
    let name = obj.get("name").and_then(|v| v.as_str())?;
    if !known_tools.iter().any(|t| t.name == name) {
        return None;
    }
    let input = obj.get("input").cloned().unwrap_or(serde_json::json!({}));
    let id = obj
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
    Some(Ok(ToolCall {
        id,
        name: name.to_string(),
        input,
    }))
}

/// Deterministic intent rewriter (§4.6 step 6): discovery tools take an
/// `intent` field; this normalizes whitespace and, when a task is
/// active, grounds the intent in the task summary so the rewritten
/// intent is reproducible from the same inputs rather than left to the
/// model's phrasing on any given turn.
fn enhance_intent(intent: &str, task_summary: Option<&str>) -> String {
    let normalized = intent.split_whitespace().collect::<Vec<_>>().join(" ");
    match task_summary {
        Some(summary) if !normalized.to_lowercase().contains(&summary.to_lowercase()) => {
            format!("{normalized} (in service of: {summary})")
        }
        _ => normalized,
    }
}

fn is_tool_acknowledgement(last: &ConversationMessage) -> bool {
    if last.role != MessageRole::User {
        return false;
    }
    let trimmed = last.content.trim().to_lowercase();
    trimmed.len() <= 20 && SHORT_ACK_PHRASES.iter().any(|p| trimmed == *p || trimmed.starts_with(p))
}

fn recent_ack_lines(history: &[ConversationMessage]) -> Vec<String> {
    history
        .iter()
        .rev()
        .take(RECENT_ACK_WINDOW)
        .map(|m| m.content.clone())
        .collect()
}

fn recent_conversation_text(history: &[ConversationMessage]) -> String {
    history
        .iter()
        .rev()
        .take(RECENT_ACK_WINDOW)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Weighted completion-heuristic scoring (§4.6 step 9). Returns the
/// total score and the names of the signals that fired, for logging.
fn score_completion(
    text: &str,
    tracker: &mut CompletionTracker,
    had_tool_calls: bool,
) -> (f64, Vec<&'static str>) {
    let mut score = 0.0;
    let mut fired = Vec::new();
    let lower = text.to_lowercase();

    if EXPLICIT_COMPLETION_PHRASES.iter().any(|p| lower.contains(p)) {
        score += 0.3;
        fired.push("explicit_completion_phrase");
    }
    if WAITING_PHRASES.iter().any(|p| lower.contains(p)) {
        score += 0.2;
        fired.push("waiting_phrase");
    }

    let hash = normalized_hash(text);
    let count = tracker.response_hash_counts.entry(hash).or_insert(0);
    *count += 1;
    if *count >= REPEAT_PATTERN_THRESHOLD {
        score += 0.3;
        fired.push("repeated_response_pattern");
    }

    if !had_tool_calls {
        tracker.consecutive_no_tool_iterations += 1;
    } else {
        tracker.consecutive_no_tool_iterations = 0;
    }
    if tracker.consecutive_no_tool_iterations >= SUSTAINED_INACTIVITY_ITERATIONS {
        score += 0.2;
        fired.push("sustained_inactivity");
    }

    if text.len() < SHORT_RESPONSE_CHARS && !had_tool_calls {
        score += 0.1;
        fired.push("short_response_no_tool_usage");
    }

    if tracker.is_confidence_uptrend() {
        score += 0.1;
        fired.push("confidence_uptrend");
    }

    tracker.record_score(score);
    (score, fired)
}

/// The reasoning loop for a single agent. Transport-agnostic: it reads
/// and appends to its own `ConversationMemory`, consults its own
/// `ToolRegistry`/`ToolInvoker`, and emits `LoopEvent`s; it has no idea
/// whether those events ever reach a server.
pub struct ReasoningLoop<L: LlmProvider> {
    agent_id: String,
    memory: Arc<Mutex<ConversationMemory>>,
    registry: Arc<ToolRegistry>,
    invoker: Arc<ToolInvoker>,
    emitter: Arc<dyn EventEmitter>,
    llm: Arc<L>,
}

impl<L: LlmProvider> ReasoningLoop<L> {
    pub fn new(
        agent_id: impl Into<String>,
        memory: Arc<Mutex<ConversationMemory>>,
        registry: Arc<ToolRegistry>,
        invoker: Arc<ToolInvoker>,
        emitter: Arc<dyn EventEmitter>,
        llm: Arc<L>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            memory,
            registry,
            invoker,
            emitter,
            llm,
        }
    }

    /// Runs bounded iterations (`config.max_iterations`) of the loop
    /// against the given trigger, returning once a terminal condition
    /// (§4.6 step 10) is reached.
    pub async fn run(&self, config: &AgentConfig, trigger: LoopTrigger) -> Result<LoopOutcome> {
        self.emitter.emit(LoopEvent::loop_started(self.agent_id.clone())).await?;

        let mut tracker = CompletionTracker::new();
        let mut last_assistant_text: Option<String> = None;
        let mut iteration = 0usize;

        let exit = loop {
            iteration += 1;

            // Step 1: cancellation check.
            if trigger.cancellation.is_cancelled() {
                let pinned = trigger.task.as_ref().is_some_and(|t| t.pinned);
                if !pinned {
                    break LoopExit::Cancelled;
                }
            }

            if iteration > config.max_iterations {
                warn!(agent_id = %self.agent_id, max = config.max_iterations, "max iterations reached");
                break LoopExit::MaxIterationsReached;
            }

            self.emitter
                .emit(LoopEvent::iteration_started(self.agent_id.clone(), iteration))
                .await?;

            let history = self.memory.lock().await.history();

            // Step 2: tool-set selection.
            let minimal_after_ack = history.last().is_some_and(is_tool_acknowledgement);
            if trigger.phase_gate.is_some() {
                // A phase gate always forces a cache refresh (§4.6 step 2,
                // §4.7 "acting... refresh the tool cache").
                self.registry.refresh(config.tools.clone()).await;
            }
            let tools = if let Some(gate) = &trigger.phase_gate {
                let allowed: std::collections::HashSet<&str> = gate.iter().map(String::as_str).collect();
                self.registry
                    .snapshot()
                    .await
                    .into_iter()
                    .filter(|t| allowed.contains(t.name.as_str()))
                    .collect()
            } else {
                self.registry
                    .select_tools(
                        config,
                        &recent_ack_lines(&history),
                        &recent_conversation_text(&history),
                        minimal_after_ack,
                    )
                    .await
            };

            // Step 3: context assembly.
            let context = AgentContext {
                system_prompt: config.system_prompt.clone(),
                agent_id: self.agent_id.clone(),
                task_summary: trigger.task.as_ref().map(|t| t.summary.clone()),
                dialogue: history.iter().filter(|m| m.role != MessageRole::System).cloned().collect(),
                recent_actions: recent_tool_names(&history, RECENT_ACTIONS_DIGEST_CAP),
                phase: trigger.phase_label.clone(),
                tools: tools.clone(),
            };

            // Step 4: LLM call.
            self.emitter
                .emit(LoopEvent::llm_call_started(self.agent_id.clone(), iteration))
                .await?;
            let llm_messages = build_llm_messages(&context);
            let llm_config = LlmCallConfig {
                model: config.model.clone(),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                tools: tools.clone(),
                reasoning_enabled: config.reasoning.enabled,
            };
            let response = self.llm.chat_completion(llm_messages, &llm_config).await?;

            let mut tool_calls = response.tool_calls.clone().unwrap_or_default();

            if let Some(reasoning_text) = &response.reasoning_text {
                self.emitter
                    .emit(LoopEvent::reasoning_emitted(self.agent_id.clone(), iteration, reasoning_text.clone()))
                    .await?;
                // Only fold reasoning-derived tool intents in when the
                // provider returned no structured calls of its own.
                if tool_calls.is_empty() {
                    tool_calls.extend(extract_tool_calls_from_text(reasoning_text, &tools));
                }
            }

            // Step 5: tool-call extraction from assistant text, plus
            // malformed-JSON correction messages.
            let (scanned_calls, corrections) = scan_tool_calls_with_corrections(&response.text, &tools);
            tool_calls.extend(scanned_calls);

            self.emitter
                .emit(LoopEvent::llm_call_completed(self.agent_id.clone(), iteration, !tool_calls.is_empty()))
                .await?;

            // Step 6: intent enhancement.
            for call in &mut tool_calls {
                if let Some(obj) = call.input.as_object_mut() {
                    if let Some(serde_json::Value::String(intent)) = obj.get("intent").cloned() {
                        obj.insert(
                            "intent".to_string(),
                            serde_json::Value::String(enhance_intent(&intent, context.task_summary.as_deref())),
                        );
                    }
                }
            }

            // Step 7: persist assistant turn (single append, preserves M1).
            let assistant_msg = if tool_calls.is_empty() {
                ConversationMessage::assistant(response.text.clone())
            } else {
                ConversationMessage::assistant_with_tool_calls(response.text.clone(), tool_calls.clone())
            };
            {
                let mut mem = self.memory.lock().await;
                mem.append(assistant_msg)?;
                mem.trim();
            }
            if !response.text.is_empty() {
                last_assistant_text = Some(response.text.clone());
            }

            for correction in &corrections {
                warn!(agent_id = %self.agent_id, "malformed embedded tool-call JSON");
                let _ = correction;
            }

            if tool_calls.is_empty() {
                self.emitter
                    .emit(LoopEvent::iteration_completed(self.agent_id.clone(), iteration, false))
                    .await?;

                // Step 9: completion heuristic (only runs when the
                // iteration produced no tool calls). A score under
                // threshold does not end the loop — the agent may simply
                // be mid-conversation; it keeps iterating up to the cap.
                let (score, signals) = score_completion(&response.text, &mut tracker, false);
                info!(agent_id = %self.agent_id, score, ?signals, "completion heuristic scored");
                if score >= COMPLETION_SCORE_THRESHOLD {
                    let role = config.role;
                    let auto_completed = score >= AUTO_COMPLETE_THRESHOLD && role.may_auto_complete();
                    break LoopExit::CompletionHeuristic { score, auto_completed };
                }
                continue;
            }

            // Step 8: execute tool calls.
            score_completion(&response.text, &mut tracker, true); // keep the inactivity counter honest
            let mut task_completed = false;
            let mut deferred_feedback = Vec::new();

            for call in &tool_calls {
                self.emitter
                    .emit(LoopEvent::tool_started(self.agent_id.clone(), call.id.clone(), call.name.clone()))
                    .await?;

                let tool_def = self.registry.find(&call.name).await.unwrap_or_else(|| {
                    ToolDefinition::internal(call.name.clone(), "unknown tool", serde_json::json!({}))
                });
                let outcome = self.invoker.execute(call, &tool_def).await;

                self.emitter
                    .emit(LoopEvent::tool_completed(self.agent_id.clone(), call.id.clone(), outcome.result.is_success()))
                    .await?;
                if let Some(feedback) = outcome.deferred_feedback {
                    self.emitter
                        .emit(LoopEvent::breaker_tripped(self.agent_id.clone(), call.name.clone(), feedback.clone()))
                        .await?;
                    deferred_feedback.push(feedback);
                }

                append_tool_result(&self.memory, &outcome.result).await?;

                if call.name == "task_complete" {
                    task_completed = true;
                }
            }

            for correction in corrections {
                deferred_feedback.push(format!(
                    "the following JSON in your previous response could not be parsed as a tool call: {correction}"
                ));
            }
            for feedback in deferred_feedback {
                let mut mem = self.memory.lock().await;
                mem.append(ConversationMessage::user(feedback))?;
                mem.trim();
            }

            self.emitter
                .emit(LoopEvent::iteration_completed(self.agent_id.clone(), iteration, !task_completed))
                .await?;

            if task_completed {
                let task_id = trigger.task.as_ref().map(|t| t.task_id.clone()).unwrap_or_default();
                self.emitter.emit(LoopEvent::task_completed(self.agent_id.clone(), task_id)).await?;
                break LoopExit::TaskCompleted;
            }
        };

        self.emitter.emit(LoopEvent::loop_completed(self.agent_id.clone(), iteration)).await?;

        Ok(LoopOutcome {
            exit,
            iterations: iteration,
            final_text: last_assistant_text,
        })
    }
}

async fn append_tool_result(memory: &Arc<Mutex<ConversationMemory>>, result: &ToolResult) -> Result<()> {
    let content = match (&result.content, &result.error) {
        (Some(content), _) => content.clone(),
        (None, Some(error)) => format!("error: {error}"),
        (None, None) => String::new(),
    };
    let mut mem = memory.lock().await;
    mem.append(ConversationMessage::tool_result(&result.tool_call_id, content))?;
    mem.trim();
    Ok(())
}

fn recent_tool_names(history: &[ConversationMessage], cap: usize) -> Vec<String> {
    history
        .iter()
        .rev()
        .filter_map(|m| m.tool_calls.as_ref())
        .flatten()
        .map(|c| c.name.clone())
        .take(cap)
        .collect()
}

fn build_llm_messages(context: &AgentContext) -> Vec<LlmMessage> {
    let mut messages = Vec::with_capacity(context.dialogue.len() + 1);
    if !context.system_prompt.is_empty() {
        messages.push(LlmMessage {
            role: crate::traits::LlmMessageRole::System,
            content: context.system_prompt.clone(),
            tool_calls: None,
            tool_call_id: None,
        });
    }
    messages.extend(context.dialogue.iter().map(LlmMessage::from));
    messages
}

fn extract_tool_calls_from_text(text: &str, known_tools: &[ToolDefinition]) -> Vec<ToolCall> {
    let (calls, _) = scan_tool_calls_with_corrections(text, known_tools);
    calls
}

fn scan_tool_calls_with_corrections(text: &str, known_tools: &[ToolDefinition]) -> (Vec<ToolCall>, Vec<String>) {
    let mut calls = Vec::new();
    let mut corrections = Vec::new();
    for candidate in scan_balanced_json_objects(text) {
        match try_parse_embedded_tool_call(candidate, known_tools) {
            Some(Ok(call)) => calls.push(call),
            Some(Err(snippet)) => corrections.push(snippet),
            None => {}
        }
    }
    (calls, corrections)
}
