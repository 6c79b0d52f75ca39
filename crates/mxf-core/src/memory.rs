// C3 Memory Store (§4.3).
//
// In-RAM append-only log per agent. `ConversationMemory` owns the
// mutation contract (append/history/trim); durable writeback and
// secondary indexing are pluggable backends (`DurableStore`/
// `IndexSink`), mirroring the way the teacher's `MessageStore`/
// `EventEmitter` traits let `everruns-core::executor` stay
// backend-agnostic.

use crate::error::{AgentLoopError, Result};
use crate::message::{truncation_marker, ConversationMessage, MessageRole};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};

pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 100 * 1024;
pub const DEFAULT_DOCUMENT_CEILING_BYTES: usize = 12 * 1024 * 1024;
pub const DEFAULT_LARGE_CONTENT_BYTES: usize = 5 * 1024 * 1024;
pub const TRUNCATE_TAIL_MESSAGES: usize = 20;
pub const TRUNCATE_TAIL_OBSERVATIONS: usize = 10;
const INDEX_BATCH_SIZE: usize = 100;
const DEDUP_LOOKBACK: usize = 20;
const JACCARD_THRESHOLD: f64 = 0.8;

/// Durable writeback for an agent's conversation suffix. Implementations
/// might be a document store, a file, or (for tests) an in-memory map.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn persist_suffix(&self, agent_id: &str, suffix: &[ConversationMessage]) -> Result<()>;
    async fn load_all(&self, agent_id: &str) -> Result<Vec<ConversationMessage>>;
}

/// Secondary full-text index fan-out. Out of scope per spec §1 beyond
/// this seam; failures here are never fatal (`IndexError`).
#[async_trait]
pub trait IndexSink: Send + Sync {
    async fn index_batch(&self, messages: &[ConversationMessage]) -> Result<()>;
}

/// In-RAM conversation log with the append/trim/persist contract.
pub struct ConversationMemory {
    agent_id: String,
    messages: Vec<ConversationMessage>,
    observations: VecDeque<String>,
    max_history: usize,
    max_observations: usize,
    max_message_bytes: usize,
    last_saved_count: usize,
    dedup_enabled: bool,
}

impl ConversationMemory {
    pub fn new(agent_id: impl Into<String>, max_history: usize, max_observations: usize) -> Self {
        Self {
            agent_id: agent_id.into(),
            messages: Vec::new(),
            observations: VecDeque::new(),
            max_history,
            max_observations,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            last_saved_count: 0,
            dedup_enabled: false,
        }
    }

    /// Deduplication is disabled by default (§9 open question resolved:
    /// keep off, expose a flag).
    pub fn with_dedup_enabled(mut self, enabled: bool) -> Self {
        self.dedup_enabled = enabled;
        self
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Validates size, optionally deduplicates, and appends. Oversize
    /// content is replaced by a placeholder that preserves role and
    /// metadata rather than rejected outright.
    pub fn append(&mut self, msg: ConversationMessage) -> Result<()> {
        let msg = msg.enforce_size_cap(self.max_message_bytes);

        if self.dedup_enabled && self.is_duplicate(&msg) {
            return Ok(());
        }

        self.messages.push(msg);
        Ok(())
    }

    /// Never collapses tool results or assistant messages bearing tool
    /// calls; compares normalized content plus role for similarity.
    fn is_duplicate(&self, candidate: &ConversationMessage) -> bool {
        if candidate.role == MessageRole::Tool || candidate.has_tool_calls() {
            return false;
        }
        let lookback = self.messages.len().saturating_sub(DEDUP_LOOKBACK);
        self.messages[lookback..]
            .iter()
            .filter(|m| m.role == candidate.role)
            .any(|m| jaccard_similarity(&m.content, &candidate.content) >= JACCARD_THRESHOLD)
    }

    pub fn push_observation(&mut self, observation: impl Into<String>) {
        self.observations.push_back(observation.into());
        while self.observations.len() > self.max_observations {
            self.observations.pop_front();
        }
    }

    pub fn observations(&self) -> Vec<String> {
        self.observations.iter().cloned().collect()
    }

    /// Returns a snapshot copy; readers never see partial writes.
    pub fn history(&self) -> Vec<ConversationMessage> {
        self.messages.clone()
    }

    /// Removes oldest complete conversation blocks until the history fits
    /// `maxHistory` (system messages never count against the cap or get
    /// removed — P4).
    pub fn trim(&mut self) {
        let system_count = self.messages.iter().filter(|m| m.role == MessageRole::System).count();
        while self.messages.len() > self.max_history + system_count {
            if !self.remove_oldest_block() {
                break;
            }
        }
    }

    fn remove_oldest_block(&mut self) -> bool {
        let Some(start) = self.messages.iter().position(|m| m.role != MessageRole::System) else {
            return false;
        };

        let mut end = start;
        let first = &self.messages[start];
        if first.role == MessageRole::Assistant && first.has_tool_calls() {
            let k = first.tool_calls.as_ref().unwrap().len();
            let mut matched = 0usize;
            let mut idx = start + 1;
            while idx < self.messages.len() && matched < k {
                if self.messages[idx].role == MessageRole::Tool {
                    matched += 1;
                }
                if self.messages[idx].role != MessageRole::System {
                    end = idx;
                }
                idx += 1;
            }
        }

        self.messages = self
            .messages
            .iter()
            .enumerate()
            .filter(|(idx, m)| !(*idx >= start && *idx <= end && m.role != MessageRole::System))
            .map(|(_, m)| m.clone())
            .collect();
        true
    }

    /// Writes only the suffix not yet durable. If the accumulated suffix
    /// would exceed the safety ceiling, aggressively truncates to the
    /// tail and resets `last_saved_count` (QuotaError path — never fatal).
    pub async fn persist(&mut self, store: &dyn DurableStore) -> Result<()> {
        let mut suffix: Vec<ConversationMessage> = self.messages[self.last_saved_count..]
            .iter()
            .cloned()
            .map(|m| {
                if m.content.len() > DEFAULT_LARGE_CONTENT_BYTES {
                    let original_size = m.content.len();
                    let mut m = m;
                    m.content = truncation_marker(original_size);
                    m
                } else {
                    m
                }
            })
            .collect();

        let total_bytes: usize = suffix.iter().map(|m| m.content.len()).sum();
        if total_bytes > DEFAULT_DOCUMENT_CEILING_BYTES {
            let tail_start = self.messages.len().saturating_sub(TRUNCATE_TAIL_MESSAGES);
            self.messages.drain(0..tail_start);
            while self.observations.len() > TRUNCATE_TAIL_OBSERVATIONS {
                self.observations.pop_front();
            }
            self.last_saved_count = 0;
            suffix = self.messages.clone();
            tracing::warn!(agent_id = %self.agent_id, "memory store truncated to tail: quota ceiling exceeded");
        }

        store
            .persist_suffix(&self.agent_id, &suffix)
            .await
            .map_err(|e| AgentLoopError::quota(e.to_string()))?;

        if total_bytes <= DEFAULT_DOCUMENT_CEILING_BYTES {
            self.last_saved_count = self.messages.len();
        }
        Ok(())
    }

    /// Loads prior history for indexing only — it is never restored into
    /// active context. Historical messages are pushed to the secondary
    /// index in batches with inter-batch yielding so the event-bus thread
    /// is never blocked by a large backfill.
    pub async fn load_for_indexing(&self, store: &dyn DurableStore, index: &dyn IndexSink) -> Result<usize> {
        let history = store.load_all(&self.agent_id).await?;
        let mut indexed = 0;
        for batch in history.chunks(INDEX_BATCH_SIZE) {
            if let Err(err) = index.index_batch(batch).await {
                tracing::warn!(agent_id = %self.agent_id, error = %err, "secondary index write failed");
            } else {
                indexed += batch.len();
            }
            tokio::task::yield_now().await;
        }
        Ok(indexed)
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}

fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_types::ToolCall;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryDurableStore {
        docs: Mutex<HashMap<String, Vec<ConversationMessage>>>,
    }

    #[async_trait]
    impl DurableStore for InMemoryDurableStore {
        async fn persist_suffix(&self, agent_id: &str, suffix: &[ConversationMessage]) -> Result<()> {
            self.docs
                .lock()
                .unwrap()
                .entry(agent_id.to_string())
                .or_default()
                .extend(suffix.iter().cloned());
            Ok(())
        }

        async fn load_all(&self, agent_id: &str) -> Result<Vec<ConversationMessage>> {
            Ok(self.docs.lock().unwrap().get(agent_id).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn append_enforces_p4_after_trim() {
        let mut mem = ConversationMemory::new("agent-1", 3, 10);
        mem.append(ConversationMessage::system("sys")).unwrap();
        for i in 0..10 {
            mem.append(ConversationMessage::user(format!("msg {i}"))).unwrap();
            mem.trim();
        }
        assert!(mem.len() <= 3 + 1);
    }

    #[test]
    fn trim_preserves_pairing_across_tool_batches() {
        let mut mem = ConversationMemory::new("agent-1", 2, 10);
        for i in 0..5 {
            let call = ToolCall {
                id: format!("call-{i}"),
                name: "read_file".into(),
                input: serde_json::json!({}),
            };
            mem.append(ConversationMessage::user(format!("turn {i}"))).unwrap();
            mem.append(ConversationMessage::assistant_with_tool_calls("", vec![call.clone()])).unwrap();
            mem.append(ConversationMessage::tool_result(&call.id, "result")).unwrap();
            mem.trim();
        }
        let history = mem.history();
        assert!(crate::message::validate_pairing(&history));
        assert!(crate::message::validate_no_consecutive_assistants(&history));
    }

    #[test]
    fn dedup_skips_near_identical_user_messages_when_enabled() {
        let mut mem = ConversationMemory::new("agent-1", 50, 10).with_dedup_enabled(true);
        mem.append(ConversationMessage::user("please summarize the quarterly report")).unwrap();
        mem.append(ConversationMessage::user("please summarize the quarterly report now")).unwrap();
        assert_eq!(mem.len(), 1);
    }

    #[test]
    fn dedup_never_collapses_tool_call_bearing_assistant_messages() {
        let mut mem = ConversationMemory::new("agent-1", 50, 10).with_dedup_enabled(true);
        let call = ToolCall {
            id: "c1".into(),
            name: "read_file".into(),
            input: serde_json::json!({}),
        };
        mem.append(ConversationMessage::assistant_with_tool_calls("reading file", vec![call.clone()])).unwrap();
        mem.append(ConversationMessage::assistant_with_tool_calls("reading file", vec![call])).unwrap();
        assert_eq!(mem.len(), 2);
    }

    #[tokio::test]
    async fn persist_only_writes_unsaved_suffix() {
        let store = InMemoryDurableStore::default();
        let mut mem = ConversationMemory::new("agent-1", 500, 10);
        mem.append(ConversationMessage::user("one")).unwrap();
        mem.persist(&store).await.unwrap();
        mem.append(ConversationMessage::user("two")).unwrap();
        mem.persist(&store).await.unwrap();

        let saved = store.load_all("agent-1").await.unwrap();
        assert_eq!(saved.len(), 2);
    }

    #[tokio::test]
    async fn load_for_indexing_does_not_restore_into_active_context() {
        let store = InMemoryDurableStore::default();
        store
            .persist_suffix("agent-1", &[ConversationMessage::user("old message")])
            .await
            .unwrap();

        struct CountingIndex(Mutex<usize>);
        #[async_trait]
        impl IndexSink for CountingIndex {
            async fn index_batch(&self, messages: &[ConversationMessage]) -> Result<()> {
                *self.0.lock().unwrap() += messages.len();
                Ok(())
            }
        }
        let index = CountingIndex(Mutex::new(0));

        let mem = ConversationMemory::new("agent-1", 500, 10);
        let indexed = mem.load_for_indexing(&store, &index).await.unwrap();
        assert_eq!(indexed, 1);
        assert_eq!(*index.0.lock().unwrap(), 1);
        assert!(mem.is_empty());
    }
}
