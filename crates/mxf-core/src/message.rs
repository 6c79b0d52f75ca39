// Conversation message model (§3 "ConversationMessage").
//
// Immutable once appended. Invariant M1: every assistant message bearing
// `tool_calls` of length k is followed, in order, by exactly k tool
// messages whose `tool_call_id`s are a permutation of the assistant's
// tool-call IDs, with no interleaving message of other roles. Invariant
// M2: no two consecutive assistant messages.

use crate::tool_types::ToolCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A byte-size-bounded placeholder that replaces oversize content in
/// `append`, preserving role and metadata.
pub fn truncation_marker(original_size: usize) -> String {
    format!("[truncated: original content was {original_size} bytes]")
}

/// The explicit "empty, not missing" marker for reading an existing but
/// empty file (§4.4, scenario 2) — callers must not treat this as an error.
/// Defined in `tool_types` (the normalizer boundary); re-exported here
/// since it describes message content.
pub use crate::tool_types::EMPTY_FILE_MARKER;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new(MessageRole::Assistant, content);
        msg.tool_calls = Some(tool_calls);
        msg
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(MessageRole::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            tool_calls: None,
            tool_call_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty())
    }

    pub fn is_tool_result_for(&self, tool_call_id: &str) -> bool {
        self.role == MessageRole::Tool && self.tool_call_id.as_deref() == Some(tool_call_id)
    }

    /// Caps content to `max_bytes`, replacing it with a truncation marker
    /// that preserves role and metadata when it would exceed the cap.
    pub fn enforce_size_cap(mut self, max_bytes: usize) -> Self {
        if self.content.len() > max_bytes {
            let original_size = self.content.len();
            self.content = truncation_marker(original_size);
            self.metadata
                .insert("truncated".into(), serde_json::Value::Bool(true));
            self.metadata.insert(
                "original_size".into(),
                serde_json::Value::from(original_size as u64),
            );
        }
        self
    }
}

/// Validates invariant M1 over a full history: every assistant message
/// bearing tool calls must be immediately followed by exactly that many
/// tool messages whose IDs are a permutation of the call IDs.
pub fn validate_pairing(history: &[ConversationMessage]) -> bool {
    let mut i = 0;
    while i < history.len() {
        let msg = &history[i];
        if msg.role == MessageRole::Assistant {
            if let Some(calls) = &msg.tool_calls {
                if calls.is_empty() {
                    i += 1;
                    continue;
                }
                let expected: std::collections::HashSet<&str> =
                    calls.iter().map(|c| c.id.as_str()).collect();
                let window = &history[i + 1..];
                if window.len() < calls.len() {
                    return false;
                }
                let mut seen = std::collections::HashSet::new();
                for msg in &window[..calls.len()] {
                    if msg.role != MessageRole::Tool {
                        return false;
                    }
                    let Some(id) = &msg.tool_call_id else {
                        return false;
                    };
                    if !expected.contains(id.as_str()) || !seen.insert(id.clone()) {
                        return false;
                    }
                }
                i += 1 + calls.len();
                continue;
            }
        }
        i += 1;
    }
    true
}

/// Validates invariant M2: no two consecutive assistant messages.
pub fn validate_no_consecutive_assistants(history: &[ConversationMessage]) -> bool {
    history
        .windows(2)
        .all(|w| !(w[0].role == MessageRole::Assistant && w[1].role == MessageRole::Assistant))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "read_file".to_string(),
            input: serde_json::json!({}),
        }
    }

    #[test]
    fn pairing_holds_for_matched_batch() {
        let history = vec![
            ConversationMessage::user("hi"),
            ConversationMessage::assistant_with_tool_calls("", vec![call("a"), call("b")]),
            ConversationMessage::tool_result("a", "result a"),
            ConversationMessage::tool_result("b", "result b"),
        ];
        assert!(validate_pairing(&history));
        assert!(validate_no_consecutive_assistants(&history));
    }

    #[test]
    fn pairing_rejects_interleaved_role() {
        let history = vec![
            ConversationMessage::assistant_with_tool_calls("", vec![call("a"), call("b")]),
            ConversationMessage::tool_result("a", "result a"),
            ConversationMessage::user("interrupting"),
            ConversationMessage::tool_result("b", "result b"),
        ];
        assert!(!validate_pairing(&history));
    }

    #[test]
    fn m2_rejects_consecutive_assistants() {
        let history = vec![
            ConversationMessage::assistant("one"),
            ConversationMessage::assistant("two"),
        ];
        assert!(!validate_no_consecutive_assistants(&history));
    }

    #[test]
    fn oversize_content_is_replaced_with_marker() {
        let msg = ConversationMessage::user("x".repeat(200)).enforce_size_cap(100);
        assert!(msg.content.starts_with("[truncated"));
        assert_eq!(msg.metadata.get("original_size").unwrap(), &serde_json::json!(200));
    }
}
