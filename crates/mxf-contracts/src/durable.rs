// Durable-state record shapes (§6 "Durable state").
//
// These are the truncated, writeback shapes persisted by the memory
// store (mxf-core::memory) — distinct from the in-RAM conversation
// model, which keeps the untruncated suffix.

use serde::{Deserialize, Serialize};

/// An agent's durable record: conversation suffix, bounded recent
/// observations, most recent reasoning/plan, and free-form notes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentDurableRecord {
    pub agent_id: String,
    /// Append-only; writeback only ever appends, never rewrites history.
    pub conversation_suffix: Vec<serde_json::Value>,
    pub recent_observations: Vec<String>,
    pub most_recent_reasoning: Option<String>,
    pub most_recent_plan: Option<String>,
    pub notes: Vec<String>,
    /// Count of messages already written to the durable store; the
    /// memory store only ever serializes the suffix past this index.
    pub last_saved_count: usize,
}

impl AgentDurableRecord {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Default::default()
        }
    }
}

/// Channel-scoped durable state: shared blackboard state, full
/// channel-level conversation history, and any registered MCP servers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChannelDurableState {
    pub channel_id: String,
    pub shared_state: serde_json::Map<String, serde_json::Value>,
    pub conversation_history: Vec<serde_json::Value>,
    pub mcp_servers: Option<Vec<McpServerRef>>,
}

impl ChannelDurableState {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            ..Default::default()
        }
    }
}

/// A registered remote MCP server, as discovered via
/// `mcp:external_server_register`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpServerRef {
    pub server_id: String,
    pub url: String,
    pub discovered_tool_names: Vec<String>,
}

/// Relationship state between two agents, optionally scoped to a
/// channel. Unique per `(agent_a, agent_b, channel_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RelationshipKey {
    pub agent_a: String,
    pub agent_b: String,
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RelationshipState {
    pub notes: Vec<String>,
    pub trust_signals: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_key_is_order_sensitive_but_hashable() {
        let a = RelationshipKey {
            agent_a: "x".into(),
            agent_b: "y".into(),
            channel_id: Some("c".into()),
        };
        let b = RelationshipKey {
            agent_a: "x".into(),
            agent_b: "y".into(),
            channel_id: None,
        };
        assert_ne!(a, b);
    }

    #[test]
    fn agent_record_starts_empty() {
        let rec = AgentDurableRecord::new("agent-1");
        assert_eq!(rec.last_saved_count, 0);
        assert!(rec.conversation_suffix.is_empty());
    }
}
