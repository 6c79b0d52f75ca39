// Wire event envelope exchanged with the exchange server (§6).
//
// Every frame sent or received over the transport gateway carries this
// shape. `data` is intentionally an opaque JSON value here; each event
// family module knows how to parse its own `data` payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event as it appears on the wire, in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub timestamp: i64,
    pub agent_id: String,
    pub channel_id: String,
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new(
        event_type: impl Into<String>,
        agent_id: impl Into<String>,
        channel_id: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event_type.into(),
            timestamp: Utc::now().timestamp_millis(),
            agent_id: agent_id.into(),
            channel_id: channel_id.into(),
            data,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// The families of event names recognized by the core (§6, subset shown
/// in spec). Only events whose `event_type` matches one of these
/// constants may cross a `ChannelMonitor`'s whitelist; anything else is
/// rejected at subscription time with a warning (see `mxf_core::bus`).
pub mod event_names {
    // Agent lifecycle
    /// Handshake success/failure (§4.2), distinct from `AGENT_REGISTERED`:
    /// auth is presenting `(domainKey, userCredentials)` before the agent
    /// is even eligible to register.
    pub const AGENT_AUTH_SUCCESS: &str = "agent:auth_success";
    pub const AGENT_AUTH_FAILED: &str = "agent:auth_failed";
    pub const AGENT_REGISTER: &str = "agent:register";
    pub const AGENT_REGISTERED: &str = "agent:registered";
    pub const AGENT_CONNECTED: &str = "agent:connected";
    pub const AGENT_DISCONNECTED: &str = "agent:disconnected";
    pub const AGENT_STATUS_CHANGE: &str = "agent:status_change";
    pub const AGENT_REGISTRATION_FAILED: &str = "agent:registration_failed";
    pub const AGENT_ERROR: &str = "agent:error";
    pub const AGENT_ALLOWED_TOOLS_UPDATE: &str = "agent:allowed_tools_update";

    // Channel provisioning
    pub const CHANNEL_CREATE: &str = "channel:create";
    pub const CHANNEL_CREATED: &str = "channel:created";
    pub const CHANNEL_CREATION_FAILED: &str = "channel:creation_failed";

    // Credential issuance
    pub const KEY_GENERATE: &str = "key:generate";
    pub const KEY_GENERATED: &str = "key:generated";
    pub const KEY_GENERATION_FAILED: &str = "key:generation_failed";

    // Content delivery
    pub const MESSAGE_AGENT: &str = "message:agent_message";
    pub const MESSAGE_CHANNEL: &str = "message:channel_message";
    pub const MESSAGE_PERSIST_BULK: &str = "message:persist_bulk_channel_messages_request";

    // Task lifecycle
    pub const TASK_ASSIGNED: &str = "task:assigned";
    pub const TASK_STARTED: &str = "task:started";
    pub const TASK_PROGRESS_UPDATED: &str = "task:progress_updated";
    pub const TASK_COMPLETED: &str = "task:completed";
    pub const TASK_FAILED: &str = "task:failed";
    pub const TASK_CANCELLED: &str = "task:cancelled";

    // ORPAR orchestration
    pub const CONTROL_LOOP_INITIALIZE: &str = "control_loop:initialize";
    pub const CONTROL_LOOP_START: &str = "control_loop:start";
    pub const CONTROL_LOOP_STOP: &str = "control_loop:stop";
    pub const CONTROL_LOOP_OBSERVATION_SUBMIT: &str = "control_loop:observation_submit";
    pub const CONTROL_LOOP_REFLECTION: &str = "control_loop:reflection";

    // Remote-tool lifecycle
    pub const MCP_EXTERNAL_SERVER_REGISTER: &str = "mcp:external_server_register";
    pub const MCP_EXTERNAL_SERVER_REGISTERED: &str = "mcp:external_server_registered";
    pub const MCP_EXTERNAL_SERVER_REGISTRATION_FAILED: &str =
        "mcp:external_server_registration_failed";
    pub const MCP_EXTERNAL_SERVER_TOOLS_DISCOVERED: &str = "mcp:external_server_tools_discovered";

    // Secondary-index fan-out
    pub const INDEXING_MEILISEARCH_INDEX: &str = "indexing:meilisearch:index";
    pub const INDEXING_BACKFILL_REQUEST: &str = "indexing:meilisearch:backfill:request";
    pub const INDEXING_BACKFILL_COMPLETE: &str = "indexing:meilisearch:backfill:complete";
    pub const INDEXING_BACKFILL_PARTIAL: &str = "indexing:meilisearch:backfill:partial";
    pub const INDEXING_BACKFILL_ERROR: &str = "indexing:meilisearch:backfill:error";

    // Liveness
    pub const HEARTBEAT: &str = "heartbeat";

    /// Events exposed to external subscribers (ChannelMonitor whitelist).
    /// Internal-only bookkeeping events (e.g. bulk persistence requests,
    /// backfill partials) are deliberately excluded.
    pub const PUBLIC_WHITELIST: &[&str] = &[
        AGENT_CONNECTED,
        AGENT_DISCONNECTED,
        AGENT_STATUS_CHANGE,
        AGENT_ALLOWED_TOOLS_UPDATE,
        CHANNEL_CREATED,
        MESSAGE_AGENT,
        MESSAGE_CHANNEL,
        TASK_ASSIGNED,
        TASK_STARTED,
        TASK_PROGRESS_UPDATED,
        TASK_COMPLETED,
        TASK_FAILED,
        TASK_CANCELLED,
        CONTROL_LOOP_START,
        CONTROL_LOOP_STOP,
        CONTROL_LOOP_REFLECTION,
        MCP_EXTERNAL_SERVER_TOOLS_DISCOVERED,
        HEARTBEAT,
    ];
}
