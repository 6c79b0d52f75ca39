// Translates inbound wire `Envelope`s into domain values the loop and
// coordinator consume, and outbound domain events into `Envelope`s to
// enqueue (§4.2 module doc: "translating inbound envelopes... is the
// owning runtime's job").

use mxf_contracts::envelope::{event_names, Envelope};
use mxf_contracts::task::Task;
use mxf_coordinator::Reflection;

use crate::error::{Result, RuntimeError};

pub fn parse_task_assigned(envelope: &Envelope) -> Result<Task> {
    serde_json::from_value(envelope.data.clone())
        .map_err(|e| RuntimeError::config(format!("malformed task:assigned payload: {e}")))
}

pub fn parse_task_cancelled_id(envelope: &Envelope) -> Option<String> {
    envelope.data.get("taskId").and_then(|v| v.as_str()).map(str::to_string)
}

pub fn task_completed_envelope(agent_id: &str, channel_id: &str, task_id: &str) -> Envelope {
    Envelope::new(
        event_names::TASK_COMPLETED,
        agent_id,
        channel_id,
        serde_json::json!({ "taskId": task_id }),
    )
}

pub fn task_failed_envelope(agent_id: &str, channel_id: &str, task_id: &str, error: &str) -> Envelope {
    Envelope::new(
        event_names::TASK_FAILED,
        agent_id,
        channel_id,
        serde_json::json!({ "taskId": task_id, "error": error }),
    )
}

pub fn channel_message_envelope(agent_id: &str, channel_id: &str, text: &str) -> Envelope {
    Envelope::new(
        event_names::MESSAGE_CHANNEL,
        agent_id,
        channel_id,
        serde_json::json!({ "text": text }),
    )
}

pub fn control_loop_reflection_envelope(agent_id: &str, channel_id: &str, reflection: &Reflection) -> Envelope {
    Envelope::new(
        event_names::CONTROL_LOOP_REFLECTION,
        agent_id,
        channel_id,
        serde_json::json!({ "planId": reflection.plan_id, "summary": reflection.summary }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxf_contracts::task::TaskStatus;

    #[test]
    fn round_trips_task_assigned_payload() {
        let task = Task::new("t1", "Title", "Desc");
        let envelope = Envelope::new(event_names::TASK_ASSIGNED, "agent-1", "channel-1", serde_json::to_value(&task).unwrap());
        let parsed = parse_task_assigned(&envelope).unwrap();
        assert_eq!(parsed.task_id, "t1");
        assert_eq!(parsed.status, TaskStatus::Pending);
    }

    #[test]
    fn malformed_task_assigned_payload_is_a_config_error() {
        let envelope = Envelope::new(event_names::TASK_ASSIGNED, "agent-1", "channel-1", serde_json::json!("not a task"));
        assert!(parse_task_assigned(&envelope).is_err());
    }

    #[test]
    fn extracts_cancelled_task_id() {
        let envelope = Envelope::new(event_names::TASK_CANCELLED, "agent-1", "channel-1", serde_json::json!({"taskId": "t1"}));
        assert_eq!(parse_task_cancelled_id(&envelope), Some("t1".to_string()));
    }
}
