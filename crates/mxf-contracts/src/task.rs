// Task entity (§3 "Task"), the wire/data shape shared by the transport
// gateway (carried inside `task:*` envelope payloads) and the
// coordinator (which owns assignment and completion-precedence logic
// over it, in `mxf-coordinator`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// `pending → assigned → in_progress → {completed, failed, cancelled}`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Assigned, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (Pending, Cancelled)
                | (Assigned, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub assigned_agents: Vec<String>,
    #[serde(default)]
    pub lead_agent_id: Option<String>,
    #[serde(default)]
    pub completion_agent_id: Option<String>,
    #[serde(default)]
    pub coordination_mode: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(task_id: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            assigned_agents: Vec::new(),
            lead_agent_id: None,
            completion_agent_id: None,
            coordination_mode: "solo".to_string(),
            metadata: HashMap::new(),
        }
    }

    /// A short summary injected as `TaskContext::summary` for the
    /// reasoning loop's prompt (§4.6 step 3).
    pub fn summary(&self) -> String {
        format!("{}: {}", self.title, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions_are_allowed() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Assigned));
        assert!(TaskStatus::Assigned.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn terminal_statuses_accept_no_further_transitions() {
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::Completed.is_terminal());
    }

    #[test]
    fn round_trips_camel_case_wire_shape() {
        let mut task = Task::new("t1", "title", "desc");
        task.lead_agent_id = Some("agent-1".into());
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"leadAgentId\""));
        assert!(json.contains("\"taskId\""));
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.task_id, "t1");
    }
}
