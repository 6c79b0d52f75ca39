// Task lifecycle and completion-precedence logic (§3 "Task", §4.7
// "Completion precedence"). The `Task` data shape itself lives in
// `mxf_contracts::task` since it also crosses the wire inside
// `task:*` envelope payloads; this module owns the rules a coordinator
// applies to it.

use mxf_contracts::task::{Task, TaskStatus};
use mxf_core::executor::TaskContext;

/// Reasons an agent is allowed to treat a task as complete without an
/// explicit `task_complete` tool call having fired — precedence (ii)-(iv)
/// of §4.7. Rule (i), the explicit call, is handled by the reasoning
/// loop itself and never reaches this function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPrecedence {
    DesignatedCompletionAgent,
    SoleAssignedAgent,
    LeadAgent,
}

/// Evaluates precedence rules (ii)-(iv) in order. `None` means the
/// agent may not auto-call `task_complete` for this task.
pub fn completion_precedence(task: &Task, agent_id: &str) -> Option<CompletionPrecedence> {
    if task.completion_agent_id.as_deref() == Some(agent_id) {
        return Some(CompletionPrecedence::DesignatedCompletionAgent);
    }
    if task.assigned_agents.len() == 1 && task.assigned_agents[0] == agent_id {
        return Some(CompletionPrecedence::SoleAssignedAgent);
    }
    if task.lead_agent_id.as_deref() == Some(agent_id) {
        return Some(CompletionPrecedence::LeadAgent);
    }
    None
}

/// Whether a `task_assigned` event naming `task` and `agent_id` should
/// be installed as this agent's active task. A task already in a
/// terminal status, or one that doesn't name this agent, is rejected.
pub fn is_assignable_to(task: &Task, agent_id: &str) -> bool {
    !task.status.is_terminal() && task.assigned_agents.iter().any(|a| a == agent_id)
}

/// Builds the `TaskContext` the reasoning loop consumes from a newly
/// installed task. `pinned` is set while the task is actively assigned
/// (not yet completed) so external cancellation doesn't immediately
/// drop the in-flight turn — mirrors the loop's own step-1 semantics.
pub fn task_context(task: &Task) -> TaskContext {
    TaskContext {
        task_id: task.task_id.clone(),
        summary: task.summary(),
        pinned: matches!(task.status, TaskStatus::Assigned | TaskStatus::InProgress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        let mut t = Task::new("t1", "Title", "Description");
        t.status = TaskStatus::InProgress;
        t
    }

    #[test]
    fn designated_completion_agent_takes_precedence() {
        let mut t = task();
        t.assigned_agents = vec!["agent-a".into(), "agent-b".into()];
        t.completion_agent_id = Some("agent-b".into());
        t.lead_agent_id = Some("agent-a".into());

        assert_eq!(
            completion_precedence(&t, "agent-b"),
            Some(CompletionPrecedence::DesignatedCompletionAgent)
        );
        assert_eq!(
            completion_precedence(&t, "agent-a"),
            Some(CompletionPrecedence::LeadAgent)
        );
    }

    #[test]
    fn sole_assigned_agent_may_auto_complete() {
        let mut t = task();
        t.assigned_agents = vec!["agent-a".into()];
        assert_eq!(
            completion_precedence(&t, "agent-a"),
            Some(CompletionPrecedence::SoleAssignedAgent)
        );
    }

    #[test]
    fn unrelated_agent_has_no_precedence() {
        let mut t = task();
        t.assigned_agents = vec!["agent-a".into(), "agent-b".into()];
        assert_eq!(completion_precedence(&t, "agent-c"), None);
    }

    #[test]
    fn terminal_tasks_are_not_assignable() {
        let mut t = task();
        t.assigned_agents = vec!["agent-a".into()];
        t.status = TaskStatus::Completed;
        assert!(!is_assignable_to(&t, "agent-a"));
    }

    #[test]
    fn unassigned_agent_is_not_assignable() {
        let mut t = task();
        t.assigned_agents = vec!["agent-a".into()];
        assert!(!is_assignable_to(&t, "agent-b"));
    }
}
