// ORPAR phase machine types (§3 "ControlLoop", §4.7 phase semantics).
//
// The five cognitive phases gate which tools the agent may call that
// iteration; `Idle`/`Stopped`/`Error` are the loop's non-cognitive
// states and carry no tool gate of their own.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlLoopPhase {
    Idle,
    Observing,
    Reasoning,
    Planning,
    Acting,
    Reflecting,
    Stopped,
    Error,
}

impl ControlLoopPhase {
    /// `observing → reasoning → planning → acting → reflecting`, then
    /// back to `observing` for the next task-observation, or `stopped`
    /// if there's nothing left to do.
    pub fn next(self) -> Self {
        use ControlLoopPhase::*;
        match self {
            Idle => Observing,
            Observing => Reasoning,
            Reasoning => Planning,
            Planning => Acting,
            Acting => Reflecting,
            Reflecting => Observing,
            Stopped => Stopped,
            Error => Error,
        }
    }

    pub fn label(self) -> &'static str {
        use ControlLoopPhase::*;
        match self {
            Idle => "idle",
            Observing => "observing",
            Reasoning => "reasoning",
            Planning => "planning",
            Acting => "acting",
            Reflecting => "reflecting",
            Stopped => "stopped",
            Error => "error",
        }
    }

    /// The tool-gate allow-list forced during this phase (§4.7):
    /// `observing`/`reasoning`/`planning`/`reflecting` are each
    /// restricted to their single phase tool; `acting` widens to that
    /// phase tool plus the full task-effecting allow-list, since this
    /// is the one phase meant to take real-world action. `task_tools`
    /// should be the freshly-refreshed catalog (remote tools may only
    /// appear once `acting` triggers that refresh — §4.7).
    pub fn tool_gate(self, task_tools: &[String]) -> Option<Vec<String>> {
        use ControlLoopPhase::*;
        match self {
            Observing => Some(vec!["orpar_observe".to_string()]),
            Reasoning => Some(vec!["orpar_reason".to_string()]),
            Planning => Some(vec!["orpar_plan".to_string()]),
            Acting => {
                let mut gate = vec!["orpar_act".to_string()];
                gate.extend(task_tools.iter().cloned());
                Some(gate)
            }
            Reflecting => Some(vec!["orpar_reflect".to_string()]),
            Idle | Stopped | Error => None,
        }
    }
}

/// A single observation fed into the loop (task assignment, a channel
/// message, a tool-discovery event — whatever the coordinator decides
/// is worth the agent's attention).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: Uuid,
    pub content: String,
}

impl Observation {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            content: content.into(),
        }
    }
}

/// The reasoning produced from one or more observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningRecord {
    pub id: Uuid,
    pub observation_ids: Vec<Uuid>,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanActionStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanAction {
    pub description: String,
    pub status: PlanActionStatus,
}

impl PlanAction {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            status: PlanActionStatus::Pending,
        }
    }
}

/// A plan of `PlanAction`s, derived from a `ReasoningRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub reasoning_id: Uuid,
    pub actions: Vec<PlanAction>,
}

impl Plan {
    pub fn new(reasoning_id: Uuid, actions: Vec<PlanAction>) -> Self {
        Self {
            id: Uuid::now_v7(),
            reasoning_id,
            actions,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.actions.iter().all(|a| matches!(a.status, PlanActionStatus::Done))
    }
}

/// Generated from a completed plan at the end of a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflection {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub summary: String,
}

impl Reflection {
    pub fn new(plan_id: Uuid, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            plan_id,
            summary: summary.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_in_orpar_order() {
        use ControlLoopPhase::*;
        assert_eq!(Idle.next(), Observing);
        assert_eq!(Observing.next(), Reasoning);
        assert_eq!(Reasoning.next(), Planning);
        assert_eq!(Planning.next(), Acting);
        assert_eq!(Acting.next(), Reflecting);
        assert_eq!(Reflecting.next(), Observing);
    }

    #[test]
    fn terminal_phases_do_not_advance() {
        assert_eq!(ControlLoopPhase::Stopped.next(), ControlLoopPhase::Stopped);
        assert_eq!(ControlLoopPhase::Error.next(), ControlLoopPhase::Error);
    }

    #[test]
    fn each_orpar_phase_has_a_distinct_single_tool_gate() {
        assert_eq!(ControlLoopPhase::Observing.tool_gate(&[]), Some(vec!["orpar_observe".to_string()]));
        assert_eq!(ControlLoopPhase::Reflecting.tool_gate(&[]), Some(vec!["orpar_reflect".to_string()]));
        assert_eq!(ControlLoopPhase::Idle.tool_gate(&[]), None);
    }

    #[test]
    fn acting_phase_widens_gate_to_task_effecting_tools() {
        let gate = ControlLoopPhase::Acting
            .tool_gate(&["game_setSecret".to_string(), "messaging_send".to_string()])
            .unwrap();
        assert!(gate.contains(&"orpar_act".to_string()));
        assert!(gate.contains(&"game_setSecret".to_string()));
        assert!(gate.contains(&"messaging_send".to_string()));
    }

    #[test]
    fn plan_is_complete_only_when_every_action_is_done() {
        let mut plan = Plan::new(Uuid::now_v7(), vec![PlanAction::new("a"), PlanAction::new("b")]);
        assert!(!plan.is_complete());
        plan.actions[0].status = PlanActionStatus::Done;
        plan.actions[1].status = PlanActionStatus::Done;
        assert!(plan.is_complete());
    }
}
