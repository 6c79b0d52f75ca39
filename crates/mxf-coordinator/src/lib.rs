//! C7 Task & Control-Loop Coordinator for the MXF agent runtime (§4.7).
//!
//! Accepts `task_assigned` events, installs the active task, and —
//! when the channel enables system-level orchestration — drives the
//! ORPAR phase machine on top of `mxf_core`'s single-agent reasoning
//! loop. Transport-agnostic: wiring this to the exchange server's
//! wire envelopes is `mxf-runtime`'s job.

pub mod channel_bus;
pub mod control_loop;
pub mod error;
pub mod gate;
pub mod phase;
pub mod task;

pub use channel_bus::{ChannelEventBus, ChannelMonitor, Subscription};
pub use control_loop::ControlLoop;
pub use error::{CoordinatorError, Result};
pub use gate::{regenerate_system_prompt, GatePublisher};
pub use phase::{
    ControlLoopPhase, Observation, Plan, PlanAction, PlanActionStatus, ReasoningRecord, Reflection,
};
pub use task::{completion_precedence, is_assignable_to, task_context, CompletionPrecedence};
