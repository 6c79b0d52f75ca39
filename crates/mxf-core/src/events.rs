// Loop-internal events, published on the event bus and optionally
// surfaced to external subscribers through a `ChannelMonitor`.
//
// Distinct from `mxf_contracts::Envelope`: these are typed, in-process
// events; they are wrapped into an `Envelope` only at the transport
// boundary (mxf-transport).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoopEvent {
    LoopStarted {
        agent_id: String,
        timestamp: DateTime<Utc>,
    },
    IterationStarted {
        agent_id: String,
        iteration: usize,
        timestamp: DateTime<Utc>,
    },
    LlmCallStarted {
        agent_id: String,
        iteration: usize,
        timestamp: DateTime<Utc>,
    },
    LlmCallCompleted {
        agent_id: String,
        iteration: usize,
        has_tool_calls: bool,
        timestamp: DateTime<Utc>,
    },
    ReasoningEmitted {
        agent_id: String,
        iteration: usize,
        text: String,
        timestamp: DateTime<Utc>,
    },
    ToolExecutionStarted {
        agent_id: String,
        tool_call_id: String,
        tool_name: String,
        timestamp: DateTime<Utc>,
    },
    ToolExecutionCompleted {
        agent_id: String,
        tool_call_id: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
    BreakerTripped {
        agent_id: String,
        tool_name: String,
        rule: String,
        timestamp: DateTime<Utc>,
    },
    IterationCompleted {
        agent_id: String,
        iteration: usize,
        continue_loop: bool,
        timestamp: DateTime<Utc>,
    },
    TaskCompleted {
        agent_id: String,
        task_id: String,
        timestamp: DateTime<Utc>,
    },
    LoopCompleted {
        agent_id: String,
        total_iterations: usize,
        timestamp: DateTime<Utc>,
    },
    LoopError {
        agent_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// Emitted by the bus itself when a subscriber handler panics or
    /// returns an error — delivery to other subscribers still proceeds.
    HandlerError {
        event_name: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

macro_rules! ctor {
    ($fn_name:ident, $variant:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        pub fn $fn_name($($field: $ty),*) -> Self {
            LoopEvent::$variant { $($field: $field.into()),* , timestamp: Utc::now() }
        }
    };
}

impl LoopEvent {
    ctor!(loop_started, LoopStarted { agent_id: impl Into<String> });
    ctor!(iteration_started, IterationStarted { agent_id: impl Into<String>, iteration: usize });
    ctor!(llm_call_started, LlmCallStarted { agent_id: impl Into<String>, iteration: usize });

    pub fn llm_call_completed(agent_id: impl Into<String>, iteration: usize, has_tool_calls: bool) -> Self {
        LoopEvent::LlmCallCompleted {
            agent_id: agent_id.into(),
            iteration,
            has_tool_calls,
            timestamp: Utc::now(),
        }
    }

    pub fn reasoning_emitted(agent_id: impl Into<String>, iteration: usize, text: impl Into<String>) -> Self {
        LoopEvent::ReasoningEmitted {
            agent_id: agent_id.into(),
            iteration,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn tool_started(agent_id: impl Into<String>, tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        LoopEvent::ToolExecutionStarted {
            agent_id: agent_id.into(),
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn tool_completed(agent_id: impl Into<String>, tool_call_id: impl Into<String>, success: bool) -> Self {
        LoopEvent::ToolExecutionCompleted {
            agent_id: agent_id.into(),
            tool_call_id: tool_call_id.into(),
            success,
            timestamp: Utc::now(),
        }
    }

    pub fn breaker_tripped(agent_id: impl Into<String>, tool_name: impl Into<String>, rule: impl Into<String>) -> Self {
        LoopEvent::BreakerTripped {
            agent_id: agent_id.into(),
            tool_name: tool_name.into(),
            rule: rule.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn task_completed(agent_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        LoopEvent::TaskCompleted {
            agent_id: agent_id.into(),
            task_id: task_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn iteration_completed(agent_id: impl Into<String>, iteration: usize, continue_loop: bool) -> Self {
        LoopEvent::IterationCompleted {
            agent_id: agent_id.into(),
            iteration,
            continue_loop,
            timestamp: Utc::now(),
        }
    }

    pub fn loop_completed(agent_id: impl Into<String>, total_iterations: usize) -> Self {
        LoopEvent::LoopCompleted {
            agent_id: agent_id.into(),
            total_iterations,
            timestamp: Utc::now(),
        }
    }

    pub fn loop_error(agent_id: impl Into<String>, error: impl Into<String>) -> Self {
        LoopEvent::LoopError {
            agent_id: agent_id.into(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn handler_error(event_name: impl Into<String>, error: impl Into<String>) -> Self {
        LoopEvent::HandlerError {
            event_name: event_name.into(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    /// The event-family name used for bus subscription/dispatch ordering.
    pub fn name(&self) -> &'static str {
        match self {
            LoopEvent::LoopStarted { .. } => "loop_started",
            LoopEvent::IterationStarted { .. } => "iteration_started",
            LoopEvent::LlmCallStarted { .. } => "llm_call_started",
            LoopEvent::LlmCallCompleted { .. } => "llm_call_completed",
            LoopEvent::ReasoningEmitted { .. } => "reasoning_emitted",
            LoopEvent::ToolExecutionStarted { .. } => "tool_execution_started",
            LoopEvent::ToolExecutionCompleted { .. } => "tool_execution_completed",
            LoopEvent::BreakerTripped { .. } => "breaker_tripped",
            LoopEvent::IterationCompleted { .. } => "iteration_completed",
            LoopEvent::TaskCompleted { .. } => "task_completed",
            LoopEvent::LoopCompleted { .. } => "loop_completed",
            LoopEvent::LoopError { .. } => "loop_error",
            LoopEvent::HandlerError { .. } => "on_handler_error",
        }
    }

    pub fn agent_id(&self) -> Option<&str> {
        match self {
            LoopEvent::LoopStarted { agent_id, .. }
            | LoopEvent::IterationStarted { agent_id, .. }
            | LoopEvent::LlmCallStarted { agent_id, .. }
            | LoopEvent::LlmCallCompleted { agent_id, .. }
            | LoopEvent::ReasoningEmitted { agent_id, .. }
            | LoopEvent::ToolExecutionStarted { agent_id, .. }
            | LoopEvent::ToolExecutionCompleted { agent_id, .. }
            | LoopEvent::BreakerTripped { agent_id, .. }
            | LoopEvent::IterationCompleted { agent_id, .. }
            | LoopEvent::TaskCompleted { agent_id, .. }
            | LoopEvent::LoopCompleted { agent_id, .. }
            | LoopEvent::LoopError { agent_id, .. } => Some(agent_id),
            LoopEvent::HandlerError { .. } => None,
        }
    }
}
