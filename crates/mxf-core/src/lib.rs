//! Event bus, memory store, tool registry, circuit breaker, and the
//! agent reasoning loop for the MXF agent runtime.
//!
//! This crate is transport-agnostic: it knows nothing about MCP wire
//! framing or WebSocket reconnection (see `mxf-transport`), and nothing
//! about multi-agent task assignment or the ORPAR phase machine (see
//! `mxf-coordinator`). It owns the single-agent cognitive loop and the
//! components it's built from.

pub mod agent;
pub mod breaker;
pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod memory;
pub mod message;
pub mod testutil;
pub mod tool_types;
pub mod tools;
pub mod traits;

pub use agent::{Agent, AgentHandle};
pub use breaker::{BreakerIntervention, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, TripRule};
pub use bus::{EventBus, Subscription};
pub use config::{AgentConfig, AgentConfigBuilder, AgentRole};
pub use error::{AgentLoopError, Result};
pub use events::LoopEvent;
pub use executor::{LoopExit, LoopOutcome, ReasoningLoop};
pub use memory::{ConversationMemory, DurableStore, IndexSink};
pub use message::{ConversationMessage, MessageRole};
pub use tool_types::{ToolCall, ToolDefinition, ToolResult, ToolSource};
pub use tools::{ToolInvoker, ToolRegistry};
pub use traits::{EventEmitter, LlmProvider, ToolExecutor};
