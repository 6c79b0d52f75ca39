//! Wire DTOs and configuration surface shared across the MXF workspace.
//!
//! No runtime logic lives here — just the shapes that cross a process
//! boundary (the exchange-server wire envelope, durable-state records,
//! the recognized configuration surface, and the CLI exit-code
//! contract), mirrored on the way `everruns-contracts` stays dependency-free.

pub mod cli;
pub mod config;
pub mod durable;
pub mod envelope;
pub mod task;

pub use config::{AgentRuntimeConfig, MxpOptions, ReasoningOptions};
pub use durable::{AgentDurableRecord, ChannelDurableState, McpServerRef, RelationshipKey, RelationshipState};
pub use envelope::{event_names, Envelope};
pub use task::{Task, TaskStatus};
