//! The owning runtime binding `mxf-core`, `mxf-transport`, and
//! `mxf-coordinator` into one running agent process (§9 "Global state").
//! Builds the explicit `Runtime` composition root, the envelope
//! translation layer, and the default durable-store/index-sink/tool
//! backends; the binary entry point lives in `main.rs`.

pub mod agent_process;
pub mod builtin_tools;
pub mod bus_emitter;
pub mod config;
pub mod durable_store;
pub mod envelope_bridge;
pub mod error;
pub mod gate_publisher;
pub mod runtime;

pub use agent_process::AgentProcess;
pub use bus_emitter::BusEventEmitter;
pub use config::ProcessConfig;
pub use durable_store::{JsonFileDurableStore, LoggingIndexSink};
pub use error::{Result, RuntimeError};
pub use gate_publisher::TransportGatePublisher;
pub use runtime::Runtime;
