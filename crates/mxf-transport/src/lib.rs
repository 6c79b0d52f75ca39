//! Authenticated transport gateway to the exchange server: handshake,
//! framing, liveness, reconnection, and ordered outbound delivery.
//!
//! This crate is agent-loop-agnostic: it moves `Envelope` frames over
//! a `WireSocket` and nothing else. Translating inbound envelopes into
//! coordinator/channel-monitor state, and outbound domain events into
//! envelopes, is the owning runtime's job (see `mxf-runtime`).

pub mod backoff;
pub mod error;
pub mod gateway;
pub mod handshake;
pub mod outbound;
pub mod socket;
pub mod testutil;
pub mod ws;

pub use backoff::ReconnectPolicy;
pub use error::{Result, TransportError};
pub use gateway::TransportGateway;
pub use handshake::HandshakeIdentity;
pub use outbound::{Criticality, OutboundQueue, QueuedFrame};
pub use socket::{Connector, WireSocket};
pub use ws::WebSocketConnector;
