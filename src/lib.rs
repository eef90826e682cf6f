//! Monitoring overlay for a distributed actor cluster
//!
//! Probes report per-node telemetry and transport activity to a central
//! nexus, which aggregates everything into one cluster-wide state table
//! and broadcasts accepted events to subscribed listeners. A proxy
//! mirrors that state and answers queries locally.

pub mod actors;
pub mod config;
pub mod error;
pub mod events;
pub mod hooks;
pub mod host;
pub mod state;
pub mod transport;

pub use actors::nexus::NexusHandle;
pub use actors::probe::{ActorCensus, ProbeHandle};
pub use actors::proxy::ProxyHandle;
pub use config::ProbeConfig;
pub use events::{ActorHandle, ActorId, NodeId, ProbeEvent};
