//! Actor-based cluster monitoring overlay
//!
//! Each actor runs as an independent async task communicating via Tokio
//! channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!   ┌───────────┐      ┌───────────┐      ┌───────────┐
//!   │ Probe-1   │      │ Probe-2   │      │ Probe-N   │
//!   │ (Node A)  │      │ (Node B)  │      │ (Node N)  │
//!   └─────┬─────┘      └─────┬─────┘      └─────┬─────┘
//!         │  register + events  │                │
//!         └──────────┬──────────┴────────────────┘
//!                    │
//!            ┌───────▼────────┐
//!            │     Nexus      │  aggregates into ClusterState
//!            └───────┬────────┘
//!                    │  snapshot + event broadcast
//!         ┌──────────┼──────────────┐
//!         │          │              │
//!   ┌─────▼─────┐ ┌──▼────────┐ ┌───▼───────┐
//!   │ Listener  │ │ Listener  │ │  Proxy    │  answers queries
//!   └───────────┘ └───────────┘ │  (mirror) │  from local state
//!                               └───────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **NexusActor**: Folds probe events into the authoritative state and
//!   re-broadcasts them to listeners
//! - **ProxyActor**: Mirrors the nexus state and answers queries locally
//! - **ProbeAgent**: Samples host gauges and relays transport hook events
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each actor has an mpsc command channel for control messages
//! 2. **Updates**: The nexus pushes snapshot/event updates to listener channels
//! 3. **Request/Response**: oneshot channels for synchronous queries
//! 4. **Liveness**: guard/watch pairs signal when a peer is gone

pub mod messages;
pub mod monitor;
pub mod nexus;
pub mod probe;
pub mod proxy;
