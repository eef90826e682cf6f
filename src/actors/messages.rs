//! Message types for actor communication
//!
//! Commands are request/response messages sent to a specific actor via its
//! mpsc channel; updates are the notifications the nexus pushes to
//! subscribed listeners. Responses travel over `oneshot` channels.

use tokio::sync::{mpsc, oneshot};

use crate::error::QueryError;
use crate::events::{
    ActorHandle, ActorId, NodeId, NodeInfo, ProbeDataMap, ProbeEvent, RamUsage, WorkLoad,
};

use super::monitor::LivenessWatch;
use super::nexus::NexusHandle;

/// Token identifying a watched peer (probe uplink or listener) inside the
/// nexus. Allocated per watch registration, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub(crate) u64);

/// Update pushed from the nexus to a subscribed listener.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerUpdate {
    /// One-shot bootstrap: the entire current cluster snapshot. Always the
    /// first update a new subscriber receives.
    Snapshot(ProbeDataMap),

    /// A single accepted event, re-broadcast verbatim.
    Event(ProbeEvent),
}

/// Subscriber capability held by the nexus.
///
/// Liveness is tied to the receiving half: once the subscriber drops its
/// receiver, the nexus notices and removes the listener.
#[derive(Debug, Clone)]
pub struct Listener {
    tx: mpsc::UnboundedSender<ListenerUpdate>,
}

impl Listener {
    /// Creates a listener and the receiver its updates arrive on.
    pub fn channel() -> (Listener, mpsc::UnboundedReceiver<ListenerUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Listener { tx }, rx)
    }

    pub(crate) fn push(&self, update: ListenerUpdate) {
        // A send error means the subscriber is gone; the liveness watch
        // will remove it shortly.
        let _ = self.tx.send(update);
    }

    pub(crate) fn same_channel(&self, other: &Listener) -> bool {
        self.tx.same_channel(&other.tx)
    }

    pub(crate) async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Commands accepted by the nexus aggregation engine
#[derive(Debug)]
pub enum NexusCommand {
    /// An event from a registered probe (or replayed source).
    Event(ProbeEvent),

    /// First message of a probe uplink: the node's identity card plus a
    /// liveness watch on the connection and an optional observer awaiting
    /// an acknowledgement carrying a reference to the nexus.
    Register {
        info: NodeInfo,
        uplink: ActorHandle,
        watch: LivenessWatch,
        respond_to: Option<oneshot::Sender<NexusHandle>>,
    },

    /// Subscribe a listener to the broadcast stream.
    Subscribe { listener: Listener },

    /// Liveness-loss notification for a watched peer.
    PeerDown { peer: PeerId },

    /// Gracefully shut down the nexus.
    Shutdown,
}

/// Commands accepted by the nexus proxy
#[derive(Debug)]
pub enum ProxyCommand {
    /// Bootstrap (or re-bootstrap) the mirror against a nexus.
    Init {
        nexus: NexusHandle,
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    /// All known node ids, optionally filtered by exact hostname.
    ListNodes {
        hostname: Option<String>,
        respond_to: oneshot::Sender<Vec<NodeId>>,
    },

    /// The cached identity card of a node.
    GetNode {
        node: NodeId,
        respond_to: oneshot::Sender<Result<NodeInfo, QueryError>>,
    },

    /// Directly reachable peers of a node.
    ListPeers {
        node: NodeId,
        respond_to: oneshot::Sender<Vec<NodeId>>,
    },

    /// Latest load gauge of a node.
    GetSysLoad {
        node: NodeId,
        respond_to: oneshot::Sender<Result<WorkLoad, QueryError>>,
    },

    /// Latest memory gauge of a node.
    GetRamUsage {
        node: NodeId,
        respond_to: oneshot::Sender<Result<RamUsage, QueryError>>,
    },

    /// All known actors on a node.
    ListActors {
        node: NodeId,
        respond_to: oneshot::Sender<Vec<ActorHandle>>,
    },

    /// A single actor on a node; invalid handle if not found.
    GetActor {
        node: NodeId,
        actor: ActorId,
        respond_to: oneshot::Sender<ActorHandle>,
    },

    /// Gracefully shut down the proxy.
    Shutdown,
}

/// Commands accepted by a probe agent
#[derive(Debug)]
pub enum ProbeCommand {
    /// Push a telemetry sample immediately, bypassing the interval timer.
    SampleNow {
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    /// Update the telemetry interval; takes effect immediately.
    UpdateInterval { interval_secs: u64 },

    /// Gracefully shut down the probe agent.
    Shutdown,
}
