//! Event schema exchanged between probes, the nexus, and its listeners
//!
//! Pure data definitions with structural equality. Every record names the
//! node it originates from (`source_node`); the nexus rejects events whose
//! source is [`NodeId::NIL`]. All types round-trip through serde so the
//! transport layer can use whatever wire format it provides.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque identifier of a cluster node.
///
/// Assigned by the runtime per process instance and never reused while that
/// process lives. `NodeId::NIL` marks an invalid/unset source.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const NIL: NodeId = NodeId(0);

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Process-local identifier of an actor.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ActorId(pub u64);

impl ActorId {
    pub const INVALID: ActorId = ActorId(0);
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// Globally unique actor address: node plus process-local id.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ActorHandle {
    pub node: NodeId,
    pub id: ActorId,
}

static NEXT_LOCAL_ACTOR: AtomicU64 = AtomicU64::new(1);

impl ActorHandle {
    pub const INVALID: ActorHandle = ActorHandle {
        node: NodeId::NIL,
        id: ActorId::INVALID,
    };

    pub fn new(node: NodeId, id: ActorId) -> Self {
        Self { node, id }
    }

    /// Allocates a handle with a fresh process-local actor id.
    pub fn fresh(node: NodeId) -> Self {
        Self {
            node,
            id: ActorId(NEXT_LOCAL_ACTOR.fetch_add(1, Ordering::Relaxed)),
        }
    }

    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }
}

impl fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.id)
    }
}

/// Address family of an interface entry in [`NodeInfo::interfaces`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Ethernet,
    Ipv4,
    Ipv6,
}

/// interface name -> protocol -> address strings
pub type InterfaceMap = BTreeMap<String, BTreeMap<Protocol, Vec<String>>>;

/// Static CPU facts, gathered once per node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuInfo {
    pub source_node: NodeId,
    pub num_cores: u64,
    pub mhz_per_core: u64,
}

/// The "identity card" of a node, sent once per uplink connection.
///
/// Replaces any prior value for that node wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub source_node: NodeId,
    pub cpu: Vec<CpuInfo>,
    pub hostname: String,
    pub os: String,
    pub interfaces: InterfaceMap,
}

/// Periodic memory gauge; latest value wins, no history retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RamUsage {
    pub source_node: NodeId,
    pub in_use: u64,
    pub available: u64,
}

/// Periodic load gauge; latest value wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkLoad {
    pub source_node: NodeId,
    /// CPU load in percent, 0-100.
    pub cpu_load: u8,
    pub num_processes: u64,
    pub num_actors: u64,
}

/// Asserts an edge from `source_node` to `dest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoute {
    pub source_node: NodeId,
    pub dest: NodeId,
    pub is_direct: bool,
}

/// Retracts a previously asserted direct edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteLost {
    pub source_node: NodeId,
    pub dest: NodeId,
}

/// Trace event for actor-to-actor traffic crossing node boundaries.
///
/// Not persisted in aggregate state; the nexus passes it through to
/// listeners verbatim. The payload is compared by content, not identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub source_node: NodeId,
    pub dest_node: NodeId,
    pub source_actor: ActorId,
    pub dest_actor: ActorId,
    pub payload: Option<serde_json::Value>,
}

/// A node exposed an actor on a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorPublished {
    pub source_node: NodeId,
    pub published_actor: ActorHandle,
    pub port: u16,
}

/// Tombstone; the node's state entry is purged on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDisconnected {
    pub source_node: NodeId,
}

/// Sum type over every event kind a probe can emit.
///
/// The nexus and proxy dispatch on this with a single exhaustive `match`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProbeEvent {
    NodeInfo(NodeInfo),
    RamUsage(RamUsage),
    WorkLoad(WorkLoad),
    NewRoute(NewRoute),
    RouteLost(RouteLost),
    NewMessage(NewMessage),
    ActorPublished(ActorPublished),
    NodeDisconnected(NodeDisconnected),
}

impl ProbeEvent {
    /// The node this event originates from.
    pub fn source_node(&self) -> NodeId {
        match self {
            ProbeEvent::NodeInfo(e) => e.source_node,
            ProbeEvent::RamUsage(e) => e.source_node,
            ProbeEvent::WorkLoad(e) => e.source_node,
            ProbeEvent::NewRoute(e) => e.source_node,
            ProbeEvent::RouteLost(e) => e.source_node,
            ProbeEvent::NewMessage(e) => e.source_node,
            ProbeEvent::ActorPublished(e) => e.source_node,
            ProbeEvent::NodeDisconnected(e) => e.source_node,
        }
    }

    /// Event kind name, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeEvent::NodeInfo(_) => "node_info",
            ProbeEvent::RamUsage(_) => "ram_usage",
            ProbeEvent::WorkLoad(_) => "work_load",
            ProbeEvent::NewRoute(_) => "new_route",
            ProbeEvent::RouteLost(_) => "route_lost",
            ProbeEvent::NewMessage(_) => "new_message",
            ProbeEvent::ActorPublished(_) => "actor_published",
            ProbeEvent::NodeDisconnected(_) => "node_disconnected",
        }
    }
}

impl From<NodeInfo> for ProbeEvent {
    fn from(e: NodeInfo) -> Self {
        ProbeEvent::NodeInfo(e)
    }
}

impl From<RamUsage> for ProbeEvent {
    fn from(e: RamUsage) -> Self {
        ProbeEvent::RamUsage(e)
    }
}

impl From<WorkLoad> for ProbeEvent {
    fn from(e: WorkLoad) -> Self {
        ProbeEvent::WorkLoad(e)
    }
}

impl From<NewRoute> for ProbeEvent {
    fn from(e: NewRoute) -> Self {
        ProbeEvent::NewRoute(e)
    }
}

impl From<RouteLost> for ProbeEvent {
    fn from(e: RouteLost) -> Self {
        ProbeEvent::RouteLost(e)
    }
}

impl From<NewMessage> for ProbeEvent {
    fn from(e: NewMessage) -> Self {
        ProbeEvent::NewMessage(e)
    }
}

impl From<ActorPublished> for ProbeEvent {
    fn from(e: ActorPublished) -> Self {
        ProbeEvent::ActorPublished(e)
    }
}

impl From<NodeDisconnected> for ProbeEvent {
    fn from(e: NodeDisconnected) -> Self {
        ProbeEvent::NodeDisconnected(e)
    }
}

/// Everything the nexus knows about a single node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeData {
    pub node: NodeInfo,
    pub ram: Option<RamUsage>,
    pub load: Option<WorkLoad>,
    pub direct_routes: BTreeSet<NodeId>,
    pub published_actors: BTreeSet<(ActorHandle, u16)>,
    pub known_actors: BTreeSet<ActorHandle>,
}

/// The entire cluster snapshot, sent to newly subscribed listeners.
pub type ProbeDataMap = BTreeMap<NodeId, ProbeData>;
