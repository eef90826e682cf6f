//! Per-node aggregation state table
//!
//! `ClusterState` is the pure core shared by the nexus (authoritative copy)
//! and the proxy (mirrored copy): a `ProbeDataMap` plus the transition rules
//! for every event kind and the read-only query operations. It knows nothing
//! about channels or actors, so the transition table can be exercised
//! directly in tests.
//!
//! ## Transition rules
//!
//! | Event | Effect | Outcome |
//! |---|---|---|
//! | nil source node | none (logged) | `Rejected` |
//! | `NodeInfo` | replace identity wholesale | `Updated` |
//! | `RamUsage` / `WorkLoad` | latest-wins replace | `Updated` |
//! | `ActorPublished` (valid handle) | insert into both actor sets | `Updated` |
//! | `ActorPublished` (invalid handle) | none (logged) | `Rejected` |
//! | `NewRoute` direct, new dest | insert into `direct_routes` | `Updated` |
//! | `NewRoute` duplicate or indirect | none | `NoChange` |
//! | `RouteLost` present | remove from `direct_routes` | `Updated` |
//! | `RouteLost` absent | none | `NoChange` |
//! | `NewMessage` | none (pass-through trace) | `NoChange` |
//! | `NodeDisconnected` | erase entry wholesale | `Updated` |
//!
//! Indirect routes are observed but never stored; there is no
//! `indirect_routes` set.

use tracing::warn;

use crate::error::{QueryError, QueryResult};
use crate::events::{
    ActorHandle, ActorId, NodeId, NodeInfo, ProbeData, ProbeDataMap, ProbeEvent, RamUsage, WorkLoad,
};

/// What applying an event did to the state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The event was malformed and dropped.
    Rejected,

    /// The event was accepted but the table is unchanged.
    NoChange,

    /// The table was mutated.
    Updated,
}

/// The merged per-node view of the cluster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterState {
    data: ProbeDataMap,
}

impl ClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event to the table, returning what changed.
    pub fn apply(&mut self, event: &ProbeEvent) -> Applied {
        if event.source_node().is_nil() {
            warn!("{} received with invalid source node", event.kind());
            return Applied::Rejected;
        }
        match event {
            ProbeEvent::NodeInfo(info) => {
                self.data.entry(info.source_node).or_default().node = info.clone();
                Applied::Updated
            }
            ProbeEvent::RamUsage(ram) => {
                self.data.entry(ram.source_node).or_default().ram = Some(ram.clone());
                Applied::Updated
            }
            ProbeEvent::WorkLoad(load) => {
                self.data.entry(load.source_node).or_default().load = Some(load.clone());
                Applied::Updated
            }
            ProbeEvent::ActorPublished(published) => {
                if published.published_actor.is_invalid() {
                    warn!("actor_published received with invalid actor handle");
                    return Applied::Rejected;
                }
                let entry = self.data.entry(published.source_node).or_default();
                entry.known_actors.insert(published.published_actor);
                entry
                    .published_actors
                    .insert((published.published_actor, published.port));
                Applied::Updated
            }
            ProbeEvent::NewRoute(route) => {
                if route.is_direct
                    && self
                        .data
                        .entry(route.source_node)
                        .or_default()
                        .direct_routes
                        .insert(route.dest)
                {
                    Applied::Updated
                } else {
                    Applied::NoChange
                }
            }
            ProbeEvent::RouteLost(route) => match self.data.get_mut(&route.source_node) {
                Some(entry) => {
                    if entry.direct_routes.remove(&route.dest) {
                        Applied::Updated
                    } else {
                        Applied::NoChange
                    }
                }
                None => Applied::NoChange,
            },
            ProbeEvent::NewMessage(_) => Applied::NoChange,
            ProbeEvent::NodeDisconnected(disconnected) => {
                self.data.remove(&disconnected.source_node);
                Applied::Updated
            }
        }
    }

    /// Replaces the whole table, used for snapshot bootstrap.
    pub fn replace(&mut self, map: ProbeDataMap) {
        self.data = map;
    }

    pub fn snapshot(&self) -> ProbeDataMap {
        self.data.clone()
    }

    pub fn data(&self) -> &ProbeDataMap {
        &self.data
    }

    pub fn get(&self, node: NodeId) -> Option<&ProbeData> {
        self.data.get(&node)
    }

    /// Removes `handle` from `node`'s known actors, if both exist.
    pub fn remove_known_actor(&mut self, node: NodeId, handle: ActorHandle) -> bool {
        self.data
            .get_mut(&node)
            .is_some_and(|entry| entry.known_actors.remove(&handle))
    }

    // ------------------------------------------------------------------
    // Read-only query operations. None of these mutate the table.
    // ------------------------------------------------------------------

    pub fn list_nodes(&self) -> Vec<NodeId> {
        self.data.keys().copied().collect()
    }

    pub fn nodes_by_hostname(&self, hostname: &str) -> Vec<NodeId> {
        self.data
            .iter()
            .filter(|(_, entry)| entry.node.hostname == hostname)
            .map(|(node, _)| *node)
            .collect()
    }

    pub fn node_info(&self, node: NodeId) -> QueryResult<NodeInfo> {
        self.data
            .get(&node)
            .map(|entry| entry.node.clone())
            .ok_or(QueryError::NoSuchNode(node))
    }

    pub fn peers(&self, node: NodeId) -> Vec<NodeId> {
        self.data
            .get(&node)
            .map(|entry| entry.direct_routes.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn sys_load(&self, node: NodeId) -> QueryResult<WorkLoad> {
        match self.data.get(&node) {
            None => Err(QueryError::NoSuchNode(node)),
            Some(entry) => entry.load.clone().ok_or(QueryError::NoSuchMetric(node)),
        }
    }

    pub fn ram_usage(&self, node: NodeId) -> QueryResult<RamUsage> {
        match self.data.get(&node) {
            None => Err(QueryError::NoSuchNode(node)),
            Some(entry) => entry.ram.clone().ok_or(QueryError::NoSuchMetric(node)),
        }
    }

    pub fn actors(&self, node: NodeId) -> Vec<ActorHandle> {
        self.data
            .get(&node)
            .map(|entry| entry.known_actors.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Linear scan for an actor id on a node; invalid handle if not found.
    pub fn actor(&self, node: NodeId, actor: ActorId) -> ActorHandle {
        self.data
            .get(&node)
            .and_then(|entry| entry.known_actors.iter().find(|a| a.id == actor).copied())
            .unwrap_or(ActorHandle::INVALID)
    }
}
