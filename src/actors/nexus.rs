//! Central aggregation engine for cluster monitoring data
//!
//! The nexus ingests events from registered probes, folds them into the
//! authoritative [`ClusterState`] and re-broadcasts every accepted event to
//! all subscribed listeners. Probe uplinks and listeners are both watched
//! for liveness; when one goes away, its state is cleaned up and the rest
//! of the cluster is informed via a synthesized disconnect event.

use std::collections::HashMap;

use anyhow::Context;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, trace, warn};

use crate::events::{ActorHandle, NodeDisconnected, NodeId, NodeInfo, ProbeEvent};
use crate::state::{Applied, ClusterState};

use super::messages::{Listener, ListenerUpdate, NexusCommand, PeerId};
use super::monitor::LivenessWatch;

/// A registered probe uplink and the node it reports for.
#[derive(Debug)]
struct ProbeRegistration {
    uplink: ActorHandle,
    node: NodeId,
}

struct NexusActor {
    state: ClusterState,
    probes: HashMap<PeerId, ProbeRegistration>,
    listeners: Vec<(PeerId, Listener)>,
    command_rx: mpsc::Receiver<NexusCommand>,
    self_tx: mpsc::Sender<NexusCommand>,
    next_peer: u64,
}

impl NexusActor {
    async fn run(mut self) {
        debug!("nexus started");
        while let Some(command) = self.command_rx.recv().await {
            match command {
                NexusCommand::Event(event) => self.apply_event(event),
                NexusCommand::Register {
                    info,
                    uplink,
                    watch,
                    respond_to,
                } => self.register_probe(info, uplink, watch, respond_to),
                NexusCommand::Subscribe { listener } => self.add_listener(listener),
                NexusCommand::PeerDown { peer } => self.peer_down(peer),
                NexusCommand::Shutdown => break,
            }
        }
        debug!("nexus stopped");
    }

    /// Folds an event into the cluster state and broadcasts it if accepted.
    ///
    /// Rejected events are dropped silently. Events that carry no state
    /// change are still broadcast when they are pure notifications
    /// (message traffic), since listeners may want to observe them.
    #[instrument(skip(self))]
    fn apply_event(&mut self, event: ProbeEvent) {
        let broadcast = match self.state.apply(&event) {
            Applied::Rejected => false,
            Applied::Updated => true,
            Applied::NoChange => matches!(event, ProbeEvent::NewMessage(_)),
        };
        if broadcast {
            trace!(kind = event.kind(), "broadcasting event");
            for (_, listener) in &self.listeners {
                listener.push(ListenerUpdate::Event(event.clone()));
            }
        }
    }

    fn register_probe(
        &mut self,
        info: NodeInfo,
        uplink: ActorHandle,
        watch: LivenessWatch,
        respond_to: Option<oneshot::Sender<NexusHandle>>,
    ) {
        if info.source_node.is_nil() {
            warn!("dropping registration without a source node");
            return;
        }
        debug!(node = %info.source_node, "probe registered");
        let node = info.source_node;
        self.apply_event(ProbeEvent::NodeInfo(info));

        let peer = self.alloc_peer();
        self.probes.insert(peer, ProbeRegistration { uplink, node });
        self.monitor(peer, watch);

        if let Some(tx) = respond_to {
            let _ = tx.send(NexusHandle {
                sender: self.self_tx.clone(),
            });
        }
    }

    fn add_listener(&mut self, listener: Listener) {
        if self
            .listeners
            .iter()
            .any(|(_, existing)| existing.same_channel(&listener))
        {
            return;
        }
        // The snapshot must precede any event so the subscriber never sees
        // an update it has no base state for.
        listener.push(ListenerUpdate::Snapshot(self.state.snapshot()));

        let peer = self.alloc_peer();
        let notify = self.self_tx.clone();
        let watched = listener.clone();
        tokio::spawn(async move {
            watched.closed().await;
            let _ = notify.send(NexusCommand::PeerDown { peer }).await;
        });
        self.listeners.push((peer, listener));
        debug!("listener subscribed");
    }

    /// Removes a dead peer. Idempotent: a second notification for the same
    /// peer finds nothing to remove.
    fn peer_down(&mut self, peer: PeerId) {
        if let Some(position) = self.listeners.iter().position(|(id, _)| *id == peer) {
            self.listeners.remove(position);
            debug!("listener removed");
            return;
        }
        if let Some(registration) = self.probes.remove(&peer) {
            debug!(node = %registration.node, "probe lost, disconnecting node");
            self.state
                .remove_known_actor(registration.node, registration.uplink);
            self.apply_event(ProbeEvent::NodeDisconnected(NodeDisconnected {
                source_node: registration.node,
            }));
        }
    }

    fn monitor(&self, peer: PeerId, watch: LivenessWatch) {
        let notify = self.self_tx.clone();
        tokio::spawn(async move {
            watch.lost().await;
            let _ = notify.send(NexusCommand::PeerDown { peer }).await;
        });
    }

    fn alloc_peer(&mut self) -> PeerId {
        let peer = PeerId(self.next_peer);
        self.next_peer += 1;
        peer
    }
}

/// Cloneable reference to a running nexus.
#[derive(Debug, Clone)]
pub struct NexusHandle {
    sender: mpsc::Sender<NexusCommand>,
}

impl NexusHandle {
    /// Spawns a fresh nexus with empty state and returns a handle to it.
    pub fn spawn() -> NexusHandle {
        let (sender, command_rx) = mpsc::channel(256);
        let actor = NexusActor {
            state: ClusterState::default(),
            probes: HashMap::new(),
            listeners: Vec::new(),
            command_rx,
            self_tx: sender.clone(),
            next_peer: 0,
        };
        tokio::spawn(actor.run());
        NexusHandle { sender }
    }

    /// Submits a monitoring event for aggregation.
    pub async fn submit(&self, event: impl Into<ProbeEvent>) {
        let _ = self
            .sender
            .send(NexusCommand::Event(event.into()))
            .await;
    }

    /// Registers a probe uplink and waits for the acknowledgement.
    pub async fn register(
        &self,
        info: NodeInfo,
        uplink: ActorHandle,
        watch: LivenessWatch,
    ) -> anyhow::Result<NexusHandle> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(NexusCommand::Register {
                info,
                uplink,
                watch,
                respond_to: Some(respond_to),
            })
            .await
            .context("nexus is not running")?;
        response
            .await
            .context("nexus did not acknowledge registration")
    }

    /// Subscribes to the broadcast stream. The first update on the
    /// returned receiver is always a full snapshot.
    pub async fn subscribe(&self) -> anyhow::Result<mpsc::UnboundedReceiver<ListenerUpdate>> {
        let (listener, updates) = Listener::channel();
        self.sender
            .send(NexusCommand::Subscribe { listener })
            .await
            .context("nexus is not running")?;
        Ok(updates)
    }

    /// Asks the nexus to stop. Pending commands ahead of the request are
    /// still processed.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(NexusCommand::Shutdown).await;
    }
}
