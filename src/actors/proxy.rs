//! Read-only mirror of the nexus state
//!
//! The proxy subscribes to a nexus, bootstraps its own [`ClusterState`]
//! from the initial snapshot and keeps it current by replaying every
//! broadcast event. Queries are answered locally without a round-trip to
//! the nexus.

use anyhow::{bail, Context};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::events::{ActorHandle, ActorId, NodeId, NodeInfo, RamUsage, WorkLoad};
use crate::state::ClusterState;

use super::messages::{ListenerUpdate, ProxyCommand};
use super::nexus::NexusHandle;

struct ProxyActor {
    state: ClusterState,
    updates: Option<mpsc::UnboundedReceiver<ListenerUpdate>>,
    command_rx: mpsc::Receiver<ProxyCommand>,
}

/// Awaits the next update, pending forever while uninitialized so the
/// select loop never polls a missing stream.
async fn next_update(
    updates: &mut Option<mpsc::UnboundedReceiver<ListenerUpdate>>,
) -> Option<ListenerUpdate> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl ProxyActor {
    async fn run(mut self) {
        debug!("proxy started");
        loop {
            tokio::select! {
                update = next_update(&mut self.updates) => {
                    match update {
                        Some(update) => self.apply_update(update),
                        None => {
                            warn!("nexus stream closed, mirror is frozen");
                            self.updates = None;
                        }
                    }
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(ProxyCommand::Shutdown) | None => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }
            }
        }
        debug!("proxy stopped");
    }

    fn apply_update(&mut self, update: ListenerUpdate) {
        match update {
            ListenerUpdate::Snapshot(map) => self.state.replace(map),
            ListenerUpdate::Event(event) => {
                trace!(kind = event.kind(), "mirroring event");
                self.state.apply(&event);
            }
        }
    }

    async fn handle_command(&mut self, command: ProxyCommand) {
        match command {
            ProxyCommand::Init { nexus, respond_to } => {
                let _ = respond_to.send(self.init(nexus).await);
            }
            ProxyCommand::ListNodes {
                hostname,
                respond_to,
            } => {
                let nodes = match hostname {
                    Some(hostname) => self.state.nodes_by_hostname(&hostname),
                    None => self.state.list_nodes(),
                };
                let _ = respond_to.send(nodes);
            }
            ProxyCommand::GetNode { node, respond_to } => {
                let _ = respond_to.send(self.state.node_info(node));
            }
            ProxyCommand::ListPeers { node, respond_to } => {
                let _ = respond_to.send(self.state.peers(node));
            }
            ProxyCommand::GetSysLoad { node, respond_to } => {
                let _ = respond_to.send(self.state.sys_load(node));
            }
            ProxyCommand::GetRamUsage { node, respond_to } => {
                let _ = respond_to.send(self.state.ram_usage(node));
            }
            ProxyCommand::ListActors { node, respond_to } => {
                let _ = respond_to.send(self.state.actors(node));
            }
            ProxyCommand::GetActor {
                node,
                actor,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.actor(node, actor));
            }
            // Shutdown is intercepted by the select loop.
            ProxyCommand::Shutdown => {}
        }
    }

    /// Subscribes to the nexus and blocks until the bootstrap snapshot
    /// arrives. Queries sent in the meantime stay queued in the mailbox
    /// and are answered against the fresh mirror.
    async fn init(&mut self, nexus: NexusHandle) -> anyhow::Result<()> {
        let mut updates = nexus.subscribe().await?;
        loop {
            match updates.recv().await {
                Some(ListenerUpdate::Snapshot(map)) => {
                    debug!(nodes = map.len(), "mirror bootstrapped");
                    self.state.replace(map);
                    self.updates = Some(updates);
                    return Ok(());
                }
                Some(ListenerUpdate::Event(event)) => {
                    // Not expected before the snapshot, but harmless.
                    self.state.apply(&event);
                }
                None => bail!("nexus closed the stream before sending a snapshot"),
            }
        }
    }
}

/// Cloneable reference to a running proxy.
#[derive(Debug, Clone)]
pub struct ProxyHandle {
    sender: mpsc::Sender<ProxyCommand>,
}

impl ProxyHandle {
    /// Spawns a proxy with an empty, uninitialized mirror.
    pub fn spawn() -> ProxyHandle {
        let (sender, command_rx) = mpsc::channel(256);
        let actor = ProxyActor {
            state: ClusterState::default(),
            updates: None,
            command_rx,
        };
        tokio::spawn(actor.run());
        ProxyHandle { sender }
    }

    /// Connects the mirror to a nexus and waits for the bootstrap snapshot.
    pub async fn init(&self, nexus: &NexusHandle) -> anyhow::Result<()> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(ProxyCommand::Init {
                nexus: nexus.clone(),
                respond_to,
            })
            .await
            .context("proxy is not running")?;
        response.await.context("proxy dropped the init request")?
    }

    pub async fn list_nodes(&self) -> anyhow::Result<Vec<NodeId>> {
        self.query(|respond_to| ProxyCommand::ListNodes {
            hostname: None,
            respond_to,
        })
        .await
    }

    pub async fn list_nodes_by_hostname(&self, hostname: &str) -> anyhow::Result<Vec<NodeId>> {
        let hostname = Some(hostname.to_string());
        self.query(|respond_to| ProxyCommand::ListNodes {
            hostname,
            respond_to,
        })
        .await
    }

    pub async fn get_node(&self, node: NodeId) -> anyhow::Result<NodeInfo> {
        Ok(self
            .query(|respond_to| ProxyCommand::GetNode { node, respond_to })
            .await??)
    }

    pub async fn list_peers(&self, node: NodeId) -> anyhow::Result<Vec<NodeId>> {
        self.query(|respond_to| ProxyCommand::ListPeers { node, respond_to })
            .await
    }

    pub async fn get_sys_load(&self, node: NodeId) -> anyhow::Result<WorkLoad> {
        Ok(self
            .query(|respond_to| ProxyCommand::GetSysLoad { node, respond_to })
            .await??)
    }

    pub async fn get_ram_usage(&self, node: NodeId) -> anyhow::Result<RamUsage> {
        Ok(self
            .query(|respond_to| ProxyCommand::GetRamUsage { node, respond_to })
            .await??)
    }

    pub async fn list_actors(&self, node: NodeId) -> anyhow::Result<Vec<ActorHandle>> {
        self.query(|respond_to| ProxyCommand::ListActors { node, respond_to })
            .await
    }

    /// Looks up a single actor; returns the invalid handle if unknown.
    pub async fn get_actor(&self, node: NodeId, actor: ActorId) -> anyhow::Result<ActorHandle> {
        self.query(|respond_to| ProxyCommand::GetActor {
            node,
            actor,
            respond_to,
        })
        .await
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(ProxyCommand::Shutdown).await;
    }

    async fn query<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ProxyCommand,
    ) -> anyhow::Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(make(respond_to))
            .await
            .context("proxy is not running")?;
        response.await.context("proxy dropped the query")
    }
}
