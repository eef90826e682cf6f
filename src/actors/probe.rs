//! Per-node monitoring probe
//!
//! One probe runs on every monitored node. On startup it resolves its
//! nexus, registers with the node's identity card and then feeds the
//! nexus from two sources: a telemetry ticker pushing the memory and
//! load gauges, and a [`ForwardingHook`] installed into the node's
//! transport layer reporting traffic and topology changes.

use std::time::Duration;

use anyhow::Context;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::ProbeConfig;
use crate::events::{ActorHandle, NodeId, ProbeEvent};
use crate::hooks::{ForwardingHook, HookChain};
use crate::host::{self, HostSampler};
use crate::transport::NexusResolver;

use super::messages::ProbeCommand;
use super::monitor::{liveness_pair, LivenessGuard};
use super::nexus::NexusHandle;

/// Shared counter of actors alive on the local node, reported in the
/// load gauge. The runtime increments and decrements it as actors come
/// and go.
#[derive(Debug, Clone, Default)]
pub struct ActorCensus(Arc<AtomicU64>);

impl ActorCensus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero, so an unmatched decrement cannot wrap the
    /// gauge around.
    pub fn decrement(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                count.checked_sub(1)
            });
    }

    pub fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

struct ProbeAgent {
    node: NodeId,
    uplink: NexusHandle,
    command_rx: mpsc::Receiver<ProbeCommand>,
    hook_rx: Option<mpsc::UnboundedReceiver<ProbeEvent>>,
    interval: Duration,
    sampler: HostSampler,
    census: ActorCensus,
    // Dropping this tells the nexus the node disconnected.
    _guard: LivenessGuard,
}

/// Awaits the next hook event, pending forever once all hook senders
/// are gone so the select loop stops polling the closed channel.
async fn next_hook_event(
    hook_rx: &mut Option<mpsc::UnboundedReceiver<ProbeEvent>>,
) -> Option<ProbeEvent> {
    match hook_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl ProbeAgent {
    async fn run(mut self) {
        debug!(node = %self.node, "probe started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.push_telemetry().await;
                }
                event = next_hook_event(&mut self.hook_rx) => {
                    match event {
                        Some(event) => self.uplink.submit(event).await,
                        None => {
                            // All hook senders are gone; traffic reporting
                            // stops but telemetry keeps flowing.
                            self.hook_rx = None;
                        }
                    }
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(ProbeCommand::SampleNow { respond_to }) => {
                            self.push_telemetry().await;
                            let _ = respond_to.send(Ok(()));
                        }
                        Some(ProbeCommand::UpdateInterval { interval_secs }) => {
                            self.interval = Duration::from_secs(interval_secs.max(1));
                            ticker = tokio::time::interval(self.interval);
                            ticker.set_missed_tick_behavior(
                                tokio::time::MissedTickBehavior::Skip,
                            );
                        }
                        Some(ProbeCommand::Shutdown) | None => break,
                    }
                }
            }
        }
        debug!(node = %self.node, "probe stopped");
    }

    async fn push_telemetry(&mut self) {
        let (ram, load) = self.sampler.sample(self.node, self.census.count());
        self.uplink.submit(ram).await;
        self.uplink.submit(load).await;
    }
}

/// Cloneable reference to a running probe agent.
#[derive(Debug, Clone)]
pub struct ProbeHandle {
    sender: mpsc::Sender<ProbeCommand>,
}

impl ProbeHandle {
    /// Resolves the configured nexus, registers this node with it,
    /// installs the monitoring hook into `hooks` and spawns the agent.
    ///
    /// Fails fast when the nexus cannot be resolved or refuses the
    /// registration; there is no retry.
    pub async fn start(
        node: NodeId,
        config: &ProbeConfig,
        resolver: &dyn NexusResolver,
        hooks: &mut HookChain,
        census: ActorCensus,
    ) -> anyhow::Result<ProbeHandle> {
        config.validate()?;
        let nexus = resolver
            .resolve(&config.nexus_host, config.nexus_port)
            .await
            .with_context(|| {
                format!(
                    "cannot reach nexus at {}:{}",
                    config.nexus_host, config.nexus_port
                )
            })?;

        let (guard, watch) = liveness_pair();
        let info = host::gather_node_info(node);
        let uplink_identity = ActorHandle::fresh(node);
        let uplink = nexus
            .register(info, uplink_identity, watch)
            .await
            .context("nexus refused the registration")?;

        let (hook_tx, hook_rx) = mpsc::unbounded_channel();
        hooks.install(Box::new(ForwardingHook::new(node, uplink_identity, hook_tx)));

        let (sender, command_rx) = mpsc::channel(16);
        let agent = ProbeAgent {
            node,
            uplink,
            command_rx,
            hook_rx: Some(hook_rx),
            interval: Duration::from_secs(config.telemetry_interval.max(1)),
            sampler: HostSampler::new(),
            census,
            _guard: guard,
        };
        tokio::spawn(agent.run());
        Ok(ProbeHandle { sender })
    }

    /// Pushes a telemetry sample immediately.
    pub async fn sample_now(&self) -> anyhow::Result<()> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(ProbeCommand::SampleNow { respond_to })
            .await
            .context("probe is not running")?;
        response.await.context("probe dropped the request")?
    }

    /// Changes the telemetry interval; sub-second values are clamped
    /// to one second.
    pub async fn update_interval(&self, interval_secs: u64) {
        if self
            .sender
            .send(ProbeCommand::UpdateInterval { interval_secs })
            .await
            .is_err()
        {
            warn!("probe is not running");
        }
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(ProbeCommand::Shutdown).await;
    }
}
