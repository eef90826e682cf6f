//! Transport instrumentation hooks
//!
//! A [`TransportHook`] observes the message layer of a node: message
//! traffic, routing changes and actor publications. Hooks are installed
//! into a [`HookChain`], which dispatches every callback in installation
//! order until a hook asks the chain to stop.
//!
//! [`ForwardingHook`] is the monitoring hook a probe installs: it turns
//! transport callbacks into [`ProbeEvent`]s and forwards them to the
//! probe agent, suppressing the feedback loop that its own uplink traffic
//! would otherwise cause.

use tokio::sync::mpsc;
use tracing::trace;

use crate::events::{
    ActorHandle, ActorPublished, NewMessage, NewRoute, NodeId, ProbeEvent, RouteLost,
};

/// Whether the chain keeps dispatching to later hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFlow {
    Continue,
    Stop,
}

/// Observer interface for transport-level activity.
///
/// Every callback defaults to a no-op that lets the chain continue, so
/// implementors only override what they care about.
pub trait TransportHook: Send {
    fn message_received(
        &mut self,
        _from: ActorHandle,
        _dest: ActorHandle,
        _payload: Option<&serde_json::Value>,
    ) -> HookFlow {
        HookFlow::Continue
    }

    fn message_sent(
        &mut self,
        _from: ActorHandle,
        _dest: ActorHandle,
        _payload: Option<&serde_json::Value>,
    ) -> HookFlow {
        HookFlow::Continue
    }

    /// A direct connection to `dest` came up.
    fn connection_established(&mut self, _dest: NodeId) -> HookFlow {
        HookFlow::Continue
    }

    /// A route to `dest` was learned through `via`.
    fn route_added(&mut self, _via: NodeId, _dest: NodeId) -> HookFlow {
        HookFlow::Continue
    }

    fn route_lost(&mut self, _dest: NodeId) -> HookFlow {
        HookFlow::Continue
    }

    fn actor_published(&mut self, _actor: ActorHandle, _port: u16) -> HookFlow {
        HookFlow::Continue
    }

    fn sending_failed(&mut self, _dest: ActorHandle) -> HookFlow {
        HookFlow::Continue
    }

    fn forwarding_failed(&mut self, _dest: ActorHandle) -> HookFlow {
        HookFlow::Continue
    }

    fn invalid_message(&mut self, _from: ActorHandle) -> HookFlow {
        HookFlow::Continue
    }
}

/// Ordered collection of installed hooks.
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Box<dyn TransportHook>>,
}

macro_rules! dispatch {
    ($self:ident, $($call:tt)*) => {
        for hook in &mut $self.hooks {
            if hook.$($call)* == HookFlow::Stop {
                break;
            }
        }
    };
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook; it runs after all previously installed hooks.
    pub fn install(&mut self, hook: Box<dyn TransportHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn message_received(
        &mut self,
        from: ActorHandle,
        dest: ActorHandle,
        payload: Option<&serde_json::Value>,
    ) {
        dispatch!(self, message_received(from, dest, payload));
    }

    pub fn message_sent(
        &mut self,
        from: ActorHandle,
        dest: ActorHandle,
        payload: Option<&serde_json::Value>,
    ) {
        dispatch!(self, message_sent(from, dest, payload));
    }

    pub fn connection_established(&mut self, dest: NodeId) {
        dispatch!(self, connection_established(dest));
    }

    pub fn route_added(&mut self, via: NodeId, dest: NodeId) {
        dispatch!(self, route_added(via, dest));
    }

    pub fn route_lost(&mut self, dest: NodeId) {
        dispatch!(self, route_lost(dest));
    }

    pub fn actor_published(&mut self, actor: ActorHandle, port: u16) {
        dispatch!(self, actor_published(actor, port));
    }

    pub fn sending_failed(&mut self, dest: ActorHandle) {
        dispatch!(self, sending_failed(dest));
    }

    pub fn forwarding_failed(&mut self, dest: ActorHandle) {
        dispatch!(self, forwarding_failed(dest));
    }

    pub fn invalid_message(&mut self, from: ActorHandle) {
        dispatch!(self, invalid_message(from));
    }
}

/// Monitoring hook installed by a probe.
pub struct ForwardingHook {
    node: NodeId,
    uplink: ActorHandle,
    events: mpsc::UnboundedSender<ProbeEvent>,
}

impl ForwardingHook {
    pub fn new(
        node: NodeId,
        uplink: ActorHandle,
        events: mpsc::UnboundedSender<ProbeEvent>,
    ) -> Self {
        Self {
            node,
            uplink,
            events,
        }
    }

    fn emit(&self, event: impl Into<ProbeEvent>) {
        // The agent shutting down just means no one listens anymore.
        let _ = self.events.send(event.into());
    }
}

impl TransportHook for ForwardingHook {
    fn message_received(
        &mut self,
        from: ActorHandle,
        dest: ActorHandle,
        payload: Option<&serde_json::Value>,
    ) -> HookFlow {
        self.emit(NewMessage {
            source_node: self.node,
            dest_node: dest.node,
            source_actor: from.id,
            dest_actor: dest.id,
            payload: payload.cloned(),
        });
        HookFlow::Continue
    }

    fn message_sent(
        &mut self,
        from: ActorHandle,
        dest: ActorHandle,
        payload: Option<&serde_json::Value>,
    ) -> HookFlow {
        // Reporting the probe's own uplink traffic would generate a new
        // uplink message per report.
        if dest == self.uplink {
            trace!("suppressing uplink traffic report");
            return HookFlow::Continue;
        }
        self.emit(NewMessage {
            source_node: self.node,
            dest_node: dest.node,
            source_actor: from.id,
            dest_actor: dest.id,
            payload: payload.cloned(),
        });
        HookFlow::Continue
    }

    fn connection_established(&mut self, dest: NodeId) -> HookFlow {
        self.emit(NewRoute {
            source_node: self.node,
            dest,
            is_direct: true,
        });
        HookFlow::Continue
    }

    fn route_added(&mut self, _via: NodeId, dest: NodeId) -> HookFlow {
        self.emit(NewRoute {
            source_node: self.node,
            dest,
            is_direct: false,
        });
        HookFlow::Continue
    }

    fn route_lost(&mut self, dest: NodeId) -> HookFlow {
        self.emit(RouteLost {
            source_node: self.node,
            dest,
        });
        HookFlow::Continue
    }

    fn actor_published(&mut self, actor: ActorHandle, port: u16) -> HookFlow {
        self.emit(ActorPublished {
            source_node: self.node,
            published_actor: actor,
            port,
        });
        HookFlow::Continue
    }
}
