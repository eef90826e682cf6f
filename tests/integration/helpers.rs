//! Shared fixtures for the integration tests

use cluster_monitoring::events::{
    ActorHandle, ActorId, ActorPublished, NewRoute, NodeId, NodeInfo, ProbeEvent, RamUsage,
    WorkLoad,
};

pub fn test_node_info(id: u64, hostname: &str) -> NodeInfo {
    NodeInfo {
        source_node: NodeId(id),
        hostname: hostname.to_string(),
        os: "test-os".to_string(),
        ..NodeInfo::default()
    }
}

pub fn test_ram(id: u64, in_use: u64) -> RamUsage {
    RamUsage {
        source_node: NodeId(id),
        in_use,
        available: 1024 - in_use,
    }
}

pub fn test_load(id: u64, cpu_load: u8) -> WorkLoad {
    WorkLoad {
        source_node: NodeId(id),
        cpu_load,
        num_processes: 10,
        num_actors: 2,
    }
}

pub fn direct_route(from: u64, to: u64) -> NewRoute {
    NewRoute {
        source_node: NodeId(from),
        dest: NodeId(to),
        is_direct: true,
    }
}

pub fn published(node: u64, actor: u64, port: u16) -> ActorPublished {
    ActorPublished {
        source_node: NodeId(node),
        published_actor: ActorHandle::new(NodeId(node), ActorId(actor)),
        port,
    }
}

/// Collects non-snapshot updates until `predicate` matches or the
/// timeout hits.
pub async fn wait_for_event(
    updates: &mut tokio::sync::mpsc::UnboundedReceiver<
        cluster_monitoring::actors::messages::ListenerUpdate,
    >,
    predicate: impl Fn(&ProbeEvent) -> bool,
) -> ProbeEvent {
    use cluster_monitoring::actors::messages::ListenerUpdate;

    let deadline = std::time::Duration::from_secs(2);
    tokio::time::timeout(deadline, async {
        loop {
            match updates.recv().await {
                Some(ListenerUpdate::Event(event)) if predicate(&event) => return event,
                Some(_) => continue,
                None => panic!("update stream closed while waiting for event"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
