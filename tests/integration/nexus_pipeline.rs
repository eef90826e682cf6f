//! Integration tests for the probe -> nexus -> listener pipeline

use cluster_monitoring::actors::messages::ListenerUpdate;
use cluster_monitoring::actors::monitor::liveness_pair;
use cluster_monitoring::events::{
    ActorHandle, NodeDisconnected, NodeId, ProbeEvent, RouteLost,
};
use cluster_monitoring::NexusHandle;
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn events_flow_from_submission_to_listener() {
    let nexus = NexusHandle::spawn();
    let mut updates = nexus.subscribe().await.unwrap();
    assert!(matches!(
        updates.recv().await.unwrap(),
        ListenerUpdate::Snapshot(_)
    ));

    nexus.submit(test_node_info(1, "alpha")).await;
    nexus.submit(test_ram(1, 100)).await;
    nexus.submit(test_load(1, 40)).await;

    let info = wait_for_event(&mut updates, |e| matches!(e, ProbeEvent::NodeInfo(_))).await;
    assert_eq!(info.source_node(), NodeId(1));
    wait_for_event(&mut updates, |e| matches!(e, ProbeEvent::RamUsage(_))).await;
    wait_for_event(&mut updates, |e| matches!(e, ProbeEvent::WorkLoad(_))).await;
}

#[tokio::test]
async fn late_subscriber_sees_accumulated_state_in_snapshot() {
    let nexus = NexusHandle::spawn();
    nexus.submit(test_node_info(1, "alpha")).await;
    nexus.submit(test_node_info(2, "beta")).await;
    nexus.submit(test_ram(1, 100)).await;
    nexus.submit(direct_route(1, 2)).await;
    nexus.submit(published(2, 5, 8080)).await;

    let mut updates = nexus.subscribe().await.unwrap();
    let snapshot = match updates.recv().await.unwrap() {
        ListenerUpdate::Snapshot(map) => map,
        other => panic!("expected snapshot, got {other:?}"),
    };

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[&NodeId(1)].ram.as_ref().unwrap().in_use, 100);
    assert!(snapshot[&NodeId(1)].direct_routes.contains(&NodeId(2)));
    assert_eq!(snapshot[&NodeId(2)].published_actors.len(), 1);
}

#[tokio::test]
async fn multiple_listeners_receive_the_same_events() {
    let nexus = NexusHandle::spawn();
    let mut first = nexus.subscribe().await.unwrap();
    let mut second = nexus.subscribe().await.unwrap();
    first.recv().await.unwrap();
    second.recv().await.unwrap();

    nexus.submit(test_node_info(3, "gamma")).await;

    let a = wait_for_event(&mut first, |e| matches!(e, ProbeEvent::NodeInfo(_))).await;
    let b = wait_for_event(&mut second, |e| matches!(e, ProbeEvent::NodeInfo(_))).await;
    assert_eq!(a, b);
}

#[tokio::test]
async fn duplicate_route_assertions_are_broadcast_once() {
    let nexus = NexusHandle::spawn();
    let mut updates = nexus.subscribe().await.unwrap();
    updates.recv().await.unwrap();

    nexus.submit(direct_route(1, 2)).await;
    nexus.submit(direct_route(1, 2)).await;
    nexus
        .submit(RouteLost {
            source_node: NodeId(1),
            dest: NodeId(2),
        })
        .await;

    // The duplicate assertion carries no state change and is silent, so
    // the second update after the first route must be the retraction.
    wait_for_event(&mut updates, |e| matches!(e, ProbeEvent::NewRoute(_))).await;
    let next = wait_for_event(&mut updates, |e| {
        matches!(e, ProbeEvent::NewRoute(_) | ProbeEvent::RouteLost(_))
    })
    .await;
    assert!(matches!(next, ProbeEvent::RouteLost(_)));
}

#[tokio::test]
async fn registered_probe_disconnect_reaches_listeners() {
    let nexus = NexusHandle::spawn();
    let (guard, watch) = liveness_pair();
    nexus
        .register(test_node_info(7, "worker"), ActorHandle::fresh(NodeId(7)), watch)
        .await
        .unwrap();

    let mut updates = nexus.subscribe().await.unwrap();
    updates.recv().await.unwrap();

    drop(guard);
    let event = wait_for_event(&mut updates, |e| {
        matches!(e, ProbeEvent::NodeDisconnected(_))
    })
    .await;
    assert_eq!(
        event,
        ProbeEvent::NodeDisconnected(NodeDisconnected {
            source_node: NodeId(7),
        })
    );

    // And the state entry is gone for later subscribers.
    let mut late = nexus.subscribe().await.unwrap();
    match late.recv().await.unwrap() {
        ListenerUpdate::Snapshot(map) => assert!(!map.contains_key(&NodeId(7))),
        other => panic!("expected snapshot, got {other:?}"),
    }
}
