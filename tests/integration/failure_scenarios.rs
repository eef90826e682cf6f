//! Failure and churn behavior of the monitoring overlay

use cluster_monitoring::actors::probe::{ActorCensus, ProbeHandle};
use cluster_monitoring::events::{NodeId, ProbeEvent, RamUsage};
use cluster_monitoring::hooks::HookChain;
use cluster_monitoring::transport::LocalEndpoints;
use cluster_monitoring::{NexusHandle, ProbeConfig, ProxyHandle};

use crate::helpers::*;

async fn cluster_with_probe(node: u64) -> (NexusHandle, ProbeHandle) {
    let endpoints = LocalEndpoints::new();
    let nexus = NexusHandle::spawn();
    endpoints.publish("nexus.local", 4242, nexus.clone()).await;

    let config = ProbeConfig::new("nexus.local", 4242);
    let mut hooks = HookChain::new();
    let probe = ProbeHandle::start(
        NodeId(node),
        &config,
        &endpoints,
        &mut hooks,
        ActorCensus::new(),
    )
    .await
    .unwrap();
    (nexus, probe)
}

#[tokio::test]
async fn probe_shutdown_disconnects_its_node() {
    let (nexus, probe) = cluster_with_probe(1).await;
    let mut updates = nexus.subscribe().await.unwrap();
    updates.recv().await.unwrap();

    probe.shutdown().await;
    let event = wait_for_event(&mut updates, |e| {
        matches!(e, ProbeEvent::NodeDisconnected(_))
    })
    .await;
    assert_eq!(event.source_node(), NodeId(1));
}

#[tokio::test]
async fn dropped_listener_does_not_stall_the_nexus() {
    let nexus = NexusHandle::spawn();
    let gone = nexus.subscribe().await.unwrap();
    drop(gone);

    let mut alive = nexus.subscribe().await.unwrap();
    alive.recv().await.unwrap();

    nexus.submit(test_node_info(1, "alpha")).await;
    wait_for_event(&mut alive, |e| matches!(e, ProbeEvent::NodeInfo(_))).await;
}

#[tokio::test]
async fn invalid_events_never_reach_state_or_listeners() {
    let nexus = NexusHandle::spawn();
    let mut updates = nexus.subscribe().await.unwrap();
    updates.recv().await.unwrap();

    nexus
        .submit(RamUsage {
            source_node: NodeId::NIL,
            in_use: 1,
            available: 1,
        })
        .await;
    nexus.submit(test_node_info(2, "beta")).await;

    // The first broadcast update must be the valid event.
    let event = wait_for_event(&mut updates, |_| true).await;
    assert!(matches!(event, ProbeEvent::NodeInfo(_)));

    let proxy = ProxyHandle::spawn();
    proxy.init(&nexus).await.unwrap();
    assert_eq!(proxy.list_nodes().await.unwrap(), vec![NodeId(2)]);
}

#[tokio::test]
async fn proxy_init_fails_against_a_dead_nexus() {
    let nexus = NexusHandle::spawn();
    nexus.shutdown().await;
    // Give the nexus task a moment to drain its mailbox and exit.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let proxy = ProxyHandle::spawn();
    assert!(proxy.init(&nexus).await.is_err());
}

#[tokio::test]
async fn second_probe_survives_the_first_one_leaving() {
    let endpoints = LocalEndpoints::new();
    let nexus = NexusHandle::spawn();
    endpoints.publish("nexus.local", 4242, nexus.clone()).await;
    let config = ProbeConfig::new("nexus.local", 4242);

    let mut hooks_one = HookChain::new();
    let probe_one = ProbeHandle::start(
        NodeId(1),
        &config,
        &endpoints,
        &mut hooks_one,
        ActorCensus::new(),
    )
    .await
    .unwrap();
    let mut hooks_two = HookChain::new();
    let probe_two = ProbeHandle::start(
        NodeId(2),
        &config,
        &endpoints,
        &mut hooks_two,
        ActorCensus::new(),
    )
    .await
    .unwrap();

    let mut updates = nexus.subscribe().await.unwrap();
    updates.recv().await.unwrap();

    probe_one.shutdown().await;
    wait_for_event(&mut updates, |e| {
        matches!(e, ProbeEvent::NodeDisconnected(_)) && e.source_node() == NodeId(1)
    })
    .await;

    // The surviving probe still reports.
    probe_two.sample_now().await.unwrap();
    wait_for_event(&mut updates, |e| {
        matches!(e, ProbeEvent::RamUsage(_)) && e.source_node() == NodeId(2)
    })
    .await;
}
