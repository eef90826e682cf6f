//! Integration tests for the proxy query surface

use cluster_monitoring::error::QueryError;
use cluster_monitoring::events::{ActorHandle, ActorId, NodeId};
use cluster_monitoring::{NexusHandle, ProxyHandle};
use pretty_assertions::assert_eq;

use crate::helpers::*;

async fn proxy_over(nexus: &NexusHandle) -> ProxyHandle {
    let proxy = ProxyHandle::spawn();
    proxy.init(nexus).await.unwrap();
    proxy
}

/// Queries the proxy until the mirror has caught up with the nexus
/// broadcast, or fails after a bounded number of attempts.
async fn eventually(check: impl AsyncFn() -> bool) {
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("proxy never converged");
}

#[tokio::test]
async fn list_nodes_with_and_without_hostname_filter() {
    let nexus = NexusHandle::spawn();
    nexus.submit(test_node_info(1, "alpha")).await;
    nexus.submit(test_node_info(2, "beta")).await;
    nexus.submit(test_node_info(3, "alpha")).await;

    let proxy = proxy_over(&nexus).await;
    assert_eq!(
        proxy.list_nodes().await.unwrap(),
        vec![NodeId(1), NodeId(2), NodeId(3)]
    );
    assert_eq!(
        proxy.list_nodes_by_hostname("alpha").await.unwrap(),
        vec![NodeId(1), NodeId(3)]
    );
    assert!(proxy
        .list_nodes_by_hostname("missing")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn gauges_and_peers_reflect_nexus_state() {
    let nexus = NexusHandle::spawn();
    nexus.submit(test_node_info(1, "alpha")).await;
    nexus.submit(test_ram(1, 512)).await;
    nexus.submit(test_load(1, 75)).await;
    nexus.submit(direct_route(1, 2)).await;

    let proxy = proxy_over(&nexus).await;
    assert_eq!(proxy.get_ram_usage(NodeId(1)).await.unwrap().in_use, 512);
    assert_eq!(proxy.get_sys_load(NodeId(1)).await.unwrap().cpu_load, 75);
    assert_eq!(proxy.list_peers(NodeId(1)).await.unwrap(), vec![NodeId(2)]);
}

#[tokio::test]
async fn actor_queries_return_handles_or_the_invalid_marker() {
    let nexus = NexusHandle::spawn();
    nexus.submit(published(1, 9, 8080)).await;

    let proxy = proxy_over(&nexus).await;
    let expected = ActorHandle::new(NodeId(1), ActorId(9));
    assert_eq!(proxy.list_actors(NodeId(1)).await.unwrap(), vec![expected]);
    assert_eq!(proxy.get_actor(NodeId(1), ActorId(9)).await.unwrap(), expected);
    assert_eq!(
        proxy.get_actor(NodeId(1), ActorId(10)).await.unwrap(),
        ActorHandle::INVALID
    );
    assert!(proxy.list_actors(NodeId(2)).await.unwrap().is_empty());
}

#[tokio::test]
async fn error_cases_distinguish_unknown_node_from_missing_gauge() {
    let nexus = NexusHandle::spawn();
    nexus.submit(test_node_info(1, "alpha")).await;

    let proxy = proxy_over(&nexus).await;

    let missing_gauge = proxy.get_ram_usage(NodeId(1)).await.unwrap_err();
    assert_eq!(
        missing_gauge.downcast_ref::<QueryError>(),
        Some(&QueryError::NoSuchMetric(NodeId(1)))
    );

    let unknown_node = proxy.get_ram_usage(NodeId(9)).await.unwrap_err();
    assert_eq!(
        unknown_node.downcast_ref::<QueryError>(),
        Some(&QueryError::NoSuchNode(NodeId(9)))
    );
    let unknown_info = proxy.get_node(NodeId(9)).await.unwrap_err();
    assert_eq!(
        unknown_info.downcast_ref::<QueryError>(),
        Some(&QueryError::NoSuchNode(NodeId(9)))
    );
}

#[tokio::test]
async fn mirror_follows_live_updates_after_bootstrap() {
    let nexus = NexusHandle::spawn();
    let proxy = proxy_over(&nexus).await;
    assert!(proxy.list_nodes().await.unwrap().is_empty());

    nexus.submit(test_node_info(4, "delta")).await;
    nexus.submit(test_ram(4, 10)).await;

    eventually(async || {
        proxy
            .get_ram_usage(NodeId(4))
            .await
            .map(|ram| ram.in_use == 10)
            .unwrap_or(false)
    })
    .await;
}

#[tokio::test]
async fn queries_do_not_create_ghost_nodes() {
    let nexus = NexusHandle::spawn();
    let proxy = proxy_over(&nexus).await;

    let _ = proxy.get_node(NodeId(5)).await;
    let _ = proxy.list_peers(NodeId(5)).await;
    let _ = proxy.list_actors(NodeId(5)).await;

    assert!(proxy.list_nodes().await.unwrap().is_empty());
}
