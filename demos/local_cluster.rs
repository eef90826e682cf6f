//! Runs a small single-process cluster: one nexus, one proxy and two
//! probes, then queries the proxy and prints what the cluster looks like.
//!
//! ```sh
//! cargo run --example local_cluster
//! ```

use cluster_monitoring::actors::probe::{ActorCensus, ProbeHandle};
use cluster_monitoring::events::NodeId;
use cluster_monitoring::hooks::HookChain;
use cluster_monitoring::transport::LocalEndpoints;
use cluster_monitoring::{NexusHandle, ProbeConfig, ProxyHandle};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(true),
        )
        .with(filter::LevelFilter::DEBUG)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let endpoints = LocalEndpoints::new();
    let nexus = NexusHandle::spawn();
    endpoints.publish("localhost", 4242, nexus.clone()).await;

    let proxy = ProxyHandle::spawn();
    proxy.init(&nexus).await?;

    let config = ProbeConfig::new("localhost", 4242);
    let mut probes = Vec::new();
    for node in [NodeId(1), NodeId(2)] {
        let census = ActorCensus::new();
        census.increment();
        let mut hooks = HookChain::new();
        let probe =
            ProbeHandle::start(node, &config, &endpoints, &mut hooks, census).await?;
        probe.sample_now().await?;
        probes.push(probe);
    }

    // Let the proxy mirror catch up with the broadcasts.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    for node in proxy.list_nodes().await? {
        let info = proxy.get_node(node).await?;
        let ram = proxy.get_ram_usage(node).await?;
        let load = proxy.get_sys_load(node).await?;
        println!(
            "{node}: host={} cpus={} ram={}MiB/{}MiB load={}% processes={}",
            info.hostname,
            info.cpu.len(),
            ram.in_use / (1024 * 1024),
            (ram.in_use + ram.available) / (1024 * 1024),
            load.cpu_load,
            load.num_processes,
        );
    }

    for probe in &probes {
        probe.shutdown().await;
    }
    proxy.shutdown().await;
    nexus.shutdown().await;
    Ok(())
}
