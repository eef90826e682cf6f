//! Resolution of nexus endpoints
//!
//! A probe only knows a host/port pair from its configuration; a
//! [`NexusResolver`] turns that pair into a usable [`NexusHandle`].
//! [`LocalEndpoints`] is the in-process implementation used by tests and
//! single-process deployments; a networked deployment provides its own
//! resolver over its transport of choice.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::actors::nexus::NexusHandle;

#[async_trait]
pub trait NexusResolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> anyhow::Result<NexusHandle>;
}

/// In-process endpoint registry.
#[derive(Debug, Clone, Default)]
pub struct LocalEndpoints {
    inner: Arc<Mutex<HashMap<(String, u16), NexusHandle>>>,
}

impl LocalEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `nexus` resolvable under `host`/`port`, replacing any
    /// previous binding.
    pub async fn publish(&self, host: impl Into<String>, port: u16, nexus: NexusHandle) {
        let host = host.into();
        debug!(%host, port, "publishing nexus endpoint");
        self.inner.lock().await.insert((host, port), nexus);
    }
}

#[async_trait]
impl NexusResolver for LocalEndpoints {
    async fn resolve(&self, host: &str, port: u16) -> anyhow::Result<NexusHandle> {
        self.inner
            .lock()
            .await
            .get(&(host.to_string(), port))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no nexus published at {host}:{port}"))
    }
}
