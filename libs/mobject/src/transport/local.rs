use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::{Transport, TransportError};
use crate::host::ProviderHost;
use crate::rpc::RpcRequest;

/// In-process address space: `local://<name>` → provider host.
///
/// Every inbound call is spawned onto the runtime, so handlers run on the
/// worker pool exactly as they would behind a network listener.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    hosts: Arc<RwLock<HashMap<String, Arc<ProviderHost>>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `host` reachable under its own address.
    pub fn bind(&self, host: Arc<ProviderHost>) {
        let address = host.address().to_string();
        tracing::debug!(%address, "Binding local host");
        self.hosts.write().insert(address, host);
    }

    pub fn unbind(&self, address: &str) -> Option<Arc<ProviderHost>> {
        self.hosts.write().remove(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.hosts.read().contains_key(address)
    }

    fn resolve(&self, address: &str) -> Result<Arc<ProviderHost>, TransportError> {
        self.hosts
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| TransportError::UnknownAddress(address.to_string()))
    }

    pub(crate) fn transport(&self, address: &str) -> LocalTransport {
        LocalTransport {
            network: self.clone(),
            address: address.to_string(),
        }
    }
}

/// Resolves the host on every call, so unbinding takes effect immediately.
pub(crate) struct LocalTransport {
    network: LocalNetwork,
    address: String,
}

#[async_trait]
impl Transport for LocalTransport {
    async fn forward(&self, provider_id: u16, req: RpcRequest) -> Result<Value, TransportError> {
        let host = self.network.resolve(&self.address)?;
        tokio::spawn(async move { host.dispatch(provider_id, req).await }).await?
    }

    async fn shutdown_remote(&self) -> Result<(), TransportError> {
        self.network.resolve(&self.address)?.request_shutdown();
        Ok(())
    }
}
