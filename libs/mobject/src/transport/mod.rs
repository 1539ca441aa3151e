//! Address resolution and request forwarding.
//!
//! Two address schemes are understood:
//! - `local://<name>`: an in-process [`LocalNetwork`], used by tests and
//!   embedded deployments;
//! - `http://host:port`: a remote `mobject-server` reached over JSON/HTTP.

pub mod http;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::result::RequestResult;
use crate::rpc::RpcRequest;

pub use http::HttpTransport;
pub use local::LocalNetwork;

pub const LOCAL_SCHEME: &str = "local://";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot resolve address {0}")]
    UnknownAddress(String),
    #[error("unsupported address {0}")]
    UnsupportedScheme(String),
    #[error("no provider with id {0}")]
    NoSuchProvider(u16),
    #[error("request to {address} failed: {source}")]
    Http {
        address: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{address} answered with HTTP {status}")]
    Status { address: String, status: u16 },
    #[error("request handler aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// Moves one request to a provider and brings back its raw reply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn forward(&self, provider_id: u16, req: RpcRequest) -> Result<Value, TransportError>;

    /// Ask the process behind this endpoint to stop serving.
    async fn shutdown_remote(&self) -> Result<(), TransportError>;
}

/// Client-side engine: turns addresses into endpoints.
#[derive(Clone)]
pub struct Engine {
    http: reqwest::Client,
    local: LocalNetwork,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_local(LocalNetwork::new())
    }

    /// Engine that also resolves `local://` addresses bound on `network`.
    pub fn with_local(network: LocalNetwork) -> Self {
        Self {
            http: reqwest::Client::new(),
            local: network,
        }
    }

    pub fn local_network(&self) -> &LocalNetwork {
        &self.local
    }

    pub fn lookup(&self, address: &str) -> Result<Endpoint, TransportError> {
        let transport: Arc<dyn Transport> = if address.starts_with(LOCAL_SCHEME) {
            if !self.local.contains(address) {
                return Err(TransportError::UnknownAddress(address.to_string()));
            }
            Arc::new(self.local.transport(address))
        } else if address.starts_with("http://") || address.starts_with("https://") {
            Arc::new(HttpTransport::new(self.http.clone(), address))
        } else {
            return Err(TransportError::UnsupportedScheme(address.to_string()));
        };

        Ok(Endpoint {
            address: address.to_string(),
            transport,
        })
    }
}

/// A resolved address.
#[derive(Clone)]
pub struct Endpoint {
    address: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Endpoint {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn forward(&self, provider_id: u16, req: RpcRequest) -> Result<Value, TransportError> {
        self.transport.forward(provider_id, req).await
    }

    /// Issue `req` in the background and return at once.
    pub fn forward_detached(
        &self,
        provider_id: u16,
        req: RpcRequest,
    ) -> JoinHandle<Result<Value, TransportError>> {
        let transport = self.transport.clone();
        tokio::spawn(async move { transport.forward(provider_id, req).await })
    }

    /// Forward `req` and unwrap the envelope.
    pub async fn call<T: DeserializeOwned>(&self, provider_id: u16, req: RpcRequest) -> Result<T, Error> {
        let reply = self.forward(provider_id, req).await?;
        unwrap_envelope(reply)
    }

    pub async fn shutdown_remote(&self) -> Result<(), TransportError> {
        self.transport.shutdown_remote().await
    }
}

/// Decode a reply envelope and turn a failure into [`Error::Remote`].
pub(crate) fn unwrap_envelope<T: DeserializeOwned>(reply: Value) -> Result<T, Error> {
    let envelope: RequestResult<T> = serde_json::from_value(reply)?;
    Ok(envelope.into_result()?)
}
