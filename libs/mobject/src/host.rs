//! Provider table of one server process.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::provider::{envelope, Provider};
use crate::result::{ErrorKind, RequestResult};
use crate::rpc::RpcRequest;
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("provider {0} is already registered")]
    DuplicateProvider(u16),
}

/// Server side of the RPC engine: routes requests to providers by id.
pub struct ProviderHost {
    address: String,
    providers: RwLock<HashMap<u16, Arc<Provider>>>,
    shutdown: CancellationToken,
}

impl ProviderHost {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            providers: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Address clients use to reach this host.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn register_provider(&self, provider: Arc<Provider>) -> Result<(), HostError> {
        let id = provider.provider_id();
        let mut providers = self.providers.write();
        if providers.contains_key(&id) {
            return Err(HostError::DuplicateProvider(id));
        }
        providers.insert(id, provider);
        tracing::info!(address = %self.address, provider_id = id, "Provider registered");
        Ok(())
    }

    pub fn deregister_provider(&self, provider_id: u16) -> Option<Arc<Provider>> {
        let removed = self.providers.write().remove(&provider_id);
        if removed.is_some() {
            tracing::info!(address = %self.address, provider_id, "Provider deregistered");
        }
        removed
    }

    pub fn provider(&self, provider_id: u16) -> Option<Arc<Provider>> {
        self.providers.read().get(&provider_id).cloned()
    }

    pub fn provider_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.providers.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Run one request against the addressed provider.
    ///
    /// A panicking backend still yields a `backend_operation` failure envelope.
    pub async fn dispatch(&self, provider_id: u16, req: RpcRequest) -> Result<Value, TransportError> {
        let provider = self
            .provider(provider_id)
            .ok_or(TransportError::NoSuchProvider(provider_id))?;
        let op = req.op();
        match AssertUnwindSafe(provider.handle(req)).catch_unwind().await {
            Ok(reply) => Ok(reply),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(provider_id, op, %message, "Request handler panicked");
                Ok(envelope(RequestResult::<()>::err(
                    ErrorKind::BackendOperation,
                    format!("{op} panicked: {message}"),
                )))
            }
        }
    }

    /// Ask the serving loop to stop. Idempotent.
    pub fn request_shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!(address = %self.address, "Remote shutdown requested");
        }
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Deregister every provider and tear each one down.
    pub async fn teardown(&self) {
        let providers: Vec<Arc<Provider>> =
            self.providers.write().drain().map(|(_, p)| p).collect();
        for provider in providers {
            tracing::debug!(provider_id = provider.provider_id(), "Tearing down provider");
            provider.teardown().await;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::BackendFactory;
    use crate::provider::ProviderOptions;

    fn provider(id: u16) -> Arc<Provider> {
        Arc::new(Provider::new(
            ProviderOptions {
                provider_id: id,
                ..Default::default()
            },
            Arc::new(BackendFactory::new()),
        ))
    }

    #[test]
    fn duplicate_provider_rejected() {
        let host = ProviderHost::new("local://h");
        host.register_provider(provider(1)).unwrap();
        assert!(matches!(
            host.register_provider(provider(1)),
            Err(HostError::DuplicateProvider(1))
        ));
        host.register_provider(provider(0)).unwrap();
        assert_eq!(host.provider_ids(), vec![0, 1]);
    }

    #[tokio::test]
    async fn dispatch_to_unknown_provider_fails() {
        let host = ProviderHost::new("local://h");
        host.register_provider(provider(0)).unwrap();

        let req = RpcRequest::CheckSequencer {
            sequencer_id: crate::SequencerId::generate(),
        };
        let err = host.dispatch(4, req.clone()).await.unwrap_err();
        assert!(matches!(err, TransportError::NoSuchProvider(4)));

        let reply = host.dispatch(0, req).await.unwrap();
        assert_eq!(reply["status"], "failure");
        assert_eq!(reply["kind"], "not_found");
    }

    struct Crashing;

    #[async_trait::async_trait]
    impl crate::backend::Backend for Crashing {
        fn say_hello(&self) {}

        async fn compute_sum(&self, _x: i32, _y: i32) -> anyhow::Result<i32> {
            panic!("adder exploded")
        }

        async fn destroy(&self) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn panics_become_failure_envelopes() {
        let mut factory = BackendFactory::new();
        factory.register(
            "crashing",
            |_| Ok(Box::new(Crashing) as Box<dyn crate::backend::Backend>),
            |_| panic!("open is not supported"),
        );
        let host = ProviderHost::new("local://h");
        host.register_provider(Arc::new(Provider::new(
            ProviderOptions::default(),
            Arc::new(factory),
        )))
        .unwrap();

        let reply = host
            .dispatch(
                0,
                RpcRequest::OpenSequencer {
                    token: String::new(),
                    sequencer_type: "crashing".into(),
                    config: "{}".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(reply["status"], "failure");
        assert_eq!(reply["kind"], "backend_operation");
        assert_eq!(reply["error"], "open_sequencer panicked: open is not supported");

        let reply = host
            .dispatch(
                0,
                RpcRequest::CreateSequencer {
                    token: String::new(),
                    sequencer_type: "crashing".into(),
                    config: "{}".into(),
                },
            )
            .await
            .unwrap();
        let id: crate::SequencerId = serde_json::from_value(reply["value"].clone()).unwrap();

        let reply = host
            .dispatch(0, RpcRequest::ComputeSum { sequencer_id: id, x: 1, y: 2 })
            .await
            .unwrap();
        assert_eq!(reply["kind"], "backend_operation");
        assert!(reply["error"].as_str().unwrap().contains("adder exploded"));

        // The provider keeps serving after a panic.
        let reply = host
            .dispatch(0, RpcRequest::CheckSequencer { sequencer_id: id })
            .await
            .unwrap();
        assert_eq!(reply["value"], true);
    }

    #[tokio::test]
    async fn teardown_empties_table_and_shutdown_is_idempotent() {
        let host = ProviderHost::new("local://h");
        host.register_provider(provider(0)).unwrap();
        host.register_provider(provider(2)).unwrap();

        let token = host.shutdown_token();
        host.request_shutdown();
        host.request_shutdown();
        assert!(token.is_cancelled());

        host.teardown().await;
        assert!(host.provider_ids().is_empty());
        assert!(host.deregister_provider(0).is_none());
    }
}
