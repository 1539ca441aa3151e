//! Remote administration of providers.

use serde_json::Value;

use crate::error::Result;
use crate::id::SequencerId;
use crate::rpc::RpcRequest;
use crate::transport::Engine;

/// Creates, opens, closes and destroys sequencers on remote providers.
///
/// Every call resolves `address` first, then issues the request. A failure
/// envelope comes back as [`Error::Remote`](crate::Error::Remote) with the
/// provider's message.
#[derive(Clone, Default)]
pub struct Admin {
    engine: Engine,
}

impl Admin {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub async fn create_sequencer(
        &self,
        address: &str,
        provider_id: u16,
        sequencer_type: &str,
        config: &str,
        token: &str,
    ) -> Result<SequencerId> {
        let req = RpcRequest::CreateSequencer {
            token: token.to_string(),
            sequencer_type: sequencer_type.to_string(),
            config: config.to_string(),
        };
        let id = self.engine.lookup(address)?.call(provider_id, req).await?;
        tracing::debug!(address, provider_id, sequencer_id = %id, "Sequencer created");
        Ok(id)
    }

    /// Same as [`create_sequencer`](Self::create_sequencer) with an already structured config.
    pub async fn create_sequencer_json(
        &self,
        address: &str,
        provider_id: u16,
        sequencer_type: &str,
        config: &Value,
        token: &str,
    ) -> Result<SequencerId> {
        self.create_sequencer(address, provider_id, sequencer_type, &config.to_string(), token)
            .await
    }

    pub async fn open_sequencer(
        &self,
        address: &str,
        provider_id: u16,
        sequencer_type: &str,
        config: &str,
        token: &str,
    ) -> Result<SequencerId> {
        let req = RpcRequest::OpenSequencer {
            token: token.to_string(),
            sequencer_type: sequencer_type.to_string(),
            config: config.to_string(),
        };
        let id = self.engine.lookup(address)?.call(provider_id, req).await?;
        tracing::debug!(address, provider_id, sequencer_id = %id, "Sequencer opened");
        Ok(id)
    }

    pub async fn open_sequencer_json(
        &self,
        address: &str,
        provider_id: u16,
        sequencer_type: &str,
        config: &Value,
        token: &str,
    ) -> Result<SequencerId> {
        self.open_sequencer(address, provider_id, sequencer_type, &config.to_string(), token)
            .await
    }

    pub async fn close_sequencer(
        &self,
        address: &str,
        provider_id: u16,
        id: SequencerId,
        token: &str,
    ) -> Result<()> {
        let req = RpcRequest::CloseSequencer {
            token: token.to_string(),
            sequencer_id: id,
        };
        let _: bool = self.engine.lookup(address)?.call(provider_id, req).await?;
        Ok(())
    }

    /// Returns the backend's own answer to `destroy()`.
    pub async fn destroy_sequencer(
        &self,
        address: &str,
        provider_id: u16,
        id: SequencerId,
        token: &str,
    ) -> Result<bool> {
        let req = RpcRequest::DestroySequencer {
            token: token.to_string(),
            sequencer_id: id,
        };
        self.engine.lookup(address)?.call(provider_id, req).await
    }

    /// Ask the process at `address` to stop serving.
    pub async fn shutdown_server(&self, address: &str) -> Result<()> {
        self.engine.lookup(address)?.shutdown_remote().await?;
        tracing::info!(address, "Shutdown requested");
        Ok(())
    }
}
