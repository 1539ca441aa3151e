//! Client side: handles bound to remote sequencers.

use std::sync::Arc;

use crate::async_request::AsyncRequest;
use crate::error::Result;
use crate::id::SequencerId;
use crate::rpc::RpcRequest;
use crate::transport::{unwrap_envelope, Endpoint, Engine};

/// Entry point for talking to sequencers.
#[derive(Clone, Default)]
pub struct Client {
    engine: Engine,
}

impl Client {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Client configuration as JSON. There is nothing to configure yet.
    pub fn get_config(&self) -> String {
        "{}".to_string()
    }

    /// Bind a handle to sequencer `id` on `provider_id` at `address`.
    ///
    /// With `check`, the provider is asked first and a missing sequencer is an
    /// error. Without it no request is sent and a bad id surfaces on first use.
    pub async fn make_sequencer_handle(
        &self,
        address: &str,
        provider_id: u16,
        id: SequencerId,
        check: bool,
    ) -> Result<SequencerHandle> {
        let endpoint = self.engine.lookup(address)?;
        if check {
            let _: bool = endpoint
                .call(provider_id, RpcRequest::CheckSequencer { sequencer_id: id })
                .await?;
        }
        Ok(SequencerHandle {
            inner: Arc::new(Inner {
                client: self.clone(),
                endpoint,
                provider_id,
                sequencer_id: id,
            }),
        })
    }
}

struct Inner {
    client: Client,
    endpoint: Endpoint,
    provider_id: u16,
    sequencer_id: SequencerId,
}

/// Proxy for one remote sequencer. Cheap to clone; never changes once built.
#[derive(Clone)]
pub struct SequencerHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SequencerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequencerHandle")
            .field("address", &self.address())
            .field("provider_id", &self.inner.provider_id)
            .field("sequencer_id", &self.inner.sequencer_id)
            .finish()
    }
}

impl SequencerHandle {
    pub fn sequencer_id(&self) -> SequencerId {
        self.inner.sequencer_id
    }

    pub fn provider_id(&self) -> u16 {
        self.inner.provider_id
    }

    pub fn address(&self) -> &str {
        self.inner.endpoint.address()
    }

    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// Greet the sequencer. Only delivery failures are reported.
    pub async fn say_hello(&self) -> Result<()> {
        self.inner
            .endpoint
            .forward(
                self.inner.provider_id,
                RpcRequest::SayHello {
                    sequencer_id: self.inner.sequencer_id,
                },
            )
            .await?;
        Ok(())
    }

    /// Add two numbers remotely and wait for the answer.
    pub async fn compute_sum(&self, x: i32, y: i32) -> Result<i32> {
        self.inner
            .endpoint
            .call(self.inner.provider_id, self.sum_request(x, y))
            .await
    }

    /// Start the addition and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn compute_sum_async(&self, x: i32, y: i32) -> AsyncRequest<i32> {
        let pending = self
            .inner
            .endpoint
            .forward_detached(self.inner.provider_id, self.sum_request(x, y));
        AsyncRequest::new(pending, unwrap_envelope::<i32>)
    }

    fn sum_request(&self, x: i32, y: i32) -> RpcRequest {
        RpcRequest::ComputeSum {
            sequencer_id: self.inner.sequencer_id,
            x,
            y,
        }
    }
}
