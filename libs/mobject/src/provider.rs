//! Server-side sequencer registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::backend::Backend;
use crate::factory::{BackendArgs, BackendFactory, FactoryError};
use crate::id::SequencerId;
use crate::result::{ErrorKind, RemoteError, RequestResult};
use crate::rpc::RpcRequest;

/// What happens to live sequencers when a provider is torn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeardownPolicy {
    /// Drop instances; their external state is left in place.
    #[default]
    Detach,
    /// Call `destroy()` on every remaining instance.
    Destroy,
}

/// Per-provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderOptions {
    pub provider_id: u16,
    /// Shared secret for admin operations; empty disables the check.
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub teardown: TeardownPolicy,
}

#[derive(Clone, Copy)]
enum Construct {
    Create,
    Open,
}

impl Construct {
    fn verb(self) -> &'static str {
        match self {
            Self::Create => "Created",
            Self::Open => "Opened",
        }
    }
}

/// Owns the live sequencers of one provider id and serves requests against them.
///
/// The map lock only covers insertion, removal and lookup. Backend calls run
/// on a cloned `Arc` after the guard is dropped, so slow backends never block
/// other sequencers.
pub struct Provider {
    options: ProviderOptions,
    factory: Arc<BackendFactory>,
    sequencers: Mutex<HashMap<SequencerId, Arc<dyn Backend>>>,
}

impl Provider {
    pub fn new(options: ProviderOptions, factory: Arc<BackendFactory>) -> Self {
        tracing::debug!(
            provider_id = options.provider_id,
            token_protected = !options.token.is_empty(),
            teardown = ?options.teardown,
            "Provider created"
        );
        Self {
            options,
            factory,
            sequencers: Mutex::new(HashMap::new()),
        }
    }

    pub fn provider_id(&self) -> u16 {
        self.options.provider_id
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Number of live sequencers.
    pub fn len(&self) -> usize {
        self.sequencers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequencers.lock().is_empty()
    }

    /// Ids of the live sequencers, in no particular order.
    pub fn sequencer_ids(&self) -> Vec<SequencerId> {
        self.sequencers.lock().keys().copied().collect()
    }

    /// Describe this provider. The token is never included.
    pub fn get_config(&self) -> Value {
        let mut ids: Vec<String> = self
            .sequencer_ids()
            .iter()
            .map(SequencerId::to_string)
            .collect();
        ids.sort_unstable();
        json!({
            "provider_id": self.options.provider_id,
            "teardown": self.options.teardown,
            "token_protected": !self.options.token.is_empty(),
            "sequencers": ids,
        })
    }

    // ---- admin operations ----

    pub fn create_sequencer(
        &self,
        token: &str,
        sequencer_type: &str,
        config: &str,
    ) -> RequestResult<SequencerId> {
        self.construct(Construct::Create, token, sequencer_type, config)
            .into()
    }

    pub fn open_sequencer(
        &self,
        token: &str,
        sequencer_type: &str,
        config: &str,
    ) -> RequestResult<SequencerId> {
        self.construct(Construct::Open, token, sequencer_type, config)
            .into()
    }

    /// Unregister a sequencer without destroying its state.
    pub fn close_sequencer(&self, token: &str, id: SequencerId) -> RequestResult<bool> {
        let res = self.check_token(token).and_then(|()| {
            self.remove(id)?;
            tracing::info!(provider_id = self.provider_id(), sequencer_id = %id, "Closed sequencer");
            Ok(true)
        });
        res.into()
    }

    /// Unregister a sequencer, then destroy it and forward the backend's answer.
    pub async fn destroy_sequencer(&self, token: &str, id: SequencerId) -> RequestResult<bool> {
        if let Err(e) = self.check_token(token) {
            return e.into_envelope();
        }
        let backend = match self.remove(id) {
            Ok(backend) => backend,
            Err(e) => return e.into_envelope(),
        };

        match backend.destroy().await {
            Ok(destroyed) => {
                tracing::info!(
                    provider_id = self.provider_id(),
                    sequencer_id = %id,
                    destroyed,
                    "Destroyed sequencer"
                );
                RequestResult::ok(destroyed)
            }
            Err(e) => {
                tracing::warn!(
                    provider_id = self.provider_id(),
                    sequencer_id = %id,
                    error = %format!("{e:#}"),
                    "Sequencer destroy failed"
                );
                RequestResult::err(ErrorKind::BackendOperation, format!("{e:#}"))
            }
        }
    }

    // ---- unauthenticated operations ----

    pub fn check_sequencer(&self, id: SequencerId) -> RequestResult<bool> {
        self.lookup(id).map(|_| true).into()
    }

    pub fn say_hello(&self, id: SequencerId) -> RequestResult<()> {
        self.lookup(id).map(|backend| backend.say_hello()).into()
    }

    pub async fn compute_sum(&self, id: SequencerId, x: i32, y: i32) -> RequestResult<i32> {
        let backend = match self.lookup(id) {
            Ok(backend) => backend,
            Err(e) => return e.into_envelope(),
        };
        match backend.compute_sum(x, y).await {
            Ok(sum) => RequestResult::ok(sum),
            Err(e) => RequestResult::err(ErrorKind::BackendOperation, format!("{e:#}")),
        }
    }

    /// Decode-side entry point: run `req` and serialize the envelope.
    ///
    /// `say_hello` has no reply payload and yields `null`.
    pub async fn handle(&self, req: RpcRequest) -> Value {
        tracing::trace!(provider_id = self.provider_id(), op = req.op(), "Handling request");
        match req {
            RpcRequest::CreateSequencer {
                token,
                sequencer_type,
                config,
            } => envelope(self.create_sequencer(&token, &sequencer_type, &config)),
            RpcRequest::OpenSequencer {
                token,
                sequencer_type,
                config,
            } => envelope(self.open_sequencer(&token, &sequencer_type, &config)),
            RpcRequest::CloseSequencer {
                token,
                sequencer_id,
            } => envelope(self.close_sequencer(&token, sequencer_id)),
            RpcRequest::DestroySequencer {
                token,
                sequencer_id,
            } => envelope(self.destroy_sequencer(&token, sequencer_id).await),
            RpcRequest::CheckSequencer { sequencer_id } => {
                envelope(self.check_sequencer(sequencer_id))
            }
            RpcRequest::SayHello { sequencer_id } => {
                if let Err(error) = self.say_hello(sequencer_id).into_result() {
                    tracing::debug!(provider_id = self.provider_id(), %error, "say_hello dropped");
                }
                Value::Null
            }
            RpcRequest::ComputeSum { sequencer_id, x, y } => {
                envelope(self.compute_sum(sequencer_id, x, y).await)
            }
        }
    }

    /// Empty the registry, applying the configured [`TeardownPolicy`].
    pub async fn teardown(&self) {
        let drained: Vec<(SequencerId, Arc<dyn Backend>)> =
            std::mem::take(&mut *self.sequencers.lock()).into_iter().collect();
        if drained.is_empty() {
            return;
        }

        match self.options.teardown {
            TeardownPolicy::Detach => {
                tracing::info!(
                    provider_id = self.provider_id(),
                    count = drained.len(),
                    "Detached sequencers on teardown"
                );
            }
            TeardownPolicy::Destroy => {
                for (id, backend) in drained {
                    match backend.destroy().await {
                        Ok(destroyed) => tracing::info!(
                            provider_id = self.provider_id(),
                            sequencer_id = %id,
                            destroyed,
                            "Destroyed sequencer on teardown"
                        ),
                        Err(e) => tracing::warn!(
                            provider_id = self.provider_id(),
                            sequencer_id = %id,
                            error = %format!("{e:#}"),
                            "Sequencer destroy failed on teardown"
                        ),
                    }
                }
            }
        }
    }

    // ---- internals ----

    fn check_token(&self, token: &str) -> Result<(), RemoteError> {
        if !self.options.token.is_empty() && self.options.token != token {
            tracing::warn!(provider_id = self.provider_id(), "Rejected admin request with invalid token");
            return Err(RemoteError::new(ErrorKind::Auth, "Invalid security token"));
        }
        Ok(())
    }

    fn construct(
        &self,
        how: Construct,
        token: &str,
        sequencer_type: &str,
        config: &str,
    ) -> Result<SequencerId, RemoteError> {
        self.check_token(token)?;
        if !self.factory.contains(sequencer_type) {
            return Err(RemoteError::new(
                ErrorKind::UnknownBackendType,
                format!("Unknown sequencer type {sequencer_type}"),
            ));
        }
        let config = parse_config(config)?;

        let args = BackendArgs {
            provider_id: self.provider_id(),
            config: &config,
        };
        let built = match how {
            Construct::Create => self.factory.create(sequencer_type, &args),
            Construct::Open => self.factory.open(sequencer_type, &args),
        };
        let backend: Arc<dyn Backend> = built
            .map_err(|e| {
                let kind = match e {
                    FactoryError::UnknownType(_) => ErrorKind::UnknownBackendType,
                    FactoryError::Construction { .. } => ErrorKind::BackendConstruction,
                };
                RemoteError::new(kind, e.to_string())
            })?
            .into();

        let id = SequencerId::generate();
        self.sequencers.lock().insert(id, backend);

        tracing::info!(
            provider_id = self.provider_id(),
            sequencer_id = %id,
            sequencer_type,
            "{} sequencer",
            how.verb()
        );
        Ok(id)
    }

    fn lookup(&self, id: SequencerId) -> Result<Arc<dyn Backend>, RemoteError> {
        self.sequencers
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    fn remove(&self, id: SequencerId) -> Result<Arc<dyn Backend>, RemoteError> {
        self.sequencers.lock().remove(&id).ok_or_else(|| not_found(id))
    }
}

impl RemoteError {
    fn into_envelope<T>(self) -> RequestResult<T> {
        RequestResult::err(self.kind, self.message)
    }
}

fn not_found(id: SequencerId) -> RemoteError {
    RemoteError::new(ErrorKind::NotFound, format!("Sequencer {id} not found"))
}

fn parse_config(config: &str) -> Result<Value, RemoteError> {
    let value: Value = serde_json::from_str(config).map_err(|e| {
        RemoteError::new(
            ErrorKind::ConfigParse,
            format!("Could not parse sequencer configuration: {e}"),
        )
    })?;
    if !value.is_object() {
        return Err(RemoteError::new(
            ErrorKind::ConfigParse,
            "Sequencer configuration must be a JSON object",
        ));
    }
    Ok(value)
}

pub(crate) fn envelope<T: Serialize>(result: RequestResult<T>) -> Value {
    serde_json::to_value(&result).unwrap_or_else(|e| {
        json!({
            "status": "failure",
            "kind": ErrorKind::BackendOperation,
            "error": format!("Could not encode reply: {e}"),
        })
    })
}
