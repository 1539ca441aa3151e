//! # Mobject - remotely addressable sequencer backends
//!
//! A provider process hosts pluggable *sequencer* backends, each addressed by a
//! [`SequencerId`]. An [`Admin`] creates, opens, closes and destroys them; a
//! [`Client`] binds [`SequencerHandle`]s to live sequencers and calls them
//! either synchronously or through an [`AsyncRequest`].
//!
//! ## Wiring a provider
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mobject::{BackendFactory, Provider, ProviderHost, ProviderOptions};
//!
//! let mut factory = BackendFactory::new();
//! dummy_sequencer::register(&mut factory);
//!
//! let host = Arc::new(ProviderHost::new("http://127.0.0.1:8087"));
//! let provider = Provider::new(ProviderOptions::default(), Arc::new(factory));
//! host.register_provider(Arc::new(provider))?;
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8087").await?;
//! mobject::transport::http::serve(host.clone(), listener, host.shutdown_token()).await?;
//! ```
//!
//! ## Calling it
//!
//! ```rust,ignore
//! let admin = mobject::Admin::default();
//! let id = admin.create_sequencer(addr, 0, "dummy", "{}", "").await?;
//!
//! let client = mobject::Client::default();
//! let handle = client.make_sequencer_handle(addr, 0, id, true).await?;
//! assert_eq!(handle.compute_sum(42, 51).await?, 93);
//!
//! let pending = handle.compute_sum_async(1, 2);
//! assert_eq!(pending.wait().await?, 3);
//! ```

pub mod admin;
pub mod async_request;
pub mod backend;
pub mod client;
pub mod error;
pub mod factory;
pub mod host;
pub mod id;
pub mod provider;
pub mod result;
pub mod rpc;
pub mod transport;

pub use admin::Admin;
pub use async_request::AsyncRequest;
pub use backend::Backend;
pub use client::{Client, SequencerHandle};
pub use error::{Error, Result};
pub use factory::{BackendArgs, BackendCtor, BackendFactory, FactoryError};
pub use host::{HostError, ProviderHost};
pub use id::SequencerId;
pub use provider::{Provider, ProviderOptions, TeardownPolicy};
pub use result::{ErrorKind, RemoteError, RequestResult};
pub use rpc::RpcRequest;
pub use transport::{Endpoint, Engine, LocalNetwork, Transport, TransportError};

// Re-exported for backend crates implementing `Backend`.
pub use async_trait::async_trait;
