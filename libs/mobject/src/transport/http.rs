//! JSON over HTTP: an axum router on the server side, reqwest on the client side.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{Transport, TransportError};
use crate::host::ProviderHost;
use crate::rpc::RpcRequest;

pub const RPC_PATH: &str = "/mobject/v1/providers/{provider_id}/rpc";
pub const SHUTDOWN_PATH: &str = "/mobject/v1/shutdown";

/// `error` field of the 404 body sent for an unregistered provider id.
const NO_SUCH_PROVIDER: &str = "no_such_provider";

pub fn router(host: Arc<ProviderHost>) -> Router {
    Router::new()
        .route(RPC_PATH, post(rpc))
        .route(SHUTDOWN_PATH, post(shutdown))
        .with_state(host)
}

async fn rpc(
    State(host): State<Arc<ProviderHost>>,
    Path(provider_id): Path<u16>,
    Json(req): Json<RpcRequest>,
) -> Response {
    // Detached from the connection: a client hanging up must not stop a
    // destroy between unregistering the sequencer and calling `destroy()`.
    let dispatched = tokio::spawn(async move { host.dispatch(provider_id, req).await }).await;
    match dispatched {
        Ok(Ok(reply)) => Json(reply).into_response(),
        Ok(Err(TransportError::NoSuchProvider(id))) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": NO_SUCH_PROVIDER, "provider_id": id })),
        )
            .into_response(),
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        Err(e) => {
            tracing::error!(provider_id, error = %e, "RPC task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn shutdown(State(host): State<Arc<ProviderHost>>) -> StatusCode {
    host.request_shutdown();
    StatusCode::ACCEPTED
}

/// Serve `host` on `listener` until `cancel` fires.
pub async fn serve(
    host: Arc<ProviderHost>,
    listener: tokio::net::TcpListener,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, address = %host.address(), "RPC server listening");
    }

    let shutdown = async move {
        cancel.cancelled().await;
        tracing::info!("RPC server shutting down gracefully (cancellation)");
    };

    axum::serve(listener, router(host))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Client side of the HTTP transport.
pub struct HttpTransport {
    client: reqwest::Client,
    base: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, address: &str) -> Self {
        Self {
            client,
            base: address.trim_end_matches('/').to_string(),
        }
    }

    fn http_err(&self, source: reqwest::Error) -> TransportError {
        TransportError::Http {
            address: self.base.clone(),
            source,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn forward(&self, provider_id: u16, req: RpcRequest) -> Result<Value, TransportError> {
        let url = format!("{}/mobject/v1/providers/{provider_id}/rpc", self.base);
        let resp = self
            .client
            .post(url)
            .json(&req)
            .send()
            .await
            .map_err(|e| self.http_err(e))?;

        let status = resp.status();
        if status.is_success() {
            return resp.json::<Value>().await.map_err(|e| self.http_err(e));
        }
        if status == StatusCode::NOT_FOUND {
            let body = resp.json::<Value>().await.unwrap_or(Value::Null);
            if body["error"] == NO_SUCH_PROVIDER {
                return Err(TransportError::NoSuchProvider(provider_id));
            }
            // Otherwise a foreign server or a wrong route prefix.
        }
        Err(TransportError::Status {
            address: self.base.clone(),
            status: status.as_u16(),
        })
    }

    async fn shutdown_remote(&self) -> Result<(), TransportError> {
        let url = format!("{}{SHUTDOWN_PATH}", self.base);
        let resp = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| self.http_err(e))?;
        if !resp.status().is_success() {
            return Err(TransportError::Status {
                address: self.base.clone(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}
