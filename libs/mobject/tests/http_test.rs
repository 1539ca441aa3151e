mod common;

use std::sync::Arc;
use std::time::Duration;

use mobject::transport::http;
use mobject::{Admin, Client, Error, ProviderHost, SequencerId, TransportError};
use serde_json::json;

struct Server {
    address: String,
    host: Arc<ProviderHost>,
    counters: Arc<common::Counters>,
    task: tokio::task::JoinHandle<std::io::Result<()>>,
}

/// Serve a fresh host on an ephemeral port.
async fn spawn_server() -> Server {
    let counters = Arc::new(common::Counters::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());

    let host = Arc::new(ProviderHost::new(address.clone()));
    let provider = mobject::Provider::new(
        mobject::ProviderOptions {
            provider_id: 3,
            token: "tok".into(),
            ..Default::default()
        },
        Arc::new(common::factory(&counters)),
    );
    host.register_provider(Arc::new(provider)).unwrap();

    let task = tokio::spawn(http::serve(host.clone(), listener, host.shutdown_token()));
    Server {
        address,
        host,
        counters,
        task,
    }
}

#[tokio::test]
async fn round_trip_over_http() {
    let Server { address, .. } = spawn_server().await;
    let admin = Admin::default();
    let client = Client::default();

    let id = admin
        .create_sequencer(&address, 3, "recording", "{}", "tok")
        .await
        .unwrap();
    let handle = client
        .make_sequencer_handle(&address, 3, id, true)
        .await
        .unwrap();

    assert_eq!(handle.compute_sum(42, 51).await.unwrap(), 93);
    assert_eq!(handle.compute_sum_async(42, 51).wait().await.unwrap(), 93);
    handle.say_hello().await.unwrap();

    let err = admin
        .close_sequencer(&address, 3, id, "bad")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid security token");

    assert!(admin.destroy_sequencer(&address, 3, id, "tok").await.unwrap());
    let err = client
        .make_sequencer_handle(&address, 3, id, true)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn unknown_provider_is_a_transport_error() {
    let Server { address, .. } = spawn_server().await;
    let client = Client::default();

    let err = client
        .make_sequencer_handle(&address, 4, SequencerId::generate(), true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::NoSuchProvider(4))
    ));
}

#[tokio::test]
async fn remote_shutdown_stops_the_server() {
    let Server {
        address,
        host,
        task,
        ..
    } = spawn_server().await;

    Admin::default().shutdown_server(&address).await.unwrap();
    assert!(host.shutdown_token().is_cancelled());

    let served = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("server stops after shutdown")
        .unwrap();
    assert!(served.is_ok());
}

#[tokio::test]
async fn destroy_finishes_after_the_caller_hangs_up() {
    let server = spawn_server().await;
    let id = Admin::default()
        .create_sequencer(&server.address, 3, "slow_destroy", "{}", "tok")
        .await
        .unwrap();

    // Give up long before the backend's destroy returns.
    let sent = reqwest::Client::new()
        .post(format!("{}/mobject/v1/providers/3/rpc", server.address))
        .json(&json!({ "op": "destroy_sequencer", "token": "tok", "sequencer_id": id }))
        .timeout(Duration::from_millis(50))
        .send()
        .await;
    assert!(sent.is_err());

    tokio::time::sleep(common::SLOW_DESTROY_DELAY + Duration::from_millis(500)).await;
    assert_eq!(server.counters.destroyed(), 1);

    let err = Client::default()
        .make_sequencer_handle(&server.address, 3, id, true)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn foreign_not_found_is_a_status_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let foreign = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move { axum::serve(listener, axum::Router::new()).await });

    let server = spawn_server().await;
    let wrong_prefix = format!("{}/elsewhere", server.address);

    for address in [foreign, wrong_prefix] {
        let err = Client::default()
            .make_sequencer_handle(&address, 3, SequencerId::generate(), true)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Transport(TransportError::Status { status: 404, .. })),
            "{address}: {err:?}"
        );
    }
}
