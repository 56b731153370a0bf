use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use portico_core::{ClientOptions, Server, Transport};
use portico_mock::cli::Protocol;
use portico_mock::client::exchange;
use portico_mock::config::MockConfig;
use portico_mock::server::{build, serve, service};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

async fn start<T: Transport>(
    transport: T,
    protocol: Protocol,
) -> (SocketAddr, oneshot::Sender<()>, JoinHandle<anyhow::Result<()>>) {
    let config = MockConfig::default();
    let server: Arc<Server<T>> = build(
        service(&config, protocol, "127.0.0.1:0"),
        transport,
        config.server_config("127.0.0.1:0"),
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(serve(
        server.clone(),
        async move {
            let _ = stop_rx.await;
        },
        Duration::from_secs(2),
    ));

    for _ in 0..200 {
        if let Some(addr) = server.local_addr().await {
            return (addr, stop_tx, handle);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("server never bound");
}

fn expected(count: usize) -> Vec<String> {
    vec!["hello from server ".to_string(); count]
}

#[tokio::test]
async fn tcp_five_hellos() {
    let (addr, stop, handle) = start(portico_tcp::TcpTransport, Protocol::Tcp).await;

    let client = portico_tcp::new_client("user1", "mock_cli", ClientOptions::default());
    let replies = exchange(&client, &addr.to_string(), 5).await.unwrap();
    assert_eq!(replies, expected(5));

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn ws_five_hellos() {
    let (addr, stop, handle) = start(portico_websocket::WsTransport, Protocol::Ws).await;

    let client = portico_websocket::new_client("user1", "mock_cli", ClientOptions::default());
    let replies = exchange(&client, &format!("ws://{addr}"), 5).await.unwrap();
    assert_eq!(replies, expected(5));

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn client_reconnects_after_exchange() {
    let (addr, stop, handle) = start(portico_tcp::TcpTransport, Protocol::Tcp).await;

    let client = portico_tcp::new_client("user2", "mock_cli", ClientOptions::default());
    assert_eq!(exchange(&client, &addr.to_string(), 2).await.unwrap().len(), 2);
    // The server may still be tearing down the first session.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(exchange(&client, &addr.to_string(), 3).await.unwrap().len(), 3);

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn dial_refused_is_an_error() {
    let client = portico_tcp::new_client(
        "user3",
        "mock_cli",
        ClientOptions {
            login_wait: Duration::from_secs(1),
            ..ClientOptions::default()
        },
    );
    assert!(exchange(&client, "127.0.0.1:1", 1).await.is_err());
}
