use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;

use portico_core::{
    Agent, BoxFuture, Client, ClientOptions, Error, LoginAcceptor, MessageListener, OpCode,
    ServerConfig, StateListener,
};
use portico_naming::DefaultService;
use portico_tcp::{TcpDialer, TcpServer, new_client, new_server, wire};

struct Echo;

impl MessageListener for Echo {
    fn receive(&self, agent: Arc<dyn Agent>, mut payload: Vec<u8>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            payload.extend_from_slice(b" from server ");
            let _ = agent.push(payload).await;
        })
    }
}

struct Disconnects(mpsc::UnboundedSender<String>);

impl StateListener for Disconnects {
    fn disconnect<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let _ = self.0.send(id.to_string());
            Ok(())
        })
    }
}

async fn start(login: bool) -> (Arc<TcpServer>, SocketAddr, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let config = ServerConfig {
        listen: "127.0.0.1:0".into(),
        ..Default::default()
    };
    let service = DefaultService::new("gw01", "gateway", "tcp", "127.0.0.1", 0);
    let mut server = new_server(service, config)
        .with_message_listener(Echo)
        .with_state_listener(Disconnects(tx));
    if login {
        server = server.with_acceptor(LoginAcceptor);
    }
    let server = Arc::new(server);

    let runner = server.clone();
    tokio::spawn(async move { runner.start().await });

    let addr = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(addr) = server.local_addr().await {
                break addr;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("server bound");
    (server, addr, rx)
}

async fn wait_for(server: &TcpServer, id: &str) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while server.channels().get(id).is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("channel registered");
}

#[tokio::test]
async fn echo_five_hellos() {
    let (server, addr, _rx) = start(false).await;
    let client = Client::new("c1", "tester", TcpDialer::without_login(), ClientOptions::default());
    client.connect(&addr.to_string()).await.unwrap();

    for _ in 0..5 {
        client.send(b"hello").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut replies = 0;
    while replies < 5 {
        let frame = tokio::time::timeout(Duration::from_secs(2), client.read())
            .await
            .expect("reply in time")
            .unwrap();
        if frame.opcode != OpCode::Binary {
            continue;
        }
        assert_eq!(frame.payload, b"hello from server ");
        replies += 1;
    }

    client.close().await;
    server.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn login_identity_and_server_push() {
    let (server, addr, mut disconnects) = start(true).await;
    let client = new_client("u1", "tester", ClientOptions::default());
    client.connect(&format!("tcp://{addr}")).await.unwrap();
    wait_for(&server, "u1").await;

    server.push("u1", b"notice".to_vec()).await.unwrap();
    let frame = client.read().await.unwrap();
    assert_eq!(frame.opcode, OpCode::Binary);
    assert_eq!(frame.payload, b"notice");

    client.close().await;
    let gone = tokio::time::timeout(Duration::from_secs(2), disconnects.recv())
        .await
        .expect("disconnect reported");
    assert_eq!(gone.as_deref(), Some("u1"));
    assert!(server.channels().get("u1").is_none());

    server.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn duplicate_identity_gets_close_frame() {
    let (server, addr, _rx) = start(true).await;
    let first = new_client("u1", "first", ClientOptions::default());
    first.connect(&addr.to_string()).await.unwrap();
    wait_for(&server, "u1").await;

    let second = new_client("u1", "second", ClientOptions::default());
    second.connect(&addr.to_string()).await.unwrap();
    let err = tokio::time::timeout(Duration::from_secs(2), second.read())
        .await
        .expect("rejected in time")
        .unwrap_err();
    assert!(matches!(err, Error::RemoteClosed));
    assert_eq!(server.channels().len(), 1);

    // The first session is untouched.
    first.send(b"still here").await.unwrap();
    let frame = first.read().await.unwrap();
    assert_eq!(frame.payload, b"still here from server ");

    server.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn push_to_unknown_id() {
    let (server, _addr, _rx) = start(true).await;
    let err = server.push("ghost", b"x".to_vec()).await.unwrap_err();
    assert!(matches!(err, Error::ChannelNotFound(_)));
    assert_eq!(err.to_string(), "channel ghost not found");
    server.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn raw_ping_gets_empty_pong() {
    let (server, addr, _rx) = start(true).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    wire::write_frame(&mut stream, OpCode::Binary, b"raw").await.unwrap();
    wait_for(&server, "raw").await;

    wire::write_frame(&mut stream, OpCode::Ping, b"?").await.unwrap();
    let pong = wire::read_frame(&mut stream).await.unwrap();
    assert_eq!(pong.opcode, OpCode::Pong);
    assert!(pong.payload.is_empty());

    server.shutdown(Duration::from_secs(2)).await;
    let closed = wire::read_frame(&mut stream).await;
    assert!(closed.is_err());
}

#[tokio::test]
async fn heartbeat_keeps_session_alive() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let config = ServerConfig {
        listen: "127.0.0.1:0".into(),
        read_wait: Duration::from_millis(300),
        ..Default::default()
    };
    let service = DefaultService::new("gw02", "gateway", "tcp", "127.0.0.1", 0);
    let server = Arc::new(
        new_server(service, config)
            .with_acceptor(LoginAcceptor)
            .with_message_listener(Echo)
            .with_state_listener(Disconnects(tx)),
    );
    let runner = server.clone();
    tokio::spawn(async move { runner.start().await });
    let addr = loop {
        if let Some(addr) = server.local_addr().await {
            break addr;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    let options = ClientOptions {
        heartbeat: Duration::from_millis(100),
        ..Default::default()
    };
    let client = new_client("hb", "tester", options);
    client.connect(&addr.to_string()).await.unwrap();
    wait_for(&server, "hb").await;

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(server.channels().get("hb").is_some());

    client.close().await;
    server.shutdown(Duration::from_secs(2)).await;
}
