//! `mock_srv`: echo gateway over TCP or WebSocket.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use portico_core::{LoginAcceptor, Server, ServerConfig, Transport};
use portico_naming::DefaultService;

use crate::cli::{Protocol, ServerArgs};
use crate::config::MockConfig;
use crate::handlers::{DisconnectLogger, EchoHandler};

/// Registration record advertised by the demo gateway.
pub fn service(config: &MockConfig, protocol: Protocol, address: &str) -> DefaultService {
    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().unwrap_or(0)),
        None => (address, 0),
    };
    DefaultService::new(
        config.service_id.clone(),
        config.service_name.clone(),
        protocol.to_string(),
        host,
        port,
    )
}

/// Attaches the demo collaborators to a server.
pub fn build<T: Transport>(
    service: DefaultService,
    transport: T,
    config: ServerConfig,
) -> Arc<Server<T>> {
    Arc::new(
        Server::new(service, transport, config)
            .with_acceptor(LoginAcceptor)
            .with_message_listener(EchoHandler)
            .with_state_listener(DisconnectLogger),
    )
}

/// Runs `server` until it fails or `stop` resolves, then shuts it down.
pub async fn serve<T, F>(server: Arc<Server<T>>, stop: F, grace: Duration) -> anyhow::Result<()>
where
    T: Transport,
    F: Future<Output = ()>,
{
    let runner = server.clone();
    let mut accept_loop = tokio::spawn(async move { runner.start().await });

    tokio::select! {
        result = &mut accept_loop => {
            result.context("accept loop panicked")??;
            return Ok(());
        }
        _ = stop => {}
    }

    server.shutdown(grace).await;
    accept_loop.await.context("accept loop panicked")??;
    Ok(())
}

pub async fn run(args: ServerArgs) -> anyhow::Result<()> {
    let config = MockConfig::load(args.config.as_deref())?;
    let service = service(&config, args.protocol, &args.address);
    let server_config = config.server_config(&args.address);
    let grace = config.shutdown_timeout();
    info!(%service, protocol = %args.protocol, "starting mock server");

    let stop = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
        info!("ctrl-c received");
    };

    match args.protocol {
        Protocol::Tcp => {
            let server = build(service, portico_tcp::TcpTransport, server_config);
            serve(server, stop, grace).await
        }
        Protocol::Ws => {
            let server = build(service, portico_websocket::WsTransport, server_config);
            serve(server, stop, grace).await
        }
    }
}
