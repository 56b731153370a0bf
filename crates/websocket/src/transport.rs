//! Server transport (HTTP upgrade) and client dialer for WebSocket.

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, accept_async_with_config, connect_async_with_config};
use tracing::debug;

use portico_core::constants::MAX_FRAME_SIZE;
use portico_core::conn::write_and_flush;
use portico_core::{Dialer, DialerContext, Error, OpCode, Transport, TransportError};

use crate::conn::{WsConn, map_error};

/// Server-side connection type.
pub type ServerConn = WsConn<TcpStream>;

/// Client-side connection type.
pub type ClientConn = WsConn<MaybeTlsStream<TcpStream>>;

/// WebSocket limits matching the gateway's frame size cap.
fn ws_config() -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_FRAME_SIZE);
    config.max_frame_size = Some(MAX_FRAME_SIZE);
    config
}

/// Performs the HTTP upgrade on accepted sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl Transport for WsTransport {
    type Conn = ServerConn;

    fn name(&self) -> &'static str {
        "ws"
    }

    async fn upgrade(&self, stream: TcpStream) -> Result<ServerConn, TransportError> {
        stream.set_nodelay(true)?;
        let ws = accept_async_with_config(stream, Some(ws_config()))
            .await
            .map_err(map_error)?;
        Ok(WsConn::new(ws))
    }
}

/// Connects over WebSocket and, by default, sends the client id as a
/// Binary login frame.
#[derive(Debug, Clone, Copy)]
pub struct WsDialer {
    login: bool,
}

impl WsDialer {
    pub fn new() -> Self {
        Self { login: true }
    }

    /// A dialer that sends nothing after the upgrade.
    pub fn without_login() -> Self {
        Self { login: false }
    }
}

impl Default for WsDialer {
    fn default() -> Self {
        Self::new()
    }
}

/// Adds the `ws://` scheme to bare `host:port` addresses.
pub fn dial_url(address: &str) -> String {
    if address.starts_with("ws://") || address.starts_with("wss://") {
        address.to_string()
    } else {
        format!("ws://{address}")
    }
}

impl Dialer for WsDialer {
    type Conn = ClientConn;

    async fn dial_and_handshake(&self, ctx: DialerContext) -> Result<ClientConn, Error> {
        let url = dial_url(&ctx.address);
        let (ws, _) = tokio::time::timeout(
            ctx.timeout,
            connect_async_with_config(url.as_str(), Some(ws_config()), true),
        )
        .await
        .map_err(|_| Error::HandshakeFailed(format!("dial {url} timed out")))?
        .map_err(map_error)?;

        let mut conn = WsConn::new(ws);
        if self.login {
            write_and_flush(&mut conn, OpCode::Binary, ctx.id.as_bytes(), ctx.timeout).await?;
            debug!(id = %ctx.id, %url, "login frame sent");
        }
        Ok(conn)
    }
}
