//! Server transport and client dialer for raw TCP.

use tokio::net::TcpStream;
use tracing::debug;

use portico_core::conn::write_and_flush;
use portico_core::{Dialer, DialerContext, Error, OpCode, Transport, TransportError};

use crate::conn::TcpConn;

/// Wraps accepted sockets in a [`TcpConn`]; no upgrade exchange is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    type Conn = TcpConn;

    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn upgrade(&self, stream: TcpStream) -> Result<TcpConn, TransportError> {
        stream.set_nodelay(true)?;
        Ok(TcpConn::new(stream))
    }
}

/// Connects over TCP and, by default, sends the client id as a Binary
/// login frame.
#[derive(Debug, Clone, Copy)]
pub struct TcpDialer {
    login: bool,
}

impl TcpDialer {
    pub fn new() -> Self {
        Self { login: true }
    }

    /// A dialer that sends nothing after connecting, for servers that
    /// assign identities themselves.
    pub fn without_login() -> Self {
        Self { login: false }
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialer for TcpDialer {
    type Conn = TcpConn;

    async fn dial_and_handshake(&self, ctx: DialerContext) -> Result<TcpConn, Error> {
        let address = ctx.address.strip_prefix("tcp://").unwrap_or(&ctx.address);
        let stream = tokio::time::timeout(ctx.timeout, TcpStream::connect(address))
            .await
            .map_err(|_| Error::HandshakeFailed(format!("dial {address} timed out")))??;
        stream.set_nodelay(true)?;

        let mut conn = TcpConn::new(stream);
        if self.login {
            write_and_flush(&mut conn, OpCode::Binary, ctx.id.as_bytes(), ctx.timeout).await?;
            debug!(id = %ctx.id, %address, "login frame sent");
        }
        Ok(conn)
    }
}
