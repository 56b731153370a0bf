//! Built-in acceptors.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::conn::Conn;
use crate::error::Error;
use crate::frame::OpCode;
use crate::listener::{Acceptor, BoxFuture};

/// Assigns a random identity to every connection without reading anything.
///
/// No authentication happens; use [`LoginAcceptor`] or a custom [`Acceptor`]
/// when peers must identify themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAcceptor;

impl<C: Conn> Acceptor<C> for DefaultAcceptor {
    fn accept<'a>(
        &'a self,
        _conn: &'a mut C,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<String, Error>> {
        Box::pin(async { Ok(uuid::Uuid::new_v4().to_string()) })
    }
}

/// Reads a login frame and uses its payload as the channel identity.
///
/// The peer must send a Binary or Text frame whose payload is a non-empty
/// UTF-8 string within the login timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoginAcceptor;

impl<C: Conn> Acceptor<C> for LoginAcceptor {
    fn accept<'a>(
        &'a self,
        conn: &'a mut C,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, Error>> {
        Box::pin(async move {
            conn.set_read_deadline(Some(Instant::now() + timeout));
            let frame = conn.read_frame().await;
            conn.set_read_deadline(None);

            let frame = frame.map_err(|e| Error::HandshakeFailed(format!("read login: {e}")))?;
            debug!(opcode = %frame.opcode, "login frame received");

            match frame.opcode {
                OpCode::Binary | OpCode::Text => {}
                other => {
                    return Err(Error::HandshakeFailed(format!(
                        "unexpected {other} frame during login"
                    )));
                }
            }

            let id = String::from_utf8(frame.payload)
                .map_err(|_| Error::HandshakeFailed("user id is not valid UTF-8".into()))?;
            if id.trim().is_empty() {
                return Err(Error::HandshakeFailed("user id is invalid".into()));
            }
            Ok(id)
        })
    }
}
