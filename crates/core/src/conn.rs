//! Connection capabilities implemented once per transport.
//!
//! A live socket cannot be read and written through one `&mut` from two
//! tasks, so a [`Conn`] splits into a [`FrameReader`] (owned by the read loop)
//! and a [`FrameWriter`] (shared by the write pump and control replies). The
//! unsplit `Conn` implements both halves so an [`Acceptor`] or [`Dialer`] can
//! talk to the peer during the handshake.
//!
//! [`Acceptor`]: crate::listener::Acceptor

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::error::{Error, TransportError};
use crate::frame::{Frame, OpCode};

/// Inbound half of a connection.
pub trait FrameReader: Send + 'static {
    /// Reads one frame, honouring the current read deadline.
    fn read_frame(&mut self) -> impl Future<Output = Result<Frame, TransportError>> + Send;

    /// Sets (or clears) the deadline for subsequent reads.
    fn set_read_deadline(&mut self, deadline: Option<Instant>);
}

/// Outbound half of a connection.
pub trait FrameWriter: Send + 'static {
    /// Writes one frame. Data may stay buffered until [`flush`](Self::flush).
    fn write_frame(
        &mut self,
        opcode: OpCode,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn flush(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Shuts the outbound side of the socket down.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sets (or clears) the deadline for subsequent writes and flushes.
    fn set_write_deadline(&mut self, deadline: Option<Instant>);
}

/// A complete connection over one socket.
pub trait Conn: FrameReader + FrameWriter {
    type Reader: FrameReader;
    type Writer: FrameWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Server-side transport: turns an accepted socket into a [`Conn`].
pub trait Transport: Send + Sync + 'static {
    type Conn: Conn;

    /// Short protocol name used in logs (`tcp`, `ws`).
    fn name(&self) -> &'static str;

    fn upgrade(
        &self,
        stream: TcpStream,
    ) -> impl Future<Output = Result<Self::Conn, TransportError>> + Send;
}

/// Parameters handed to a [`Dialer`].
#[derive(Debug, Clone)]
pub struct DialerContext {
    pub id: String,
    pub name: String,
    pub address: String,
    pub timeout: Duration,
}

/// Client-side transport: connects and performs the client half of the
/// identity handshake.
pub trait Dialer: Send + Sync + 'static {
    type Conn: Conn;

    fn dial_and_handshake(
        &self,
        ctx: DialerContext,
    ) -> impl Future<Output = Result<Self::Conn, Error>> + Send;
}

/// A socket-style deadline for async frame operations.
///
/// Like a socket deadline it is absolute and sticky: it applies to every
/// operation until replaced. Expiry surfaces as [`TransportError::Timeout`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn set(&mut self, deadline: Option<Instant>) {
        self.0 = deadline;
    }

    pub fn get(&self) -> Option<Instant> {
        self.0
    }

    /// Runs `op`, failing with [`TransportError::Timeout`] once the deadline passes.
    pub async fn run<T, F>(self, op: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        match self.0 {
            Some(at) => tokio::time::timeout_at(at, op)
                .await
                .map_err(|_| TransportError::Timeout)?,
            None => op.await,
        }
    }
}

/// Writes a frame and flushes it under one write deadline.
pub async fn write_and_flush<W: FrameWriter>(
    writer: &mut W,
    opcode: OpCode,
    payload: &[u8],
    write_wait: Duration,
) -> Result<(), TransportError> {
    writer.set_write_deadline(Some(Instant::now() + write_wait));
    writer.write_frame(opcode, payload).await?;
    writer.flush().await
}
