//! Gateway client: dial, identity handshake, send/read and heartbeat.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::conn::{Conn, Dialer, DialerContext, FrameReader, FrameWriter, write_and_flush};
use crate::constants::{DEFAULT_HEARTBEAT, DEFAULT_LOGIN_WAIT, DEFAULT_READ_WAIT, DEFAULT_WRITE_WAIT};
use crate::error::Error;
use crate::frame::{Frame, OpCode};

type ReaderOf<D> = <<D as Dialer>::Conn as Conn>::Reader;
type WriterOf<D> = <<D as Dialer>::Conn as Conn>::Writer;

/// Connection lifecycle of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientState {
    Idle = 0,
    Connecting = 1,
    Connected = 2,
}

impl ClientState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ClientState::Connecting,
            2 => ClientState::Connected,
            _ => ClientState::Idle,
        }
    }
}

/// Client timing options. Zero read/write/login waits fall back to the
/// defaults; a zero heartbeat disables keep-alive pings.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub heartbeat: Duration,
    pub read_wait: Duration,
    pub write_wait: Duration,
    pub login_wait: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            heartbeat: DEFAULT_HEARTBEAT,
            read_wait: DEFAULT_READ_WAIT,
            write_wait: DEFAULT_WRITE_WAIT,
            login_wait: DEFAULT_LOGIN_WAIT,
        }
    }
}

impl ClientOptions {
    fn normalized(mut self) -> Self {
        if self.read_wait.is_zero() {
            self.read_wait = DEFAULT_READ_WAIT;
        }
        if self.write_wait.is_zero() {
            self.write_wait = DEFAULT_WRITE_WAIT;
        }
        if self.login_wait.is_zero() {
            self.login_wait = DEFAULT_LOGIN_WAIT;
        }
        self
    }
}

/// A connection to a gateway through a [`Dialer`].
///
/// The client may be reconnected after [`close`](Self::close).
pub struct Client<D: Dialer> {
    id: String,
    name: String,
    dialer: D,
    options: ClientOptions,
    state: AtomicU8,
    reader: Mutex<Option<ReaderOf<D>>>,
    writer: Arc<Mutex<Option<WriterOf<D>>>>,
    session: std::sync::Mutex<Option<CancellationToken>>,
    /// Set by a `close` that arrived while a dial was in flight.
    close_requested: AtomicBool,
}

impl<D: Dialer> Client<D> {
    pub fn new(id: impl Into<String>, name: impl Into<String>, dialer: D, options: ClientOptions) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            dialer,
            options: options.normalized(),
            state: AtomicU8::new(ClientState::Idle as u8),
            reader: Mutex::new(None),
            writer: Arc::new(Mutex::new(None)),
            session: std::sync::Mutex::new(None),
            close_requested: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Dials `address` and performs the identity handshake.
    ///
    /// Fails with [`Error::AlreadyConnected`] unless the client is idle, and
    /// with [`Error::NotConnected`] if [`close`](Self::close) was called
    /// before the dial finished.
    pub async fn connect(&self, address: &str) -> Result<(), Error> {
        self.state
            .compare_exchange(
                ClientState::Idle as u8,
                ClientState::Connecting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| Error::AlreadyConnected)?;
        self.close_requested.store(false, Ordering::Release);

        let login_wait = self.options.login_wait;
        let ctx = DialerContext {
            id: self.id.clone(),
            name: self.name.clone(),
            address: address.to_string(),
            timeout: login_wait,
        };
        let dialed = tokio::time::timeout(login_wait, self.dialer.dial_and_handshake(ctx))
            .await
            .unwrap_or_else(|_| Err(Error::HandshakeFailed(format!("dial {address} timed out"))));
        let conn = match dialed {
            Ok(conn) => conn,
            Err(e) => {
                self.state.store(ClientState::Idle as u8, Ordering::Release);
                return Err(e);
            }
        };

        let (reader, writer) = conn.split();
        *self.reader.lock().await = Some(reader);
        *self.writer.lock().await = Some(writer);

        let session = CancellationToken::new();
        let aborted = {
            let mut slot = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            let aborted = self.close_requested.swap(false, Ordering::AcqRel);
            if !aborted {
                *slot = Some(session.clone());
                self.state
                    .store(ClientState::Connected as u8, Ordering::Release);
            }
            aborted
        };
        if aborted {
            debug!(id = %self.id, %address, "closed while connecting");
            self.teardown().await;
            self.state.store(ClientState::Idle as u8, Ordering::Release);
            return Err(Error::NotConnected);
        }
        info!(id = %self.id, %address, "connected");

        if !self.options.heartbeat.is_zero() {
            tokio::spawn(heartbeat(
                self.id.clone(),
                self.writer.clone(),
                session,
                self.options.heartbeat,
                self.options.write_wait,
            ));
        }
        Ok(())
    }

    /// Writes `payload` as one Binary frame and flushes it.
    pub async fn send(&self, payload: &[u8]) -> Result<(), Error> {
        if self.state() != ClientState::Connected {
            return Err(Error::NotConnected);
        }
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(Error::NotConnected)?;
        write_and_flush(writer, OpCode::Binary, payload, self.options.write_wait).await?;
        Ok(())
    }

    /// Reads the next frame. Control frames other than Close are returned
    /// as-is; a Close frame yields [`Error::RemoteClosed`].
    pub async fn read(&self) -> Result<Frame, Error> {
        if self.state() != ClientState::Connected {
            return Err(Error::NotConnected);
        }
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let session = session.ok_or(Error::NotConnected)?;

        let mut reader = self.reader.lock().await;
        let reader = reader.as_mut().ok_or(Error::NotConnected)?;
        if self.options.heartbeat.is_zero() {
            reader.set_read_deadline(None);
        } else {
            reader.set_read_deadline(Some(Instant::now() + self.options.read_wait));
        }

        let frame = tokio::select! {
            _ = session.cancelled() => return Err(Error::NotConnected),
            frame = reader.read_frame() => frame?,
        };
        if frame.opcode == OpCode::Close {
            return Err(Error::RemoteClosed);
        }
        Ok(frame)
    }

    /// Stops the heartbeat, sends a Close frame and drops the connection.
    /// Calling it on an idle client does nothing; during a dial it makes the
    /// pending [`connect`](Self::connect) fail.
    pub async fn close(&self) {
        let session = {
            let mut slot = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            let session = slot.take();
            if session.is_none() && self.state() == ClientState::Connecting {
                self.close_requested.store(true, Ordering::Release);
            }
            session
        };
        let Some(session) = session else {
            return;
        };
        session.cancel();
        self.teardown().await;

        self.state.store(ClientState::Idle as u8, Ordering::Release);
        info!(id = %self.id, "connection closed");
    }

    /// Sends a best-effort Close frame and drops both halves.
    async fn teardown(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = write_and_flush(&mut writer, OpCode::Close, &[], self.options.write_wait).await {
                debug!(id = %self.id, error = %e, "failed to send close frame");
            }
            if let Err(e) = writer.close().await {
                debug!(id = %self.id, error = %e, "failed to close connection");
            }
        }
        self.reader.lock().await.take();
    }
}

impl<D: Dialer> Drop for Client<D> {
    fn drop(&mut self) {
        if let Some(session) = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            session.cancel();
        }
    }
}

/// Sends a Ping every `period` until the session ends or a write fails.
async fn heartbeat<W: FrameWriter>(
    id: String,
    writer: Arc<Mutex<Option<W>>>,
    session: CancellationToken,
    period: Duration,
    write_wait: Duration,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = session.cancelled() => break,
            _ = interval.tick() => {
                let mut guard = writer.lock().await;
                let Some(writer) = guard.as_mut() else { break };
                if let Err(e) = write_and_flush(writer, OpCode::Ping, &[], write_wait).await {
                    error!(%id, error = %e, "heartbeat failed");
                    break;
                }
                trace!(%id, "ping sent");
            }
        }
    }
    debug!(%id, "heartbeat stopped");
}
