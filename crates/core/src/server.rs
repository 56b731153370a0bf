//! Gateway server: accept loop, handshake, registration and teardown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use portico_naming::ServiceRegistration;

use crate::acceptor::DefaultAcceptor;
use crate::channel::Channel;
use crate::channel_map::{ChannelMap, Channels};
use crate::conn::{Conn, Transport, write_and_flush};
use crate::constants::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_LOGIN_WAIT, DEFAULT_READ_WAIT, DEFAULT_WRITE_WAIT};
use crate::error::Error;
use crate::event::Event;
use crate::frame::OpCode;
use crate::listener::{Acceptor, MessageListener, StateListener};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, e.g. `0.0.0.0:8000` (port 0 = OS-assigned).
    pub listen: String,
    /// Time allowed for the identity handshake.
    pub login_wait: Duration,
    pub read_wait: Duration,
    pub write_wait: Duration,
    /// Capacity hint for the default channel registry.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".into(),
            login_wait: DEFAULT_LOGIN_WAIT,
            read_wait: DEFAULT_READ_WAIT,
            write_wait: DEFAULT_WRITE_WAIT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// A gateway server over one [`Transport`].
///
/// Collaborators are attached with the `with_*` builders before the server
/// is wrapped in an `Arc` and [`start`](Self::start)ed.
pub struct Server<T: Transport> {
    service: Arc<dyn ServiceRegistration>,
    transport: T,
    config: ServerConfig,
    acceptor: Arc<dyn Acceptor<T::Conn>>,
    message_listener: Option<Arc<dyn MessageListener>>,
    state_listener: Option<Arc<dyn StateListener>>,
    channels: Arc<dyn ChannelMap<T::Conn>>,
    quit: Event,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl<T: Transport> Server<T> {
    pub fn new(service: impl ServiceRegistration + 'static, transport: T, config: ServerConfig) -> Self {
        let channels: Arc<dyn ChannelMap<T::Conn>> =
            Arc::new(Channels::<T::Conn>::with_capacity(config.channel_capacity));
        Self {
            service: Arc::new(service),
            transport,
            config,
            acceptor: Arc::new(DefaultAcceptor),
            message_listener: None,
            state_listener: None,
            channels,
            quit: Event::new(),
            local_addr: Mutex::new(None),
        }
    }

    pub fn with_acceptor(mut self, acceptor: impl Acceptor<T::Conn>) -> Self {
        self.acceptor = Arc::new(acceptor);
        self
    }

    pub fn with_message_listener(mut self, listener: impl MessageListener) -> Self {
        self.message_listener = Some(Arc::new(listener));
        self
    }

    pub fn with_state_listener(mut self, listener: impl StateListener) -> Self {
        self.state_listener = Some(Arc::new(listener));
        self
    }

    pub fn with_channel_map(mut self, channels: impl ChannelMap<T::Conn>) -> Self {
        self.channels = Arc::new(channels);
        self
    }

    /// Overrides the read wait; zero keeps the current value.
    pub fn with_read_wait(mut self, wait: Duration) -> Self {
        if !wait.is_zero() {
            self.config.read_wait = wait;
        }
        self
    }

    pub fn service(&self) -> &dyn ServiceRegistration {
        self.service.as_ref()
    }

    pub fn channels(&self) -> &dyn ChannelMap<T::Conn> {
        self.channels.as_ref()
    }

    /// Returns the bound address. Only available once [`start`](Self::start)
    /// has bound the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Binds the listener and accepts connections until [`shutdown`](Self::shutdown).
    pub async fn start(self: &Arc<Self>) -> Result<(), Error> {
        if self.message_listener.is_none() {
            return Err(Error::Config("message listener is required".into()));
        }
        if self.state_listener.is_none() {
            return Err(Error::Config("state listener is required".into()));
        }

        let listener = TcpListener::bind(&self.config.listen).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        info!(
            service = %self.service.service_id(),
            transport = self.transport.name(),
            listen = %local_addr,
            "server listening"
        );

        loop {
            tokio::select! {
                _ = self.quit.wait() => {
                    info!(service = %self.service.service_id(), "server stopped accepting");
                    return Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(async move {
                                server.handle_connection(stream, peer).await;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "accept error");
                            tokio::time::sleep(Duration::from_millis(50)).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let conn = match self.transport.upgrade(stream).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(%peer, transport = self.transport.name(), error = %e, "upgrade failed");
                return;
            }
        };
        debug!(%peer, transport = self.transport.name(), "connection accepted");
        self.serve(conn, &peer.to_string()).await;
    }

    /// Runs one upgraded connection from handshake to teardown.
    pub(crate) async fn serve(self: &Arc<Self>, mut conn: T::Conn, peer: &str) {
        let Some(listener) = self.message_listener.clone() else {
            return;
        };
        let login_wait = self.config.login_wait;
        let write_wait = self.config.write_wait;

        let accepted = tokio::time::timeout(login_wait, self.acceptor.accept(&mut conn, login_wait))
            .await
            .unwrap_or_else(|_| Err(Error::HandshakeFailed("login timed out".into())));
        let id = match accepted {
            Ok(id) => id,
            Err(e) => {
                warn!(%peer, error = %e, "handshake rejected");
                reject(conn, &e.to_string(), write_wait).await;
                return;
            }
        };

        if self.quit.has_fired() {
            warn!(%peer, %id, "rejected during shutdown");
            reject(conn, SHUTTING_DOWN, write_wait).await;
            return;
        }

        if self.channels.get(&id).is_some() {
            let e = Error::DuplicateIdentity(id);
            warn!(%peer, error = %e, "duplicate identity");
            reject(conn, &e.to_string(), write_wait).await;
            return;
        }

        let channel = Channel::new(id.clone(), conn);
        channel.set_read_wait(self.config.read_wait);
        channel.set_write_wait(write_wait);

        if !self.channels.try_add(channel.clone()) {
            let e = Error::DuplicateIdentity(id);
            warn!(%peer, error = %e, "duplicate identity");
            channel.close();
            if let Err(e) = channel.write_control(OpCode::Close, e.to_string().as_bytes()).await {
                debug!(%peer, error = %e, "failed to send close frame");
            }
            channel.close_transport().await;
            return;
        }
        info!(%id, %peer, "channel registered");

        // Shutdown may have taken its snapshot before this registration.
        if self.quit.has_fired() {
            debug!(%id, "closing channel registered during shutdown");
            channel.close();
        }

        match channel.readloop(listener).await {
            Err(Error::RemoteClosed | Error::ChannelClosed(_)) | Ok(()) => {}
            Err(e) => debug!(%id, error = %e, "read loop ended"),
        }

        self.channels.remove(&id);
        if let Some(state) = &self.state_listener {
            if let Err(e) = state.disconnect(&id).await {
                warn!(%id, error = %e, "disconnect listener failed");
            }
        }
        channel.close();
        channel.close_transport().await;
        info!(%id, "channel disconnected");
    }

    /// Queues `payload` for the channel registered under `id`.
    pub async fn push(&self, id: &str, payload: Vec<u8>) -> Result<(), Error> {
        let channel = self
            .channels
            .get(id)
            .ok_or_else(|| Error::ChannelNotFound(id.to_string()))?;
        channel.push(payload).await
    }

    /// Stops accepting, closes every channel and waits for them to leave the
    /// registry. Channels still pending when `timeout` elapses are abandoned.
    /// Only the first call has any effect.
    pub async fn shutdown(&self, timeout: Duration) {
        if !self.quit.fire() {
            return;
        }
        let deadline = Instant::now() + timeout;
        info!(service = %self.service.service_id(), "server shutting down");

        let channels = self.channels.all();
        let total = channels.len();
        for (closed, channel) in channels.iter().enumerate() {
            if Instant::now() >= deadline {
                warn!(abandoned = total - closed, "shutdown deadline reached");
                break;
            }
            channel.close();
        }

        while !self.channels.is_empty() {
            if Instant::now() >= deadline {
                warn!(remaining = self.channels.len(), "shutdown timed out");
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        info!(service = %self.service.service_id(), "server shut down");
    }
}

const SHUTTING_DOWN: &str = "server is shutting down";

/// Tells the peer why it was refused, then closes the connection.
async fn reject<C: Conn>(mut conn: C, reason: &str, write_wait: Duration) {
    if let Err(e) = write_and_flush(&mut conn, OpCode::Close, reason.as_bytes(), write_wait).await {
        debug!(error = %e, "failed to send close frame");
    }
    if let Err(e) = conn.close().await {
        debug!(error = %e, "failed to close connection");
    }
}
