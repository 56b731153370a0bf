//! Error types for the gateway runtime.

/// Failures of the underlying connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("deadline exceeded")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("transport error: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors produced by channels, servers and clients.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("channel id is repeated: {0}")]
    DuplicateIdentity(String),

    #[error("channel {0} has closed")]
    ChannelClosed(String),

    #[error("channel {0} not found")]
    ChannelNotFound(String),

    #[error("client is not connected")]
    NotConnected,

    #[error("client has connected")]
    AlreadyConnected,

    #[error("remote side closed the channel")]
    RemoteClosed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(TransportError::Io(err))
    }
}
