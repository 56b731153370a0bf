//! Transport-agnostic connection gateway runtime.
//!
//! A [`Server`] accepts sockets through a [`Transport`], derives an identity
//! for each one with an [`Acceptor`], and wraps the connection in a
//! [`Channel`] that owns a read loop and a write pump. Channels are tracked in
//! a [`ChannelMap`] so payloads can be pushed by identity. A [`Client`] dials a
//! gateway through a [`Dialer`] and exposes send/read with optional heartbeat.
//!
//! Concrete transports live in `portico-tcp` (custom binary framing) and
//! `portico-websocket` (standard WebSocket framing).

pub mod acceptor;
pub mod channel;
pub mod channel_map;
pub mod client;
pub mod conn;
pub mod constants;
pub mod error;
pub mod event;
pub mod frame;
pub mod listener;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use acceptor::{DefaultAcceptor, LoginAcceptor};
pub use channel::Channel;
pub use channel_map::{ChannelMap, Channels};
pub use client::{Client, ClientOptions, ClientState};
pub use conn::{Conn, Deadline, Dialer, DialerContext, FrameReader, FrameWriter, Transport};
pub use error::{Error, TransportError};
pub use event::Event;
pub use frame::{Frame, OpCode};
pub use listener::{Acceptor, Agent, BoxFuture, MessageListener, StateListener};
pub use server::{Server, ServerConfig};
