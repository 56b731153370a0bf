//! Collaborator traits the runtime calls into.
//!
//! Implementors provide identity, message handling and disconnect
//! bookkeeping; the runtime handles sockets, framing and lifecycle.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;

/// A boxed future returned by collaborator methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Derives and validates the identity of a freshly accepted connection.
///
/// `accept` may exchange frames with the peer through `conn`; it must finish
/// within `timeout` (the server enforces this as well). An error aborts the
/// connection before anything is registered.
pub trait Acceptor<C>: Send + Sync + 'static {
    fn accept<'a>(&'a self, conn: &'a mut C, timeout: Duration)
    -> BoxFuture<'a, Result<String, Error>>;
}

/// The view of a channel handed to a [`MessageListener`].
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    /// Queues `payload` for delivery to the peer.
    fn push(&self, payload: Vec<u8>) -> BoxFuture<'_, Result<(), Error>>;
}

/// Receives inbound application payloads.
///
/// Each payload is dispatched on its own task, so slow processing never
/// stalls the read loop. No ordering holds across channels.
pub trait MessageListener: Send + Sync + 'static {
    fn receive(&self, agent: Arc<dyn Agent>, payload: Vec<u8>) -> BoxFuture<'_, ()>;
}

/// Notified after a channel has left the registry.
pub trait StateListener: Send + Sync + 'static {
    fn disconnect<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), Error>>;
}
