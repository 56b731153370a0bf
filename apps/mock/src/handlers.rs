//! Demo collaborators: echo messages back, log disconnects.

use std::sync::Arc;

use tracing::{info, warn};

use portico_core::{Agent, BoxFuture, Error, MessageListener, StateListener};

/// Suffix appended to every echoed payload.
pub const ECHO_SUFFIX: &[u8] = b" from server ";

/// Replies to each payload with `payload + " from server "`.
#[derive(Debug, Default)]
pub struct EchoHandler;

impl MessageListener for EchoHandler {
    fn receive(&self, agent: Arc<dyn Agent>, mut payload: Vec<u8>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            info!(id = %agent.id(), msg = %String::from_utf8_lossy(&payload), "recv");
            payload.extend_from_slice(ECHO_SUFFIX);
            if let Err(e) = agent.push(payload).await {
                warn!(id = %agent.id(), error = %e, "echo failed");
            }
        })
    }
}

/// Logs every disconnect.
#[derive(Debug, Default)]
pub struct DisconnectLogger;

impl StateListener for DisconnectLogger {
    fn disconnect<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            info!(%id, "disconnect");
            Ok(())
        })
    }
}
