//! WebSocket transport for the Portico gateway.
//!
//! Standard RFC 6455 framing via `tokio-tungstenite`. The server upgrades
//! accepted sockets over HTTP; clients dial `ws://host:port` (the scheme is
//! added when missing).

pub mod conn;
pub mod transport;

pub use conn::{MAX_CLOSE_REASON, WsConn, WsReader, WsWriter};
pub use transport::{ClientConn, ServerConn, WsDialer, WsTransport, dial_url};

use portico_core::{Client, ClientOptions, Server, ServerConfig};
use portico_naming::ServiceRegistration;

pub type WsServer = Server<WsTransport>;
pub type WsClient = Client<WsDialer>;

/// Creates a WebSocket gateway server. Attach listeners before starting it.
pub fn new_server(service: impl ServiceRegistration + 'static, config: ServerConfig) -> WsServer {
    Server::new(service, WsTransport, config)
}

/// Creates a WebSocket client that logs in with `id`.
pub fn new_client(id: impl Into<String>, name: impl Into<String>, options: ClientOptions) -> WsClient {
    Client::new(id, name, WsDialer::new(), options)
}
