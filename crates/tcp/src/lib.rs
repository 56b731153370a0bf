//! Raw TCP transport for the Portico gateway.
//!
//! Frames use a compact length-prefixed layout (see [`wire`]) and share the
//! opcode numbering of WebSocket, so the core runtime treats both transports
//! identically.

pub mod conn;
pub mod transport;
pub mod wire;

pub use conn::{TcpConn, TcpReader, TcpWriter};
pub use transport::{TcpDialer, TcpTransport};

use portico_core::{Client, ClientOptions, Server, ServerConfig};
use portico_naming::ServiceRegistration;

pub type TcpServer = Server<TcpTransport>;
pub type TcpClient = Client<TcpDialer>;

/// Creates a TCP gateway server. Attach listeners before starting it.
pub fn new_server(service: impl ServiceRegistration + 'static, config: ServerConfig) -> TcpServer {
    Server::new(service, TcpTransport, config)
}

/// Creates a TCP client that logs in with `id`.
pub fn new_client(id: impl Into<String>, name: impl Into<String>, options: ClientOptions) -> TcpClient {
    Client::new(id, name, TcpDialer::new(), options)
}
