use std::time::Duration;

/// Time allowed between two inbound frames before a channel is considered dead.
pub const DEFAULT_READ_WAIT: Duration = Duration::from_secs(3 * 60);

/// Time allowed to write one frame.
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(10);

/// Time allowed for the identity handshake.
pub const DEFAULT_LOGIN_WAIT: Duration = Duration::from_secs(10);

/// Client keep-alive period (must stay below the server's read wait).
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(55);

/// Pending outbound payloads per channel before `push` waits.
pub const WRITE_QUEUE_CAPACITY: usize = 5;

/// Initial capacity of the default channel registry.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Largest payload a transport will read or write (4 MB).
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;
