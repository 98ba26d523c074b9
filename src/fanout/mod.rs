// Client fan-out: membership set of open push sockets

pub mod config;
mod connection;
mod registry;

pub use config::{FanoutConfig, FrameMode};
pub use connection::{ClientConnection, ClientInfo, ConnectionId, ConnectionState};
pub use registry::{BroadcastReport, ClientRegistry};
