// Error taxonomy
pub mod error;

// Configuration (TOML file + env overrides)
pub mod config;

// Broker subscriber (MQTT / NATS) with reconnect
pub mod broker;

// Client fan-out registry
pub mod fanout;

// Broker -> registry relay task and counters
pub mod relay;

// HTTP and WebSocket APIs
pub mod api;

// Task wiring
pub mod bridge;

pub use bridge::Bridge;
pub use error::BridgeError;
