//! Transports for the InfraWatch client.
//!
//! Provides:
//! - Wire protocol for the push channel
//! - Reconnect backoff schedule
//! - `ConnectionManager` - single push channel with automatic reconnect
//! - WebSocket connector (feature: websocket)
//! - reqwest REST transport (feature: http)

pub mod backoff;
pub mod connection;
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "http")]
pub mod http;

pub use backoff::Backoff;
pub use connection::{ChannelOptions, ConnectionManager, ConnectionState, Connector, PushChannel};
pub use protocol::ClientMessage;

#[cfg(feature = "websocket")]
pub use websocket::WsConnector;

#[cfg(feature = "http")]
pub use http::ReqwestTransport;
