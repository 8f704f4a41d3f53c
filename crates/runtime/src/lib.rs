//! Browser-facing runtime for follow-prune.
//!
//! Provides the DevTools [`Connection`] (request/response correlation and
//! event fan-out over a pluggable transport), the websocket transport used in
//! production, an in-memory fake transport for tests, and small process
//! helpers shared by the launcher.

pub mod connection;
pub mod error;
pub mod fake_transport;
pub mod process;
pub mod transport;

pub use connection::Connection;
pub use error::{Error, Result};
pub use fake_transport::{FakeTransportBuilder, FakeTransportController};
pub use transport::{TransportParts, TransportReceiver, TransportSender, WebSocketTransport};
