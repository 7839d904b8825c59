//! WebSocket support for live dashboards.
//!
//! Clients connect via WebSocket, subscribe to resources and receive a
//! snapshot push every time a subscribed resource changes. Mutations can be
//! sent over the same connection.

mod manager;
mod protocol;

pub use manager::ConnectionManager;
pub use protocol::*;
