//! Request handlers for resources.

mod resources;
pub mod websocket;

pub use resources::*;
