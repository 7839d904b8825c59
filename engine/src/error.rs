//! Error types for the Livesync engine.

use thiserror::Error;

/// All possible errors from the Livesync engine.
///
/// The reconciler itself is total; these errors come from turning raw rows
/// and feed payloads into engine types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Row errors
    #[error("row is not a JSON object")]
    NotAnObject,

    #[error("missing id field '{0}'")]
    MissingId(String),

    #[error("invalid id in field '{field}': {value}")]
    InvalidId { field: String, value: String },

    // Feed errors
    #[error("malformed change event: {0}")]
    MalformedEvent(String),

    #[error("unknown change event type: {0}")]
    UnknownEventType(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
