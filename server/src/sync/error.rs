//! Errors raised while synchronizing a resource.

/// The initial bulk read of a resource failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The backend rejected a mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct MutationError {
    pub message: String,
}

impl MutationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The change feed could not be subscribed to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FeedError {
    pub message: String,
}

impl FeedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors surfaced by synchronizers and the coordinator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("initial fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("mutation rejected: {0}")]
    Mutation(#[from] MutationError),

    #[error("change feed unavailable: {0}")]
    Feed(#[from] FeedError),

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("resource already started: {0}")]
    DuplicateResource(String),

    #[error("synchronizer stopped")]
    Stopped,
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
