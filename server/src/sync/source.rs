//! Request/response collaborators: the initial fetch and remote mutations.

use async_trait::async_trait;
use livesync_engine::{MutationIntent, Record};

use super::{FetchError, MutationError, ResourceConfig};

/// Reads the full current contents of a resource.
#[async_trait]
pub trait InitialFetch: Send + Sync {
    async fn fetch(&self, resource: &ResourceConfig) -> Result<Vec<Record>, FetchError>;
}

/// Applies a mutation on the backend and returns the resulting record.
///
/// For deletes the returned record is the row as it was removed.
#[async_trait]
pub trait RemoteMutation: Send + Sync {
    async fn mutate(
        &self,
        resource: &ResourceConfig,
        intent: &MutationIntent,
    ) -> Result<Record, MutationError>;
}
