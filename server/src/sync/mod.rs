//! Live synchronization of resources.
//!
//! Each resource gets one [`Synchronizer`]: a single-writer task that owns a
//! [`LiveCollection`](livesync_engine::LiveCollection), runs the initial
//! fetch, consumes the change feed and settles local mutations. The
//! [`Coordinator`] runs one synchronizer per configured resource.
//!
//! The synchronizer talks to the outside world only through the collaborator
//! traits ([`InitialFetch`], [`RemoteMutation`] and [`ChangeFeed`]), so it can
//! be driven by Postgres in production and by in-memory fakes in tests.

mod coordinator;
mod error;
mod feed;
mod observer;
mod resource;
mod source;
mod synchronizer;

pub use coordinator::Coordinator;
pub use error::{FeedError, FetchError, MutationError, Result, SyncError};
pub use feed::{ChangeFeed, FeedHub, Subscription};
pub use observer::{Observer, SharedObserver};
pub use resource::ResourceConfig;
pub use source::{InitialFetch, RemoteMutation};
pub use synchronizer::{Collaborators, Synchronizer};
