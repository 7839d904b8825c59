//! Postgres collaborators for the synchronizers.

mod listener;
mod pool;
mod source;

pub use listener::PgChangeFeed;
pub use pool::*;
pub use source::PgSource;
