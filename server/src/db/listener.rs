//! Change feed backed by Postgres LISTEN/NOTIFY.
//!
//! One listener connection serves every resource. Notifications are decoded
//! into wire changes and fanned out through a [`FeedHub`] by table.

use async_trait::async_trait;
use livesync_engine::WireChange;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::task::JoinHandle;

use crate::sync::{ChangeFeed, FeedError, FeedHub, ResourceConfig, Subscription};

/// Listens on the notification channel the change trigger publishes to.
pub struct PgChangeFeed {
    hub: FeedHub,
    task: JoinHandle<()>,
}

impl PgChangeFeed {
    /// Open the listener connection and start forwarding notifications.
    pub async fn connect(pool: &PgPool, channel: &str) -> Result<Self, sqlx::Error> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(channel).await?;

        tracing::info!(channel = %channel, "listening for change notifications");

        let hub = FeedHub::new();
        let task = tokio::spawn(forward(listener, hub.clone()));
        Ok(Self { hub, task })
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn subscribe(&self, resource: &ResourceConfig) -> Result<Subscription, FeedError> {
        if self.task.is_finished() {
            return Err(FeedError::new("change notification listener is not running"));
        }
        self.hub.subscribe(resource).await
    }
}

impl Drop for PgChangeFeed {
    fn drop(&mut self) {
        self.task.abort();
        self.hub.close_all();
    }
}

async fn forward(mut listener: PgListener, hub: FeedHub) {
    loop {
        match listener.try_recv().await {
            Ok(Some(notification)) => {
                match serde_json::from_str::<WireChange>(notification.payload()) {
                    Ok(change) => {
                        hub.publish(&change);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable change notification");
                    }
                }
            }
            Ok(None) => {
                // Notifications sent while disconnected are lost, so current
                // subscribers can no longer trust their state.
                let closed = hub.close_all();
                tracing::warn!(closed, "notification connection lost; reconnecting");
            }
            Err(e) => {
                tracing::error!(error = %e, "notification listener failed");
                hub.close_all();
                break;
            }
        }
    }
}
