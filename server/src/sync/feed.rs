//! Change feed subscriptions.
//!
//! A [`ChangeFeed`] hands out one [`Subscription`] per resource. The
//! [`FeedHub`] is an in-process fan-out of wire changes to subscriptions,
//! keyed by table; the Postgres feed publishes into one, and tests drive one
//! directly.
//!
//! Tables are matched schema-qualified: `deposits` and `public.deposits` name
//! the same table, `audit.deposits` another one.

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use livesync_engine::{ResourceName, WireChange};
use tokio::sync::mpsc;

use super::{FeedError, ResourceConfig};

/// Sender side of a subscription.
pub type ChangeSender = mpsc::UnboundedSender<WireChange>;

/// Opens change subscriptions for resources.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, resource: &ResourceConfig) -> Result<Subscription, FeedError>;
}

/// A live, cancellable stream of wire changes for one resource.
///
/// Dropping the subscription unsubscribes.
pub struct Subscription {
    resource: ResourceName,
    receiver: mpsc::UnboundedReceiver<WireChange>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Create a subscription that runs `on_close` when it is cancelled.
    pub fn new(
        resource: impl Into<ResourceName>,
        receiver: mpsc::UnboundedReceiver<WireChange>,
        on_close: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            resource: resource.into(),
            receiver,
            on_close: Some(Box::new(on_close)),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Wait for the next change. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<WireChange> {
        if self.is_closed() {
            return None;
        }
        self.receiver.recv().await
    }

    /// Stop receiving changes. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if let Some(close) = self.on_close.take() {
            close();
            self.receiver.close();
            tracing::debug!(resource = %self.resource, "change feed unsubscribed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.on_close.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("resource", &self.resource)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A single registered subscription.
#[derive(Debug)]
struct Subscriber {
    table: String,
    sender: ChangeSender,
}

#[derive(Debug, Default)]
struct HubInner {
    /// All live subscribers, keyed by subscription ID.
    subscribers: DashMap<String, Subscriber>,
    /// Index of subscription IDs by table.
    by_table: DashMap<String, Vec<String>>,
}

impl HubInner {
    fn unregister(&self, sub_id: &str) {
        if let Some((_, sub)) = self.subscribers.remove(sub_id) {
            if let Some(mut ids) = self.by_table.get_mut(&sub.table) {
                ids.retain(|id| id != sub_id);
                if ids.is_empty() {
                    drop(ids);
                    self.by_table.remove(&sub.table);
                }
            }

            tracing::debug!(sub_id = %sub_id, table = %sub.table, "feed subscriber removed");
        }
    }
}

/// Fans wire changes out to subscriptions by table.
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct FeedHub {
    inner: Arc<HubInner>,
}

impl FeedHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every change published for `table`.
    pub fn subscribe_table(&self, resource: impl Into<ResourceName>, table: &str) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let sub_id = uuid::Uuid::new_v4().to_string();
        let table = qualified_table(table);

        self.inner.subscribers.insert(
            sub_id.clone(),
            Subscriber {
                table: table.clone(),
                sender,
            },
        );
        self.inner
            .by_table
            .entry(table.clone())
            .or_default()
            .push(sub_id.clone());

        tracing::debug!(sub_id = %sub_id, table = %table, "feed subscriber registered");

        let hub: Weak<HubInner> = Arc::downgrade(&self.inner);
        Subscription::new(resource, receiver, move || {
            if let Some(hub) = hub.upgrade() {
                hub.unregister(&sub_id);
            }
        })
    }

    /// Deliver a change to every subscriber of its table.
    ///
    /// Returns the number of subscriptions that received it.
    pub fn publish(&self, change: &WireChange) -> usize {
        let ids = match self.inner.by_table.get(&qualified_table(&change.table)) {
            Some(ids) => ids.clone(),
            None => return 0,
        };

        let mut sent_count = 0;
        for id in ids {
            if let Some(sub) = self.inner.subscribers.get(&id) {
                if sub.sender.send(change.clone()).is_ok() {
                    sent_count += 1;
                }
            }
        }

        tracing::trace!(table = %change.table, recipients = sent_count, "published change");

        sent_count
    }

    /// End every subscription on `table`; their streams yield `None`.
    pub fn close_table(&self, table: &str) -> usize {
        let ids = self
            .inner
            .by_table
            .remove(&qualified_table(table))
            .map(|(_, ids)| ids)
            .unwrap_or_default();

        let closed = ids
            .iter()
            .filter(|id| self.inner.subscribers.remove(*id).is_some())
            .count();

        if closed > 0 {
            tracing::warn!(table = %table, closed, "feed subscriptions closed");
        }
        closed
    }

    /// End every subscription.
    pub fn close_all(&self) -> usize {
        let tables: Vec<String> = self
            .inner
            .by_table
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        tables.iter().map(|table| self.close_table(table)).sum()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Number of live subscriptions on one table.
    pub fn table_subscriber_count(&self, table: &str) -> usize {
        self.inner
            .by_table
            .get(&qualified_table(table))
            .map(|ids| ids.len())
            .unwrap_or(0)
    }
}

/// Routing key for a table name; unqualified names live in `public`.
fn qualified_table(table: &str) -> String {
    if table.contains('.') {
        table.to_string()
    } else {
        format!("public.{table}")
    }
}

#[async_trait]
impl ChangeFeed for FeedHub {
    async fn subscribe(&self, resource: &ResourceConfig) -> Result<Subscription, FeedError> {
        Ok(self.subscribe_table(resource.name.clone(), &resource.table))
    }
}
