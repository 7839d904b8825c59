//! The per-resource synchronizer.
//!
//! A synchronizer is a task that owns one [`LiveCollection`] and is its only
//! writer. It feeds the collection from three inputs and publishes a snapshot
//! to observers after every transition, before taking the next input:
//!
//! 1. The initial fetch, run once at start and again on [`Synchronizer::refetch`]
//! 2. The change feed subscription, opened at start alongside the fetch
//!    (a change delivered without its row data triggers a fetch instead)
//! 3. Local mutations sent through the handle
//!
//! Remote calls for mutations run on their own tasks; only the optimistic
//! overlay and its acknowledgement or rollback pass through the synchronizer.

use std::future::pending;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use livesync_engine::{
    ChangeEvent, CollectionSnapshot, IntentTicket, LiveCollection, Mutation, MutationIntent, Record,
    Revision, WireChange,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};

use super::{
    ChangeFeed, FeedError, FetchError, InitialFetch, MutationError, RemoteMutation,
    ResourceConfig, SharedObserver, Subscription, SyncError,
};

/// The backend a synchronizer reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub fetch: Arc<dyn InitialFetch>,
    pub feed: Arc<dyn ChangeFeed>,
    pub mutator: Arc<dyn RemoteMutation>,
}

enum Command {
    Optimistic {
        mutation: Mutation,
        reply: oneshot::Sender<IntentTicket>,
    },
    Settle {
        ticket: IntentTicket,
        outcome: Result<Record, MutationError>,
        reply: oneshot::Sender<()>,
    },
    Refetch,
    Stop,
}

struct Shared {
    config: ResourceConfig,
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Arc<CollectionSnapshot>>,
    mutator: Arc<dyn RemoteMutation>,
    stopped: AtomicBool,
    /// Flips to `true` once the actor has torn down
    exited: watch::Receiver<bool>,
}

/// Handle to a running synchronizer.
///
/// Cheap to clone. The synchronizer stops when [`stop`](Self::stop) is
/// called or the last handle is dropped.
#[derive(Clone)]
pub struct Synchronizer {
    shared: Arc<Shared>,
}

impl Synchronizer {
    /// Start synchronizing a resource.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: ResourceConfig,
        collaborators: Collaborators,
        observers: Vec<SharedObserver>,
    ) -> Self {
        Self::spawn(config, collaborators, observers, 0)
    }

    /// Start synchronizing a resource whose previous run published up to
    /// revision `after`. Every snapshot of the new run has a higher revision.
    pub fn resume(
        config: ResourceConfig,
        collaborators: Collaborators,
        observers: Vec<SharedObserver>,
        after: Revision,
    ) -> Self {
        Self::spawn(config, collaborators, observers, after.saturating_add(1))
    }

    fn spawn(
        config: ResourceConfig,
        collaborators: Collaborators,
        observers: Vec<SharedObserver>,
        revision: Revision,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let live =
            LiveCollection::new(config.name.clone(), config.strategy).starting_at(revision);
        let (snapshots_tx, snapshots_rx) = watch::channel(Arc::new(live.snapshot()));
        let (exited_tx, exited_rx) = watch::channel(false);

        let actor = Actor {
            live,
            config: config.clone(),
            fetch: collaborators.fetch,
            feed: collaborators.feed,
            observers,
            snapshots: snapshots_tx,
            exited: exited_tx,
        };

        tracing::info!(resource = %config.name, table = %config.table, "starting synchronizer");
        tokio::spawn(actor.run(commands_rx));

        Self {
            shared: Arc::new(Shared {
                config,
                commands: commands_tx,
                snapshots: snapshots_rx,
                mutator: collaborators.mutator,
                stopped: AtomicBool::new(false),
                exited: exited_rx,
            }),
        }
    }

    pub fn resource(&self) -> &str {
        &self.shared.config.name
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.shared.config
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<CollectionSnapshot> {
        self.shared.snapshots.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn watch(&self) -> watch::Receiver<Arc<CollectionSnapshot>> {
        self.shared.snapshots.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire) || self.shared.commands.is_closed()
    }

    /// Apply a mutation optimistically, then on the backend.
    ///
    /// The overlay is visible to observers before the remote call starts. On
    /// success the returned record becomes confirmed state; on failure the
    /// overlay is rolled back and the error is both returned and recorded in
    /// the snapshot. The remote call runs on its own task, so the mutation
    /// still settles if the caller stops waiting.
    pub async fn apply_mutation(&self, mutation: Mutation) -> Result<Record, SyncError> {
        let intent = MutationIntent::new(self.resource(), mutation.clone());

        let (reply, ticket) = oneshot::channel();
        self.shared.send(Command::Optimistic { mutation, reply })?;
        let ticket = ticket.await.map_err(|_| SyncError::Stopped)?;

        tracing::debug!(
            resource = %self.resource(),
            record_id = %intent.record_id(),
            ticket = %ticket,
            kind = intent.mutation.kind(),
            "mutation sent"
        );

        let shared = Arc::clone(&self.shared);
        let remote = tokio::spawn(async move {
            let outcome = shared.mutator.mutate(&shared.config, &intent).await;
            shared.settle(ticket, outcome.clone()).await;
            outcome
        });

        match remote.await {
            Ok(outcome) => outcome.map_err(SyncError::from),
            Err(e) => {
                let error = MutationError::new(format!("mutation task failed: {e}"));
                self.shared.settle(ticket, Err(error.clone())).await;
                Err(error.into())
            }
        }
    }

    /// Run the initial fetch again. Ignored while a fetch is in flight.
    pub fn refetch(&self) -> Result<(), SyncError> {
        self.shared.send(Command::Refetch)
    }

    /// Stop synchronizing.
    ///
    /// Cancels any in-flight fetch, unsubscribes from the change feed and
    /// discards the collection. Observers are not notified again once this
    /// returns, whichever of several concurrent callers it returns to. Safe
    /// to call more than once.
    pub async fn stop(&self) {
        if !self.shared.stopped.swap(true, Ordering::AcqRel) {
            let _ = self.shared.commands.send(Command::Stop);
        }

        // A dropped sender means the actor is gone as well
        let mut exited = self.shared.exited.clone();
        let _ = exited.wait_for(|exited| *exited).await;
    }
}

impl Shared {
    fn send(&self, command: Command) -> Result<(), SyncError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(SyncError::Stopped);
        }
        self.commands.send(command).map_err(|_| SyncError::Stopped)
    }

    /// Acknowledge or roll back a pending mutation.
    ///
    /// A synchronizer stopped mid-flight has nothing left to settle.
    async fn settle(&self, ticket: IntentTicket, outcome: Result<Record, MutationError>) {
        let (reply, settled) = oneshot::channel();
        if self
            .send(Command::Settle {
                ticket,
                outcome,
                reply,
            })
            .is_ok()
        {
            let _ = settled.await;
        }
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("resource", &self.shared.config.name)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// The task that owns the collection.
struct Actor {
    config: ResourceConfig,
    live: LiveCollection,
    fetch: Arc<dyn InitialFetch>,
    feed: Arc<dyn ChangeFeed>,
    observers: Vec<SharedObserver>,
    snapshots: watch::Sender<Arc<CollectionSnapshot>>,
    exited: watch::Sender<bool>,
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut subscribing = Some(self.spawn_subscribe());
        let mut fetching = Some(self.spawn_fetch());
        let mut subscription: Option<Subscription> = None;
        // A change arrived without its row while a fetch was already running
        let mut reload_queued = false;

        self.notify();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Optimistic { mutation, reply }) => {
                        let ticket = self.live.apply_local(mutation);
                        self.notify();
                        let _ = reply.send(ticket);
                    }
                    Some(Command::Settle { ticket, outcome, reply }) => {
                        self.settle(ticket, outcome);
                        let _ = reply.send(());
                    }
                    Some(Command::Refetch) => {
                        if fetching.is_none() {
                            tracing::info!(resource = %self.config.name, "refetching");
                            self.live.begin_reload();
                            self.notify();
                            fetching = Some(self.spawn_fetch());
                        }
                    }
                    Some(Command::Stop) | None => break,
                },

                result = join(&mut subscribing) => {
                    subscribing = None;
                    match flatten(result, FeedError::new) {
                        Ok(sub) => {
                            tracing::debug!(resource = %self.config.name, "change feed subscribed");
                            subscription = Some(sub);
                        }
                        Err(e) => {
                            tracing::warn!(resource = %self.config.name, error = %e, "change feed subscribe failed");
                            self.live.mark_stale(e.message);
                            self.notify();
                        }
                    }
                }

                result = join(&mut fetching) => {
                    fetching = None;
                    match flatten(result, FetchError::new) {
                        Ok(records) => {
                            tracing::info!(
                                resource = %self.config.name,
                                records = records.len(),
                                buffered = self.live.buffered().len(),
                                "initial fetch loaded"
                            );
                            self.live.load(records);
                        }
                        Err(e) => {
                            tracing::warn!(resource = %self.config.name, error = %e, "initial fetch failed");
                            self.live.fail_load(e.message);
                        }
                    }
                    self.notify();

                    if std::mem::take(&mut reload_queued) {
                        self.live.begin_reload();
                        self.notify();
                        fetching = Some(self.spawn_fetch());
                    }
                }

                change = next_change(&mut subscription) => match change {
                    Some(wire) if !wire.is_applicable() => {
                        tracing::info!(
                            resource = %self.config.name,
                            event_type = %wire.event_type,
                            "change arrived without row data; reloading"
                        );
                        if fetching.is_none() {
                            self.live.begin_reload();
                            self.notify();
                            fetching = Some(self.spawn_fetch());
                        } else {
                            reload_queued = true;
                        }
                    }
                    Some(wire) => self.apply_wire(wire),
                    None => {
                        subscription = None;
                        tracing::warn!(resource = %self.config.name, "change feed closed; data may be stale");
                        self.live.mark_stale("change feed closed");
                        self.notify();
                    }
                },
            }
        }

        if let Some(task) = subscribing {
            task.abort();
        }
        if let Some(task) = fetching {
            task.abort();
        }
        if let Some(mut sub) = subscription {
            sub.unsubscribe();
        }

        tracing::info!(resource = %self.config.name, "synchronizer stopped");
        self.exited.send_replace(true);
    }

    fn spawn_fetch(&self) -> JoinHandle<Result<Vec<Record>, FetchError>> {
        let fetch = Arc::clone(&self.fetch);
        let config = self.config.clone();
        tokio::spawn(async move { fetch.fetch(&config).await })
    }

    fn spawn_subscribe(&self) -> JoinHandle<Result<Subscription, FeedError>> {
        let feed = Arc::clone(&self.feed);
        let config = self.config.clone();
        tokio::spawn(async move { feed.subscribe(&config).await })
    }

    fn apply_wire(&mut self, wire: WireChange) {
        match ChangeEvent::decode(&wire, &self.config.id_field) {
            Ok(event) => {
                tracing::trace!(
                    resource = %self.config.name,
                    record_id = %event.record_id(),
                    event_type = %wire.event_type,
                    "change applied"
                );
                self.live.apply_remote(event);
                self.notify();
            }
            Err(e) => {
                tracing::warn!(resource = %self.config.name, error = %e, "dropping malformed change event");
            }
        }
    }

    fn settle(&mut self, ticket: IntentTicket, outcome: Result<Record, MutationError>) {
        match outcome {
            Ok(record) => {
                if self.live.acknowledge(ticket, record) {
                    self.notify();
                } else {
                    tracing::debug!(
                        resource = %self.config.name,
                        ticket = %ticket,
                        "mutation superseded by a remote change"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    resource = %self.config.name,
                    ticket = %ticket,
                    error = %e,
                    "mutation rejected; rolling back"
                );
                self.live.rollback(ticket, e.message);
                self.notify();
            }
        }
    }

    fn notify(&self) {
        let snapshot = Arc::new(self.live.snapshot());
        for observer in &self.observers {
            observer.on_update(&snapshot);
        }
        self.snapshots.send_replace(snapshot);
    }
}

async fn join<T>(task: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => pending().await,
    }
}

async fn next_change(subscription: &mut Option<Subscription>) -> Option<WireChange> {
    match subscription {
        Some(sub) => sub.next().await,
        None => pending().await,
    }
}

fn flatten<T, E>(
    result: Result<Result<T, E>, JoinError>,
    task_error: impl FnOnce(String) -> E,
) -> Result<T, E> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(task_error(format!("task failed: {e}"))),
    }
}
