//! Fake collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use livesync_engine::{CollectionSnapshot, FieldMap, Mutation, MutationIntent, Record};
use livesync_server::sync::{
    ChangeFeed, Collaborators, FeedError, FeedHub, FetchError, InitialFetch, MutationError,
    Observer, RemoteMutation, ResourceConfig, Subscription, Synchronizer,
};
use serde_json::Value;
use tokio::sync::oneshot;

pub const TIMEOUT: Duration = Duration::from_secs(2);

pub fn record(value: Value) -> Record {
    Record::from_row(&value, "id").unwrap()
}

pub fn ids(snapshot: &CollectionSnapshot) -> Vec<&str> {
    snapshot.records.iter().map(|r| r.id.as_str()).collect()
}

pub type FetchResult = Result<Vec<Record>, FetchError>;

enum FetchStep {
    Ready(FetchResult),
    Gated(oneshot::Receiver<FetchResult>),
}

/// Scripted initial fetch. Each call for a resource takes the next scripted
/// step; an unscripted fetch returns no rows.
#[derive(Default)]
pub struct FakeFetch {
    steps: Mutex<HashMap<String, VecDeque<FetchStep>>>,
    calls: AtomicUsize,
}

impl FakeFetch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, resource: &str, step: FetchStep) {
        self.steps
            .lock()
            .unwrap()
            .entry(resource.to_string())
            .or_default()
            .push_back(step);
    }

    pub fn ready(&self, resource: &str, records: Vec<Record>) {
        self.push(resource, FetchStep::Ready(Ok(records)));
    }

    pub fn fail(&self, resource: &str, message: &str) {
        self.push(resource, FetchStep::Ready(Err(FetchError::new(message))));
    }

    /// The next fetch of `resource` resolves only when the sender is used.
    pub fn gate(&self, resource: &str) -> oneshot::Sender<FetchResult> {
        let (tx, rx) = oneshot::channel();
        self.push(resource, FetchStep::Gated(rx));
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InitialFetch for FakeFetch {
    async fn fetch(&self, resource: &ResourceConfig) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap()
            .get_mut(&resource.name)
            .and_then(|steps| steps.pop_front());

        match step {
            None => Ok(Vec::new()),
            Some(FetchStep::Ready(result)) => result,
            Some(FetchStep::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(FetchError::new("gate dropped"))),
        }
    }
}

/// Scripted backend for mutations. Echoes the mutation back unless a
/// response was scripted for the record id.
#[derive(Default)]
pub struct FakeMutator {
    responses: Mutex<HashMap<String, Result<Record, MutationError>>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    intents: Mutex<Vec<MutationIntent>>,
}

impl FakeMutator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject(&self, record_id: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(record_id.to_string(), Err(MutationError::new(message)));
    }

    pub fn respond(&self, record_id: &str, record: Record) {
        self.responses
            .lock()
            .unwrap()
            .insert(record_id.to_string(), Ok(record));
    }

    /// The next mutation waits until the sender is used.
    pub fn hold(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn intents(&self) -> Vec<MutationIntent> {
        self.intents.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteMutation for FakeMutator {
    async fn mutate(
        &self,
        _resource: &ResourceConfig,
        intent: &MutationIntent,
    ) -> Result<Record, MutationError> {
        self.intents.lock().unwrap().push(intent.clone());

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let scripted = self.responses.lock().unwrap().remove(intent.record_id());
        scripted.unwrap_or_else(|| {
            Ok(match &intent.mutation {
                Mutation::Create { record } | Mutation::Update { record } => record.clone(),
                Mutation::Patch { id, fields } => Record::new(id.clone(), fields.clone()),
                Mutation::Delete { id } => Record::new(id.clone(), FieldMap::new()),
            })
        })
    }
}

/// A feed that never lets anyone subscribe.
pub struct FailingFeed;

#[async_trait]
impl ChangeFeed for FailingFeed {
    async fn subscribe(&self, _resource: &ResourceConfig) -> Result<Subscription, FeedError> {
        Err(FeedError::new("realtime unavailable"))
    }
}

/// Records every snapshot it is handed.
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<CollectionSnapshot>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn snapshots(&self) -> Vec<CollectionSnapshot> {
        self.seen.lock().unwrap().clone()
    }

    pub fn for_resource(&self, resource: &str) -> Vec<CollectionSnapshot> {
        self.snapshots()
            .into_iter()
            .filter(|s| s.resource == resource)
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn on_update(&self, snapshot: &CollectionSnapshot) {
        self.seen.lock().unwrap().push(snapshot.clone());
    }
}

pub fn collaborators(
    fetch: &Arc<FakeFetch>,
    feed: &FeedHub,
    mutator: &Arc<FakeMutator>,
) -> Collaborators {
    Collaborators {
        fetch: fetch.clone(),
        feed: Arc::new(feed.clone()),
        mutator: mutator.clone(),
    }
}

/// Wait until the published snapshot satisfies `pred`.
pub async fn wait_for(
    sync: &Synchronizer,
    mut pred: impl FnMut(&CollectionSnapshot) -> bool,
) -> Arc<CollectionSnapshot> {
    let mut rx = sync.watch();
    let snapshot = tokio::time::timeout(TIMEOUT, rx.wait_for(|s| pred(s.as_ref())))
        .await
        .expect("timed out waiting for snapshot")
        .expect("synchronizer gone");
    Arc::clone(&snapshot)
}

/// Wait until `table` has `count` live feed subscriptions.
pub async fn wait_subscribers(hub: &FeedHub, table: &str, count: usize) {
    tokio::time::timeout(TIMEOUT, async {
        while hub.table_subscriber_count(table) != count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for feed subscribers");
}
