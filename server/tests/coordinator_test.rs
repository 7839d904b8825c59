//! Integration tests for running several resources side by side.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use livesync_engine::{FailureKind, WireChange};
use livesync_server::sync::{Coordinator, FeedHub, ResourceConfig, SyncError};
use serde_json::json;

fn coordinator(
    fetch: &Arc<FakeFetch>,
    hub: &FeedHub,
    observer: &Arc<RecordingObserver>,
) -> Coordinator {
    let mut coordinator = Coordinator::new(collaborators(fetch, hub, &FakeMutator::new()));
    coordinator.add_observer(observer.clone());
    coordinator
}

#[tokio::test]
async fn one_failed_fetch_leaves_other_resources_alone() {
    let fetch = FakeFetch::new();
    fetch.ready("deposits", vec![record(json!({"id": 1, "amount": 10}))]);
    fetch.fail("withdrawals", "relation \"withdrawals\" does not exist");
    let hub = FeedHub::new();
    let observer = RecordingObserver::new();

    let coordinator = coordinator(&fetch, &hub, &observer);
    coordinator
        .start_all([
            ResourceConfig::new("deposits"),
            ResourceConfig::new("withdrawals"),
        ])
        .unwrap();

    let deposits = coordinator.handle("deposits").unwrap();
    let withdrawals = coordinator.handle("withdrawals").unwrap();

    let loaded = wait_for(&deposits, |s| !s.is_loading).await;
    assert_eq!(ids(&loaded), vec!["1"]);
    assert!(loaded.last_error.is_none());

    let failed = wait_for(&withdrawals, |s| !s.is_loading).await;
    assert!(failed.records.is_empty());
    assert_eq!(
        failed.last_error.as_ref().map(|e| e.kind),
        Some(FailureKind::Fetch)
    );
    assert!(!failed.is_confirmed_empty());

    // Observers only ever saw each resource's own state
    assert!(observer
        .for_resource("deposits")
        .iter()
        .all(|s| s.last_error.is_none()));

    coordinator.stop_all().await;
}

#[tokio::test]
async fn feeds_are_independent_per_resource() {
    let fetch = FakeFetch::new();
    let hub = FeedHub::new();
    let observer = RecordingObserver::new();

    let coordinator = coordinator(&fetch, &hub, &observer);
    coordinator
        .start_all([
            ResourceConfig::new("deposits"),
            ResourceConfig::new("withdrawals"),
        ])
        .unwrap();
    wait_subscribers(&hub, "deposits", 1).await;
    wait_subscribers(&hub, "withdrawals", 1).await;

    let deposits = coordinator.handle("deposits").unwrap();
    let withdrawals = coordinator.handle("withdrawals").unwrap();
    wait_for(&deposits, |s| !s.is_loading).await;
    wait_for(&withdrawals, |s| !s.is_loading).await;

    hub.publish(&WireChange::insert("deposits", json!({"id": 7, "amount": 70})));
    wait_for(&deposits, |s| s.get("7").is_some()).await;

    // Closing one table's feed only marks that resource stale
    hub.close_table("withdrawals");
    wait_for(&withdrawals, |s| s.stale).await;

    assert!(withdrawals.snapshot().records.is_empty());
    assert!(!deposits.snapshot().stale);

    coordinator.stop_all().await;
}

#[tokio::test]
async fn stop_all_releases_every_subscription() {
    let fetch = FakeFetch::new();
    let _gate = fetch.gate("withdrawals");
    let hub = FeedHub::new();
    let observer = RecordingObserver::new();

    let coordinator = coordinator(&fetch, &hub, &observer);
    coordinator
        .start_all([
            ResourceConfig::new("deposits"),
            ResourceConfig::new("withdrawals"),
            ResourceConfig::new("transfers"),
        ])
        .unwrap();
    wait_subscribers(&hub, "deposits", 1).await;
    wait_subscribers(&hub, "withdrawals", 1).await;
    wait_subscribers(&hub, "transfers", 1).await;

    let handles: Vec<_> = coordinator
        .resources()
        .iter()
        .map(|name| coordinator.handle(name).unwrap())
        .collect();

    coordinator.stop_all().await;

    assert!(coordinator.is_empty());
    assert_eq!(hub.subscriber_count(), 0);
    assert!(handles.iter().all(|h| h.is_stopped()));

    // Nothing reaches observers after teardown
    let seen = observer.count();
    hub.publish(&WireChange::insert("deposits", json!({"id": 1})));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(observer.count(), seen);
}

#[tokio::test]
async fn duplicate_names_start_nothing() {
    let fetch = FakeFetch::new();
    let hub = FeedHub::new();
    let observer = RecordingObserver::new();

    let coordinator = coordinator(&fetch, &hub, &observer);
    let err = coordinator
        .start_all([
            ResourceConfig::new("deposits"),
            ResourceConfig::new("withdrawals"),
            ResourceConfig::new("deposits").with_table("deposits_archive"),
        ])
        .unwrap_err();

    assert_eq!(err, SyncError::DuplicateResource("deposits".to_string()));
    assert!(coordinator.is_empty());
    assert_eq!(fetch.calls(), 0);
}

#[tokio::test]
async fn starting_a_running_resource_is_rejected() {
    let fetch = FakeFetch::new();
    let hub = FeedHub::new();
    let observer = RecordingObserver::new();

    let coordinator = coordinator(&fetch, &hub, &observer);
    coordinator.start(ResourceConfig::new("deposits")).unwrap();

    let err = coordinator
        .start(ResourceConfig::new("deposits"))
        .unwrap_err();
    assert!(matches!(err, SyncError::DuplicateResource(_)));
    assert_eq!(coordinator.len(), 1);

    coordinator.stop_all().await;
}

#[tokio::test]
async fn stopping_one_resource_keeps_the_rest() {
    let fetch = FakeFetch::new();
    let hub = FeedHub::new();
    let observer = RecordingObserver::new();

    let coordinator = coordinator(&fetch, &hub, &observer);
    coordinator
        .start_all([
            ResourceConfig::new("deposits"),
            ResourceConfig::new("withdrawals"),
        ])
        .unwrap();
    wait_subscribers(&hub, "deposits", 1).await;
    wait_subscribers(&hub, "withdrawals", 1).await;

    coordinator.stop("withdrawals").await.unwrap();

    assert_eq!(coordinator.resources(), vec!["deposits".to_string()]);
    assert_eq!(hub.table_subscriber_count("withdrawals"), 0);
    assert_eq!(hub.table_subscriber_count("deposits"), 1);
    assert_eq!(
        coordinator.handle("withdrawals").unwrap_err(),
        SyncError::UnknownResource("withdrawals".to_string())
    );
    assert_eq!(
        coordinator.stop("withdrawals").await.unwrap_err(),
        SyncError::UnknownResource("withdrawals".to_string())
    );

    let deposits = coordinator.handle("deposits").unwrap();
    hub.publish(&WireChange::insert("deposits", json!({"id": 3})));
    wait_for(&deposits, |s| s.get("3").is_some()).await;

    coordinator.stop_all().await;
}

#[tokio::test]
async fn restart_recovers_a_stale_resource() {
    let fetch = FakeFetch::new();
    fetch.ready("deposits", vec![record(json!({"id": 1, "amount": 10}))]);
    fetch.ready(
        "deposits",
        vec![
            record(json!({"id": 1, "amount": 10})),
            record(json!({"id": 2, "amount": 20})),
        ],
    );
    let hub = FeedHub::new();
    let observer = RecordingObserver::new();

    let coordinator = coordinator(&fetch, &hub, &observer);
    let deposits = coordinator.start(ResourceConfig::new("deposits")).unwrap();
    wait_subscribers(&hub, "deposits", 1).await;
    wait_for(&deposits, |s| !s.is_loading).await;

    hub.close_table("deposits");
    let stale = wait_for(&deposits, |s| s.stale).await;
    assert_eq!(ids(&stale), vec!["1"]);

    let restarted = coordinator.restart("deposits").await.unwrap();
    assert!(deposits.is_stopped());

    let snapshot = wait_for(&restarted, |s| !s.is_loading).await;
    assert!(!snapshot.stale);
    assert_eq!(ids(&snapshot), vec!["1", "2"]);
    wait_subscribers(&hub, "deposits", 1).await;

    coordinator.stop_all().await;
}

#[tokio::test]
async fn restart_keeps_revisions_increasing() {
    let fetch = FakeFetch::new();
    let hub = FeedHub::new();
    let observer = RecordingObserver::new();

    let coordinator = coordinator(&fetch, &hub, &observer);
    let deposits = coordinator.start(ResourceConfig::new("deposits")).unwrap();
    wait_subscribers(&hub, "deposits", 1).await;
    wait_for(&deposits, |s| !s.is_loading).await;

    for id in 1..=5 {
        hub.publish(&WireChange::insert("deposits", json!({"id": id})));
    }
    let before = wait_for(&deposits, |s| s.records.len() == 5).await;

    let restarted = coordinator.restart("deposits").await.unwrap();
    assert!(restarted.snapshot().revision > before.revision);

    let after = wait_for(&restarted, |s| !s.is_loading).await;
    assert!(after.revision > before.revision);

    // Everything observers saw stays in revision order across the restart
    let seen = observer.for_resource("deposits");
    assert!(seen.windows(2).all(|w| w[0].revision < w[1].revision));

    coordinator.stop_all().await;
}

#[tokio::test]
async fn snapshots_cover_every_resource_in_name_order() {
    let fetch = FakeFetch::new();
    let hub = FeedHub::new();
    let observer = RecordingObserver::new();

    let coordinator = coordinator(&fetch, &hub, &observer);
    coordinator
        .start_all([
            ResourceConfig::new("withdrawals"),
            ResourceConfig::new("deposits"),
        ])
        .unwrap();

    let names: Vec<_> = coordinator
        .snapshots()
        .iter()
        .map(|s| s.resource.clone())
        .collect();
    assert_eq!(names, vec!["deposits", "withdrawals"]);

    coordinator.stop_all().await;
}
