//! Edge case tests for livesync-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use livesync_engine::{
    ChangeEvent, Collection, Error, LiveCollection, MergeStrategy, Mutation, Reconciler, Record,
    WireChange,
};
use serde_json::json;

fn row(value: serde_json::Value) -> Record {
    Record::from_row(&value, "id").unwrap()
}

// ============================================================================
// Id Edge Cases
// ============================================================================

#[test]
fn numeric_and_string_ids_address_same_record() {
    let reconciler = Reconciler::default();
    let collection = Collection::from_records(vec![row(json!({"id": 1, "status": "pending"}))]);

    let update = ChangeEvent::decode(
        &WireChange::update("deposits", json!({"id": "1", "status": "approved"})),
        "id",
    )
    .unwrap();
    let next = reconciler.apply_change(&collection, &update);

    assert_eq!(next.len(), 1);
    assert_eq!(next.get("1").unwrap().get("status"), Some(&json!("approved")));
}

#[test]
fn ids_with_special_characters() {
    let ids = [
        "with spaces",
        "with/slash",
        "with:colon",
        "日本語",
        "🚀",
        "550e8400-e29b-41d4-a716-446655440000",
    ];

    let reconciler = Reconciler::default();
    let mut collection = Collection::new();
    for id in ids {
        collection = reconciler.apply_change(
            &collection,
            &ChangeEvent::Inserted(row(json!({"id": id}))),
        );
    }

    assert_eq!(collection.ids(), ids.to_vec());
    for id in ids {
        assert!(collection.contains(id), "missing {id}");
    }
}

#[test]
fn large_and_negative_ids() {
    let big = row(json!({"id": u64::MAX}));
    assert_eq!(big.id, u64::MAX.to_string());

    let negative = row(json!({"id": -3}));
    assert_eq!(negative.id, "-3");
}

#[test]
fn non_scalar_ids_are_rejected() {
    for bad in [json!({"id": true}), json!({"id": {"nested": 1}}), json!({"id": [1]})] {
        assert!(matches!(
            Record::from_row(&bad, "id"),
            Err(Error::InvalidId { .. })
        ));
    }
}

// ============================================================================
// Wire Edge Cases
// ============================================================================

#[test]
fn update_without_new_row_is_malformed() {
    let wire: WireChange =
        serde_json::from_str(r#"{"table": "trades", "eventType": "UPDATE", "new": null}"#).unwrap();

    assert!(matches!(
        ChangeEvent::decode(&wire, "id"),
        Err(Error::MalformedEvent(_))
    ));
}

#[test]
fn unknown_event_type_fails_to_parse() {
    let result = serde_json::from_str::<WireChange>(r#"{"table": "trades", "eventType": "TRUNCATE"}"#);
    assert!(result.is_err());
}

#[test]
fn extra_wire_fields_are_ignored() {
    let payload = r#"{
        "schema": "public",
        "table": "support_tickets",
        "eventType": "INSERT",
        "errors": null,
        "new": {"id": 3, "subject": "KYC pending", "priority": "high"},
        "old": {}
    }"#;

    let wire: WireChange = serde_json::from_str(payload).unwrap();
    let event = ChangeEvent::decode(&wire, "id").unwrap();
    match event {
        ChangeEvent::Inserted(record) => {
            assert_eq!(record.id, "3");
            assert_eq!(record.fields.len(), 2);
        }
        other => panic!("expected insert, got {other:?}"),
    }
}

// ============================================================================
// Payload Edge Cases
// ============================================================================

#[test]
fn deeply_nested_fields() {
    let mut nested = json!({"value": "leaf"});
    for _ in 0..50 {
        nested = json!({"nested": nested});
    }

    let record = row(json!({"id": 1, "data": nested.clone()}));
    let collection = Reconciler::default().apply_change(
        &Collection::new(),
        &ChangeEvent::Inserted(record),
    );

    assert_eq!(collection.get("1").unwrap().get("data"), Some(&nested));
}

#[test]
fn identical_insert_twice_counts_once() {
    let reconciler = Reconciler::default();
    let event = ChangeEvent::Inserted(row(json!({"id": 10, "symbol": "ETHUSD"})));

    let once = reconciler.apply_change(&Collection::new(), &event);
    let twice = reconciler.apply_change(&once, &event);

    assert_eq!(once.len(), 1);
    assert_eq!(twice, once);
}

// ============================================================================
// LiveCollection Edge Cases
// ============================================================================

#[test]
fn rollback_of_unknown_ticket_still_reports_error() {
    let mut live = LiveCollection::new("trades", MergeStrategy::default());
    live.load(vec![]);
    let ticket = live.apply_local(Mutation::create(row(json!({"id": 1}))));

    assert!(live.rollback(ticket, "first"));
    assert!(!live.rollback(ticket, "second"));
    assert_eq!(live.last_error().unwrap().message, "second");
}

#[test]
fn patch_on_missing_record_shows_nothing() {
    let mut live = LiveCollection::new("deposits", MergeStrategy::default());
    live.load(vec![]);

    let fields = json!({"status": "approved"}).as_object().cloned().unwrap();
    live.apply_local(Mutation::patch("404", fields));

    assert!(live.view().is_empty());
    assert_eq!(live.snapshot().pending, 1);
}

#[test]
fn many_pending_mutations() {
    let mut live = LiveCollection::new("transactions", MergeStrategy::default());
    live.load(vec![]);

    let tickets: Vec<_> = (0..1000u64)
        .map(|i| live.apply_local(Mutation::create(row(json!({"id": i, "amount": i})))))
        .collect();
    assert_eq!(live.view().len(), 1000);

    for ticket in tickets.iter().step_by(2) {
        live.rollback(*ticket, "rejected");
    }
    assert_eq!(live.view().len(), 500);
    assert_eq!(live.pending().len(), 500);
}

#[test]
fn delete_during_load_then_fetch_contains_record() {
    let mut live = LiveCollection::new("withdrawals", MergeStrategy::default());

    // Delete pushed before the fetch that still contains the row
    live.apply_remote(ChangeEvent::Deleted("8".into()));
    live.load(vec![row(json!({"id": 8, "amount": 20}))]);

    assert!(live.view().is_empty());
}

#[test]
fn snapshot_is_detached_from_live_state() {
    let mut live = LiveCollection::new("traders", MergeStrategy::default());
    live.load(vec![row(json!({"id": 1, "name": "Ada"}))]);

    let snapshot = live.snapshot();
    live.apply_remote(ChangeEvent::Deleted("1".into()));

    assert_eq!(snapshot.records.len(), 1);
    assert!(live.snapshot().records.is_empty());
    assert!(live.snapshot().revision > snapshot.revision);
}
