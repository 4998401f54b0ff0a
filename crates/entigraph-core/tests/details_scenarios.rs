//! # Details Scenario Tests
//!
//! End-to-end lookups against seeded stores.
//!
//! ## Groups
//! - history: latest snapshot vs change log
//! - scope: dataset-name filtering
//! - tombstones: garbage-collected datasets
//! - snapshots: point-in-time reads under concurrent writers
//! - failures: identifier and integrity errors

#![allow(clippy::panic)]

use entigraph_core::{
    DatasetDetails, EntigraphError, EntityDocument, Fixture, FixtureWriter, Lookup, Store,
    load_fixture,
};
use serde_json::json;

const NO_FILTER: [&str; 0] = [];

/// Seed the `ex:3` scenario: two versions in `people`, one in `contacts`,
/// plus an unrelated entity in a third dataset.
fn scenario_store() -> Store {
    let store = Store::in_memory().expect("open store");
    let fixture: Fixture = serde_json::from_value(json!({
        "namespaces": {"ex": "http://example.com/"},
        "datasets": {
            "people": [
                {"id": "ex:3", "recorded": 1662648998417816245i64, "refs": {}, "props": {"ex:name": "Frank"}},
                {"id": "ex:3", "recorded": 1663075373488961084i64, "refs": {},
                 "props": {"ex:name": "Frank", "ex:extra": {"refs": {}, "props": {}}}}
            ],
            "contacts": [
                {"id": "ex:3", "recorded": 1663074960494865060i64, "refs": {}, "props": {"ex:name": "Frank"}}
            ],
            "places": [
                {"id": "ex:oslo", "recorded": 1663074960494865061i64, "refs": {}, "props": {"ex:name": "Oslo"}}
            ]
        }
    }))
    .expect("fixture");
    load_fixture(&store, &fixture).expect("load");
    store
}

fn found(details: &DatasetDetails) -> (&EntityDocument, &[EntityDocument]) {
    match details {
        DatasetDetails::Found { latest, changes } => (latest, changes),
        DatasetDetails::Inconsistent { dataset_id, .. } => {
            panic!("dataset {} unexpectedly inconsistent", dataset_id)
        }
    }
}

// =============================================================================
// HISTORY
// =============================================================================

mod history {
    use super::*;

    #[test]
    fn frank_has_two_people_versions_and_one_contact() {
        let store = scenario_store();
        let details = Lookup::new(&store)
            .details("ex:3", &NO_FILTER)
            .expect("details");

        assert_eq!(
            details.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["contacts", "people"]
        );

        let (latest, changes) = found(&details["people"]);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].recorded, 1662648998417816245);
        assert_eq!(changes[1].recorded, 1663075373488961084);
        assert_eq!(latest, &changes[1]);
        assert!(latest.props.contains_key("ex:extra"));
        assert!(!changes[0].props.contains_key("ex:extra"));

        let (contact, contact_changes) = found(&details["contacts"]);
        assert_eq!(contact_changes.len(), 1);
        assert_eq!(contact, &contact_changes[0]);
    }

    #[test]
    fn documents_carry_internal_id_and_curie() {
        let store = scenario_store();
        let details = Lookup::new(&store)
            .details("ex:3", &NO_FILTER)
            .expect("details");
        let (latest, changes) = found(&details["people"]);

        assert_eq!(latest.id, "ex:3");
        assert_ne!(latest.internal_id, 0);
        assert!(changes.iter().all(|c| c.internal_id == latest.internal_id));
    }

    #[test]
    fn latest_equals_last_change_for_n_versions() {
        let store = Store::in_memory().expect("open store");
        let mut writer = FixtureWriter::new(&store).expect("writer");
        for i in 0..25i64 {
            writer
                .append(
                    "log",
                    EntityDocument::new("ex:counter", 1000 + i).with_prop("ex:n", json!(i)),
                )
                .expect("append");
        }
        writer.commit().expect("commit");

        let details = Lookup::new(&store)
            .details("ex:counter", &NO_FILTER)
            .expect("details");
        let (latest, changes) = found(&details["log"]);
        assert_eq!(changes.len(), 25);
        assert_eq!(changes.last(), Some(latest));
        assert_eq!(latest.props["ex:n"], json!(24));
        assert!(changes.windows(2).all(|w| w[0].recorded <= w[1].recorded));
    }

    #[test]
    fn other_entities_do_not_leak_into_results() {
        let store = scenario_store();
        let details = Lookup::new(&store)
            .details("ex:oslo", &NO_FILTER)
            .expect("details");
        assert_eq!(details.keys().collect::<Vec<_>>(), vec!["places"]);
        let (_, changes) = found(&details["places"]);
        assert!(changes.iter().all(|c| c.id == "ex:oslo"));
    }

    #[test]
    fn pre_epoch_timestamps_are_returned_unchanged() {
        let store = Store::in_memory().expect("open store");
        let mut writer = FixtureWriter::new(&store).expect("writer");
        writer
            .append("archive", EntityDocument::new("ex:1", -86_400_000_000_000))
            .expect("append");
        let key = writer
            .append("archive", EntityDocument::new("ex:1", 0))
            .expect("append");
        writer
            .put_raw_locator(key, br#"{"id":"ex:1","internalId":1,"recorded":-5}"#)
            .expect("put");
        writer.commit().expect("commit");

        let details = Lookup::new(&store)
            .details("ex:1", &NO_FILTER)
            .expect("details");
        let (latest, changes) = found(&details["archive"]);
        assert_eq!(latest.recorded, -5);
        assert_eq!(changes[0].recorded, -86_400_000_000_000);
        assert_eq!(
            serde_json::to_value(&details).expect("serialize")["archive"]["latest"]["recorded"],
            json!(-5)
        );
    }

    #[test]
    fn result_serializes_to_wire_shape() {
        let store = scenario_store();
        let details = Lookup::new(&store)
            .details("ex:3", &["contacts"])
            .expect("details");
        let value = serde_json::to_value(&details).expect("serialize");

        assert_eq!(value["contacts"]["latest"]["id"], json!("ex:3"));
        assert_eq!(value["contacts"]["changes"].as_array().map(Vec::len), Some(1));
        assert_eq!(
            value["contacts"]["latest"]["props"]["ex:name"],
            json!("Frank")
        );
    }
}

// =============================================================================
// SCOPE
// =============================================================================

mod scope {
    use super::*;

    #[test]
    fn filtered_result_is_subset_of_unfiltered() {
        let store = scenario_store();
        let lookup = Lookup::new(&store);
        let all = lookup.details("ex:3", &NO_FILTER).expect("all");
        let some = lookup.details("ex:3", &["people"]).expect("some");

        assert!(some.keys().all(|k| all.contains_key(k)));
        assert_eq!(some.keys().collect::<Vec<_>>(), vec!["people"]);
        assert_eq!(some["people"], all["people"]);
    }

    #[test]
    fn filter_keeps_only_datasets_the_entity_appears_in() {
        let store = scenario_store();
        let details = Lookup::new(&store)
            .details("ex:3", &["people", "places", "missing"])
            .expect("details");
        assert_eq!(details.keys().collect::<Vec<_>>(), vec!["people"]);
    }

    #[test]
    fn filter_of_only_unknown_names_returns_nothing() {
        let store = scenario_store();
        let details = Lookup::new(&store)
            .details("ex:3", &["missing", "also-missing"])
            .expect("details");
        assert!(details.is_empty());
    }

    #[test]
    fn owned_string_filters_are_accepted() {
        let store = scenario_store();
        let names = vec!["contacts".to_string()];
        let details = Lookup::new(&store).details("ex:3", &names).expect("details");
        assert_eq!(details.len(), 1);
    }
}

// =============================================================================
// TOMBSTONES
// =============================================================================

mod tombstones {
    use super::*;

    fn tombstone(store: &Store, dataset: &str) {
        let mut writer = FixtureWriter::new(store).expect("writer");
        writer.mark_dataset_deleted(dataset).expect("tombstone");
        writer.commit().expect("commit");
    }

    #[test]
    fn deleted_dataset_disappears_with_empty_scope() {
        let store = scenario_store();
        tombstone(&store, "places");

        let details = Lookup::new(&store)
            .details("ex:oslo", &NO_FILTER)
            .expect("details");
        assert!(details.is_empty());
    }

    #[test]
    fn deleted_dataset_is_excluded_even_when_named() {
        let store = scenario_store();
        tombstone(&store, "people");

        let lookup = Lookup::new(&store);
        let named = lookup.details("ex:3", &["people"]).expect("named");
        assert!(named.is_empty());

        let all = lookup.details("ex:3", &NO_FILTER).expect("all");
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["contacts"]);
    }

    #[test]
    fn deleted_first_dataset_does_not_swallow_the_next() {
        let store = Store::in_memory().expect("open store");
        let mut writer = FixtureWriter::new(&store).expect("writer");
        for (dataset, recorded) in [("a", 1), ("a", 2), ("b", 3), ("c", 4), ("c", 5)] {
            writer
                .append(dataset, EntityDocument::new("ex:1", recorded))
                .expect("append");
        }
        writer.mark_dataset_deleted("b").expect("tombstone");
        writer.commit().expect("commit");

        let details = Lookup::new(&store)
            .details("ex:1", &NO_FILTER)
            .expect("details");
        assert_eq!(details.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(details["a"].latest().map(|d| d.recorded), Some(2));
        assert_eq!(details["c"].latest().map(|d| d.recorded), Some(5));
    }
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

mod snapshots {
    use super::*;

    #[test]
    fn write_after_snapshot_is_invisible() {
        let store = scenario_store();
        let txn = store.begin_read().expect("snapshot");

        {
            let mut writer = FixtureWriter::new(&store).expect("writer");
            writer
                .append(
                    "people",
                    EntityDocument::new("ex:3", 1700000000000000000)
                        .with_prop("ex:name", json!("Francis")),
                )
                .expect("append");
            writer
                .append("audit", EntityDocument::new("ex:3", 1700000000000000001))
                .expect("append");
            writer.commit().expect("commit");
        }

        let before = Lookup::details_at(&txn, "ex:3", &NO_FILTER).expect("old snapshot");
        assert_eq!(before.len(), 2);
        let (latest, changes) = found(&before["people"]);
        assert_eq!(changes.len(), 2);
        assert_eq!(latest.props["ex:name"], json!("Frank"));

        let after = Lookup::new(&store)
            .details("ex:3", &NO_FILTER)
            .expect("new snapshot");
        assert_eq!(after.len(), 3);
        let (latest, changes) = found(&after["people"]);
        assert_eq!(changes.len(), 3);
        assert_eq!(latest.props["ex:name"], json!("Francis"));
    }

    #[test]
    fn tombstone_after_snapshot_is_invisible() {
        let store = scenario_store();
        let txn = store.begin_read().expect("snapshot");
        {
            let mut writer = FixtureWriter::new(&store).expect("writer");
            writer.mark_dataset_deleted("people").expect("tombstone");
            writer.commit().expect("commit");
        }

        let before = Lookup::details_at(&txn, "ex:3", &NO_FILTER).expect("old snapshot");
        assert!(before.contains_key("people"));
    }

    #[test]
    fn concurrent_readers_and_writer() {
        let store = scenario_store();

        std::thread::scope(|scope| {
            let writer = scope.spawn(|| {
                for i in 0..20i64 {
                    let mut writer = FixtureWriter::new(&store).expect("writer");
                    writer
                        .append("people", EntityDocument::new("ex:3", 1700000000000000000 + i))
                        .expect("append");
                    writer.commit().expect("commit");
                }
            });

            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..20 {
                        let details = Lookup::new(&store)
                            .details("ex:3", &["people"])
                            .expect("details");
                        let (latest, changes) = found(&details["people"]);
                        assert!(changes.len() >= 2);
                        assert_eq!(changes.last(), Some(latest));
                    }
                });
            }

            writer.join().expect("writer thread");
        });
    }
}

// =============================================================================
// FAILURES
// =============================================================================

mod failures {
    use super::*;

    #[test]
    fn never_assigned_curie_is_not_found() {
        let store = scenario_store();
        let result = Lookup::new(&store).details("curie:never-assigned", &NO_FILTER);
        assert!(matches!(result, Err(EntigraphError::NotFound(_))));
    }

    #[test]
    fn malformed_identifier_is_invalid() {
        let store = scenario_store();
        let lookup = Lookup::new(&store);
        assert!(matches!(
            lookup.details("no-prefix-here", &NO_FILTER),
            Err(EntigraphError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            lookup.details("https://unregistered.org/people/3", &NO_FILTER),
            Err(EntigraphError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn inconsistent_dataset_does_not_hide_others() {
        let store = scenario_store();
        {
            let mut writer = FixtureWriter::new(&store).expect("writer");
            writer.forget_dataset_name("people").expect("forget");
            writer.commit().expect("commit");
        }
        let details = Lookup::new(&store)
            .details("ex:3", &NO_FILTER)
            .expect("details");

        assert_eq!(details.len(), 2);
        assert!(details["contacts"].latest().is_some());
        let inconsistent: Vec<_> = details
            .values()
            .filter(|d| d.is_inconsistent())
            .collect();
        assert_eq!(inconsistent.len(), 1);
    }
}
