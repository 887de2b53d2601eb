mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{synchronizer, zones, FlakyStore, FORWARD, REVERSE};
use zonesync::record::{Record, RecordType};
use zonesync::retry::RetryPolicy;
use zonesync::store::RecordStore;
use zonesync::sync::{
    Deadline, RecordRequest, UpdateRequest, WriteState,
};
use zonesync::{Error, NotFound};

fn setup() -> (Arc<FlakyStore>, zonesync::sync::Synchronizer) {
    common::init_logging();
    let store = Arc::new(FlakyStore::new(zones()));
    let sync = synchronizer(store.clone());
    (store, sync)
}

fn create_host() -> RecordRequest {
    RecordRequest::create("host.example.com", RecordType::A, "10.0.1.5")
}

#[test]
fn mirrored_create_and_delete() {
    tokio_test::block_on(async {
        let (store, sync) = setup();

        let report = sync
            .apply_record(&create_host(), Deadline::none())
            .await
            .unwrap();
        assert_eq!(
            report.path(),
            [
                WriteState::Resolving,
                WriteState::ForwardApplied,
                WriteState::ReverseApplied,
                WriteState::Done
            ]
        );
        let primary = &report.changes().primary()[0];
        assert_eq!(primary.zone(), FORWARD);
        assert_eq!(primary.node(), "host");
        let mirror = &report.changes().mirror()[0];
        assert_eq!(mirror.zone(), REVERSE);
        assert_eq!(mirror.node(), "5.1");
        assert_eq!(mirror.record().value(), "host.example.com.");

        let ptr = store.get_node(REVERSE, "5.1").await.unwrap();
        assert!(ptr.contains(&Record::new(RecordType::Ptr, "host.example.com")));

        // Creating again changes nothing.
        let again = sync
            .apply_record(&create_host(), Deadline::none())
            .await
            .unwrap();
        assert!(again.is_noop());

        let report = sync
            .apply_record(
                &RecordRequest::delete("host.example.com", RecordType::A, "10.0.1.5"),
                Deadline::none(),
            )
            .await
            .unwrap();
        assert_eq!(report.changes().len(), 2);
        assert!(report.changes().iter().all(|change| !change.is_added()));
        assert_eq!(store.inner().node_count(FORWARD), 0);
        assert_eq!(store.inner().node_count(REVERSE), 0);
    });
}

#[test]
fn ptr_writes_mirror_forward() {
    tokio_test::block_on(async {
        let (store, sync) = setup();
        let report = sync
            .apply_record(
                &RecordRequest::create("10.0.2.9", RecordType::Ptr, "db.lab.example.com"),
                Deadline::none(),
            )
            .await
            .unwrap();
        assert_eq!(report.changes().primary()[0].node(), "9.2");
        let mirror = &report.changes().mirror()[0];
        assert_eq!(mirror.zone(), "lab.example.com.");
        assert_eq!(mirror.node(), "db");
        assert_eq!(mirror.record().value(), "10.0.2.9");
        assert!(store.get_node("lab.example.com.", "db").await.is_ok());
    });
}

#[test]
fn unmirrored_create_stays_single() {
    tokio_test::block_on(async {
        let (store, sync) = setup();
        let request = create_host().with_mirror_reverse(false);
        let report = sync.apply_record(&request, Deadline::none()).await.unwrap();
        assert_eq!(report.changes().len(), 1);
        assert_eq!(store.inner().node_count(REVERSE), 0);
    });
}

#[test]
fn missing_reverse_zone_rolls_back() {
    tokio_test::block_on(async {
        let (store, sync) = setup();
        let request =
            RecordRequest::create("host.example.com", RecordType::A, "192.168.1.5");
        match sync.apply_record(&request, Deadline::none()).await {
            Err(Error::MirrorUnavailable { cause, changes }) => {
                assert!(changes.is_empty());
                assert!(matches!(
                    *cause,
                    Error::NotFound(NotFound::ReverseZone(_))
                ));
            }
            res => panic!("unexpected result {res:?}"),
        }
        assert_eq!(store.inner().node_count(FORWARD), 0);
    });
}

#[test]
fn failed_rollback_reports_residue() {
    tokio_test::block_on(async {
        let (store, sync) = setup();
        // The primary write succeeds, the mirror and the rollback fail.
        store.fail_after(1);
        match sync.apply_record(&create_host(), Deadline::none()).await {
            Err(Error::MirrorUnavailable { changes, .. }) => {
                assert_eq!(changes.primary().len(), 1);
                assert!(changes.mirror().is_empty());
            }
            res => panic!("unexpected result {res:?}"),
        }
        assert_eq!(store.inner().node_count(FORWARD), 1);
    });
}

#[test]
fn mirror_delete_failure_is_partial_success() {
    tokio_test::block_on(async {
        let (store, sync) = setup();
        sync.apply_record(&create_host(), Deadline::none())
            .await
            .unwrap();

        store.fail_writes_to(Some(REVERSE));
        let request =
            RecordRequest::delete("host.example.com", RecordType::A, "10.0.1.5");
        match sync.apply_record(&request, Deadline::none()).await {
            Err(Error::MirrorDeleteFailed { cause, changes }) => {
                assert!(matches!(*cause, Error::Unavailable(_)));
                assert_eq!(changes.primary().len(), 1);
                assert!(changes.mirror().is_empty());
            }
            res => panic!("unexpected result {res:?}"),
        }
        assert_eq!(store.inner().node_count(FORWARD), 0);
        assert_eq!(store.inner().node_count(REVERSE), 1);
    });
}

#[test]
fn update_moves_both_sides() {
    tokio_test::block_on(async {
        let (store, sync) = setup();
        sync.apply_record(&create_host(), Deadline::none())
            .await
            .unwrap();

        let update =
            UpdateRequest::new("host.example.com", RecordType::A, "10.0.1.5", "10.0.1.6");
        let report = sync.apply_update(&update, Deadline::none()).await.unwrap();
        let changes = report.changes();
        assert_eq!(changes.primary().len(), 2);
        assert_eq!(changes.mirror().len(), 2);
        assert!(!changes.mirror()[0].is_added());
        assert_eq!(changes.mirror()[1].node(), "6.1");

        assert!(store.get_node(REVERSE, "5.1").await.is_err());
        let host = store.get_node(FORWARD, "host").await.unwrap();
        assert_eq!(host.len(), 1);
        assert!(host.contains(&Record::new(RecordType::A, "10.0.1.6")));
    });
}

#[test]
fn update_without_reverse_zone_is_incomplete() {
    tokio_test::block_on(async {
        let (store, sync) = setup();
        sync.apply_record(&create_host(), Deadline::none())
            .await
            .unwrap();

        let update = UpdateRequest::new(
            "host.example.com",
            RecordType::A,
            "10.0.1.5",
            "192.168.0.1",
        );
        match sync.apply_update(&update, Deadline::none()).await {
            Err(Error::UpdateIncomplete { cause, changes }) => {
                assert!(matches!(*cause, Error::MirrorUnavailable { .. }));
                assert_eq!(changes.len(), 2);
                assert!(changes.iter().all(|change| !change.is_added()));
            }
            res => panic!("unexpected result {res:?}"),
        }
        assert_eq!(store.inner().node_count(FORWARD), 0);
        assert_eq!(store.inner().node_count(REVERSE), 0);
    });
}

#[tokio::test(start_paused = true)]
async fn deadline_during_create_compensates() {
    let (store, sync) = setup();
    store.delay_writes(Duration::from_secs(10));

    let res = sync
        .apply_record(&create_host(), Deadline::after(Duration::from_secs(5)))
        .await;
    match res {
        Err(Error::Cancelled { changes }) => assert!(changes.is_empty()),
        res => panic!("unexpected result {res:?}"),
    }
    // The primary write and its rollback.
    assert_eq!(store.puts(), 2);
    assert_eq!(store.inner().node_count(FORWARD), 0);
    assert_eq!(store.inner().node_count(REVERSE), 0);
}

#[test]
fn conflicts_are_reported_and_retryable() {
    tokio_test::block_on(async {
        let (store, sync) = setup();
        store.inject_conflicts(1);
        let request = create_host();
        let err = sync
            .apply_record(&request, Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict));
        assert!(err.is_retryable());
        assert_eq!(store.inner().node_count(FORWARD), 0);

        store.inject_conflicts(1);
        let mut policy = RetryPolicy::new();
        policy.set_backoff(Duration::ZERO, Duration::ZERO);
        let (sync, request) = (&sync, &request);
        let report = policy
            .run(move || sync.apply_record(request, Deadline::none()))
            .await
            .unwrap();
        assert_eq!(report.changes().len(), 2);
    });
}

#[test]
fn mirror_conflict_rolls_back_and_retries() {
    tokio_test::block_on(async {
        let (store, sync) = setup();
        store.inject_conflicts_in(REVERSE, 1);
        let request = create_host();
        let err = sync
            .apply_record(&request, Deadline::none())
            .await
            .unwrap_err();
        match &err {
            Error::MirrorUnavailable { cause, changes } => {
                assert!(matches!(**cause, Error::Conflict));
                assert!(changes.is_empty());
            }
            err => panic!("unexpected error {err:?}"),
        }
        assert!(err.is_retryable());
        assert_eq!(store.inner().node_count(FORWARD), 0);

        store.inject_conflicts_in(REVERSE, 1);
        let mut policy = RetryPolicy::new();
        policy.set_backoff(Duration::ZERO, Duration::ZERO);
        let (sync, request) = (&sync, &request);
        let report = policy
            .run(move || sync.apply_record(request, Deadline::none()))
            .await
            .unwrap();
        assert_eq!(report.changes().len(), 2);
        assert_eq!(store.inner().node_count(REVERSE), 1);
    });
}

#[test]
fn ptr_delete_removes_forward_mirror() {
    tokio_test::block_on(async {
        let (store, sync) = setup();
        sync.apply_record(
            &RecordRequest::create("10.0.2.9", RecordType::Ptr, "db.lab.example.com"),
            Deadline::none(),
        )
        .await
        .unwrap();

        let report = sync
            .apply_record(
                &RecordRequest::delete("10.0.2.9", RecordType::Ptr, "db.lab.example.com"),
                Deadline::none(),
            )
            .await
            .unwrap();
        let changes = report.changes();
        assert_eq!(changes.primary()[0].node(), "9.2");
        let mirror = &changes.mirror()[0];
        assert!(!mirror.is_added());
        assert_eq!(mirror.zone(), "lab.example.com.");
        assert_eq!(mirror.node(), "db");
        assert_eq!(store.inner().node_count("lab.example.com."), 0);
        assert_eq!(store.inner().node_count(REVERSE), 0);
    });
}

#[test]
fn update_continues_after_failed_mirror_delete() {
    tokio_test::block_on(async {
        let (store, sync) = setup();
        sync.apply_record(&create_host(), Deadline::none())
            .await
            .unwrap();

        // Only the removal of the old PTR record conflicts.
        store.inject_conflicts_in(REVERSE, 1);
        let update =
            UpdateRequest::new("host.example.com", RecordType::A, "10.0.1.5", "10.0.1.6");
        match sync.apply_update(&update, Deadline::none()).await {
            Err(Error::MirrorDeleteFailed { cause, changes }) => {
                assert!(matches!(*cause, Error::Conflict));
                assert_eq!(changes.primary().len(), 2);
                assert!(!changes.primary()[0].is_added());
                assert!(changes.primary()[1].is_added());
                assert_eq!(changes.mirror().len(), 1);
                assert_eq!(changes.mirror()[0].node(), "6.1");
            }
            res => panic!("unexpected result {res:?}"),
        }

        let host = store.get_node(FORWARD, "host").await.unwrap();
        assert_eq!(host.len(), 1);
        assert!(host.contains(&Record::new(RecordType::A, "10.0.1.6")));
        assert!(store.get_node(REVERSE, "5.1").await.is_ok());
        assert!(store.get_node(REVERSE, "6.1").await.is_ok());
    });
}

#[test]
fn delete_named_nodes_skips_missing() {
    tokio_test::block_on(async {
        let (store, sync) = setup();
        for (name, addr) in [("host", "10.0.1.5"), ("web", "10.0.1.8")] {
            sync.apply_record(
                &RecordRequest::create(
                    &format!("{name}.example.com"),
                    RecordType::A,
                    addr,
                ),
                Deadline::none(),
            )
            .await
            .unwrap();
        }

        let report = sync
            .delete_all_nodes(
                FORWARD,
                &["host".into(), "missing".into()],
                Deadline::none(),
            )
            .await
            .unwrap();
        let changes = report.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.primary()[0].node(), "host");
        assert!(changes.mirror().is_empty());

        assert!(store.get_node(FORWARD, "host").await.is_err());
        assert!(store.get_node(FORWARD, "web").await.is_ok());
        assert_eq!(store.inner().node_count(REVERSE), 2);
    });
}
