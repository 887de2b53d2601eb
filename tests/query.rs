mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{lease, node_keys, service, zones, FORWARD, REVERSE};
use zonesync::correlate::{AddMode, UnknownFilter};
use zonesync::lease::{DhcpLease, LeaseFuture, LeaseSource};
use zonesync::query::{PageRequest, Sort, SortKey};
use zonesync::record::{Record, RecordType};
use zonesync::store::InMemoryStore;
use zonesync::sync::Action;
use zonesync::{Config, DnsService, StoreError};

fn leases() -> Vec<DhcpLease> {
    let now = Utc::now();
    vec![
        lease(
            "aa-bb-cc-00-11-22",
            "10.0.1.5",
            "host",
            now - Duration::try_hours(1).unwrap(),
            now + Duration::try_hours(1).unwrap(),
        ),
        lease(
            "aa-bb-cc-00-11-33",
            "10.0.1.7",
            "old",
            now - Duration::try_hours(3).unwrap(),
            now - Duration::try_hours(2).unwrap(),
        ),
    ]
}

async fn populated() -> DnsService {
    common::init_logging();
    let service = service(Arc::new(InMemoryStore::with_zones(zones())), leases()).await;
    for (name, addr) in [("host", "10.0.1.5"), ("old", "10.0.1.7")] {
        let request = service.record_request(
            Action::Create,
            &format!("{name}.example.com"),
            RecordType::A,
            addr,
        );
        service.create_or_delete_record(&request).await.unwrap();
    }
    service
}

#[tokio::test]
async fn address_and_hostname_find_the_same_nodes() {
    let service = populated().await;
    let options = service.list_options();

    let by_addr = service.query("10.0.1.5", &options).await.unwrap();
    let by_name = service.query("HOST", &options).await.unwrap();
    let expected = [format!("5.1@{REVERSE}"), format!("host@{FORWARD}")];
    assert_eq!(node_keys(by_addr.items()), expected);
    assert_eq!(node_keys(by_name.items()), expected);
    assert_eq!(by_addr.total(), 2);
}

#[tokio::test]
async fn mac_queries_follow_leases() {
    let service = populated().await;
    let page = service
        .query("AA:BB:CC:00:11:22", &service.list_options())
        .await
        .unwrap();
    assert_eq!(node_keys(page.items()), [format!("host@{FORWARD}")]);

    // Expired leases are only used when asked for.
    let page = service
        .query("aabbcc001133", &service.list_options())
        .await
        .unwrap();
    assert!(page.items().is_empty());
    let page = service
        .query(
            "aabbcc001133",
            &service.list_options().with_add_mode(AddMode::All),
        )
        .await
        .unwrap();
    assert_eq!(node_keys(page.items()), [format!("old@{FORWARD}")]);
}

#[tokio::test]
async fn lease_attachment_modes() {
    let service = populated().await;
    let records = |mode| {
        let options = service.list_options().with_add_mode(mode);
        let service = &service;
        async move {
            let mut res = Vec::new();
            for node in ["host", "old"] {
                let page = service
                    .list_records("example.com", node, &options)
                    .await
                    .unwrap();
                res.push(page.into_items().remove(0));
            }
            res
        }
    };

    let none = records(AddMode::None).await;
    assert!(none.iter().all(|record| record.lease().is_none()));

    let active = records(AddMode::Active).await;
    assert_eq!(active[0].correlated_value(), Some("host"));
    assert!(active[1].lease().is_none());

    let all = records(AddMode::All).await;
    assert!(!all[0].lease().unwrap().is_expired());
    assert!(all[1].lease().unwrap().is_expired());
    assert_eq!(all[1].correlated_value(), Some("old"));
}

#[tokio::test]
async fn pages_reconstruct_the_listing() {
    let service = populated().await;
    for idx in 0..7 {
        let records = (0..idx % 3)
            .map(|count| Record::new(RecordType::Txt, &format!("note {count}")))
            .chain([Record::new(RecordType::Cname, "host.example.com")]);
        service
            .save_node("lab.example.com", &format!("n{idx}"), records)
            .await
            .unwrap();
    }

    let sort = Sort::descending(SortKey::RecordCount);
    let full = service
        .list_nodes(
            "lab.example.com",
            &service
                .list_options()
                .with_sort(sort)
                .with_page(PageRequest::first(100)),
        )
        .await
        .unwrap();
    assert_eq!(full.total(), 7);
    let counts: Vec<_> = full.items().iter().map(|node| node.len()).collect();
    assert_eq!(counts, [3, 3, 2, 2, 1, 1, 1]);
    assert_eq!(
        node_keys(&full.items()[..2]),
        ["n2@lab.example.com.", "n5@lab.example.com."]
    );

    let mut pieces = Vec::new();
    let mut request = PageRequest::first(3);
    loop {
        let page = service
            .list_nodes(
                "lab.example.com",
                &service.list_options().with_sort(sort).with_page(request),
            )
            .await
            .unwrap();
        assert_eq!(page.total_pages(), 3);
        pieces.extend(node_keys(page.items()));
        if page.is_last() {
            break;
        }
        request = request.next();
    }
    assert_eq!(pieces, node_keys(full.items()));

    let empty = service
        .list_nodes(
            "lab.example.com",
            &service.list_options().with_page(PageRequest::first(0)),
        )
        .await
        .unwrap();
    assert!(empty.items().is_empty());
    assert_eq!(empty.total(), 7);
}

#[tokio::test]
async fn unknown_records_filter_nodes() {
    let service = populated().await;
    service
        .save_node(
            "example.com",
            "legacy",
            [Record::new(RecordType::Unknown, "\\# 4 0a000109")],
        )
        .await
        .unwrap();

    let options = service
        .list_options()
        .with_unknown_filter(UnknownFilter::Unknown);
    let page = service.list_nodes("example.com", &options).await.unwrap();
    assert_eq!(node_keys(page.items()), [format!("legacy@{FORWARD}")]);

    let options = service
        .list_options()
        .with_unknown_filter(UnknownFilter::NoUnknown);
    let page = service.list_nodes("example.com", &options).await.unwrap();
    assert_eq!(
        node_keys(page.items()),
        [format!("host@{FORWARD}"), format!("old@{FORWARD}")]
    );
}

#[tokio::test]
async fn node_administration() {
    let service = populated().await;
    let report = service
        .delete_all_nodes("example.com", &["old".into(), "missing".into()])
        .await
        .unwrap();
    assert_eq!(report.changes().len(), 1);
    assert!(service.get_node("example.com", "old").await.is_err());

    // Administrative deletes do not mirror.
    assert!(service.get_node(REVERSE, "7.1").await.is_ok());

    let report = service.delete_all_nodes("example.com", &[]).await.unwrap();
    assert_eq!(report.changes().len(), 1);
    let zones = service.list_zones(None, &service.list_options());
    assert_eq!(zones.total(), 3);
}

#[tokio::test]
async fn lease_listing() {
    let service = populated().await;
    let active = service.list_leases(true, &service.list_options()).await;
    assert_eq!(active.total(), 1);
    assert_eq!(active.items()[0].ip().to_string(), "10.0.1.5");

    let all = service.list_leases(false, &service.list_options()).await;
    assert_eq!(all.total(), 2);

    let options = service.list_options().with_query("old");
    let found = service.list_leases(false, &options).await;
    assert_eq!(found.items()[0].hostname(), Some("old"));
}

#[tokio::test]
async fn mac_like_host_names_are_found_as_text() {
    let service = populated().await;
    let request = service.record_request(
        Action::Create,
        "db-01.example.com",
        RecordType::A,
        "10.0.1.9",
    );
    service.create_or_delete_record(&request).await.unwrap();

    let page = service
        .query("DB-01", &service.list_options())
        .await
        .unwrap();
    assert_eq!(
        node_keys(page.items()),
        [format!("9.1@{REVERSE}"), format!("db-01@{FORWARD}")]
    );
}

/// A lease source that always fails and counts its calls.
#[derive(Debug, Default)]
struct BrokenLeases {
    calls: AtomicUsize,
}

impl LeaseSource for BrokenLeases {
    fn list_leases(&self, _include_expired: bool) -> LeaseFuture<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(StoreError::Unavailable("dhcp is down".into())) })
    }
}

#[tokio::test]
async fn leases_are_only_loaded_when_attached() {
    common::init_logging();
    let leases = Arc::new(BrokenLeases::default());
    let service = DnsService::open(
        Arc::new(InMemoryStore::with_zones(zones())),
        leases.clone(),
        Config::new(),
    )
    .await
    .unwrap();
    let request = service.record_request(
        Action::Create,
        "host.example.com",
        RecordType::A,
        "10.0.1.5",
    );
    service.create_or_delete_record(&request).await.unwrap();

    let options = service.list_options().with_add_mode(AddMode::None);
    service.list_nodes("example.com", &options).await.unwrap();
    service
        .list_records("example.com", "host", &options)
        .await
        .unwrap();
    service.query("host", &options).await.unwrap();
    service.query("10.0.1.5", &options).await.unwrap();
    assert_eq!(leases.calls.load(Ordering::SeqCst), 0);

    // MAC queries always need leases.
    let page = service.query("aa-bb-cc-00-11-22", &options).await.unwrap();
    assert!(page.items().is_empty());
    assert_eq!(leases.calls.load(Ordering::SeqCst), 1);

    // A failing source degrades to no leases.
    let options = service.list_options().with_add_mode(AddMode::Active);
    let page = service.list_nodes("example.com", &options).await.unwrap();
    assert_eq!(page.total(), 1);
    assert_eq!(leases.calls.load(Ordering::SeqCst), 2);
}
