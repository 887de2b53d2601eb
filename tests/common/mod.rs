#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use zonesync::catalog::{ZoneCatalog, ZoneSet};
use zonesync::lease::{DhcpLease, StaticLeases};
use zonesync::record::{Node, Record};
use zonesync::store::{InMemoryStore, RecordStore, StoreFuture};
use zonesync::sync::Synchronizer;
use zonesync::zone::Zone;
use zonesync::{Config, DnsService, StoreError};

/// Sets up logging for a test, controlled by RUST_LOG.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .without_time()
        .try_init()
        .ok();
}

pub const FORWARD: &str = "example.com.";
pub const REVERSE: &str = "0.10.in-addr.arpa.";

/// The zones most tests run against.
pub fn zones() -> Vec<Zone> {
    vec![
        Zone::forward("example.com").with_default(true),
        Zone::forward("lab.example.com"),
        Zone::reverse("10.0.0.0/16".parse().unwrap()),
    ]
}

//------------ FlakyStore ----------------------------------------------------

/// An in-memory store that fails or stalls node writes on request.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: InMemoryStore,

    /// Writes to this zone fail as unavailable.
    failing_zone: Mutex<Option<String>>,

    /// The number of writes that succeed before all others fail.
    budget: Mutex<Option<usize>>,

    /// The number of upcoming writes that fail with a conflict.
    conflicts: AtomicUsize,

    /// A zone and the number of upcoming writes to it that conflict.
    zone_conflicts: Mutex<Option<(String, usize)>>,

    /// The time every write takes.
    delay: Mutex<Duration>,

    puts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(zones: impl IntoIterator<Item = Zone>) -> Self {
        FlakyStore {
            inner: InMemoryStore::with_zones(zones),
            ..Default::default()
        }
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    pub fn fail_writes_to(&self, zone: Option<&str>) {
        *self.failing_zone.lock().unwrap() = zone.map(Into::into);
    }

    pub fn fail_after(&self, writes: usize) {
        *self.budget.lock().unwrap() = Some(writes);
    }

    pub fn inject_conflicts(&self, count: usize) {
        self.conflicts.store(count, Ordering::SeqCst);
    }

    pub fn inject_conflicts_in(&self, zone: &str, count: usize) {
        *self.zone_conflicts.lock().unwrap() = Some((zone.into(), count));
    }

    pub fn delay_writes(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// The number of node writes attempted so far.
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn check_put(&self, zone: &str) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.failing_zone.lock().unwrap().as_deref() == Some(zone) {
            return Err(StoreError::Unavailable(format!("{zone} is down")));
        }
        if let Some(budget) = self.budget.lock().unwrap().as_mut() {
            if *budget == 0 {
                return Err(StoreError::Unavailable("out of writes".into()));
            }
            *budget -= 1;
        }
        if let Some((target, count)) = self.zone_conflicts.lock().unwrap().as_mut() {
            if target == zone && *count > 0 {
                *count -= 1;
                return Err(StoreError::Conflict);
            }
        }
        let conflict = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            })
            .is_ok();
        if conflict {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }
}

impl RecordStore for FlakyStore {
    fn list_zones(&self) -> StoreFuture<'_, Vec<Zone>> {
        self.inner.list_zones()
    }

    fn create_zone(&self, zone: Zone) -> StoreFuture<'_, Zone> {
        self.inner.create_zone(zone)
    }

    fn delete_zone<'a>(&'a self, zone: &'a str) -> StoreFuture<'a, ()> {
        self.inner.delete_zone(zone)
    }

    fn get_node<'a>(
        &'a self,
        zone: &'a str,
        name: &'a str,
    ) -> StoreFuture<'a, Node> {
        self.inner.get_node(zone, name)
    }

    fn put_node<'a>(
        &'a self,
        zone: &'a str,
        name: &'a str,
        records: BTreeSet<Record>,
        expected_version: Option<u64>,
    ) -> StoreFuture<'a, Option<Node>> {
        Box::pin(async move {
            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.check_put(zone)?;
            self.inner
                .put_node(zone, name, records, expected_version)
                .await
        })
    }

    fn delete_node<'a>(
        &'a self,
        zone: &'a str,
        name: &'a str,
    ) -> StoreFuture<'a, ()> {
        self.inner.delete_node(zone, name)
    }

    fn list_nodes<'a>(
        &'a self,
        zone: &'a str,
        query: Option<&'a str>,
    ) -> StoreFuture<'a, Vec<Node>> {
        self.inner.list_nodes(zone, query)
    }
}

//------------ Fixtures ------------------------------------------------------

pub fn synchronizer(store: Arc<FlakyStore>) -> Synchronizer {
    let catalog = ZoneCatalog::with_zones(ZoneSet::from_zones(zones()));
    Synchronizer::new(store, Arc::new(catalog))
}

pub fn lease(
    mac: &str,
    ip: &str,
    host: &str,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
) -> DhcpLease {
    DhcpLease::new(mac, ip.parse().unwrap(), Some(host), begin, Some(end))
}

pub async fn service(
    store: Arc<dyn RecordStore>,
    leases: impl IntoIterator<Item = DhcpLease>,
) -> DnsService {
    DnsService::open(store, Arc::new(StaticLeases::new(leases)), Config::new())
        .await
        .unwrap()
}

/// Returns the nodes of a page as `name@zone`.
pub fn node_keys(nodes: &[Node]) -> Vec<String> {
    nodes
        .iter()
        .map(|node| format!("{}@{}", node.name(), node.zone()))
        .collect()
}
