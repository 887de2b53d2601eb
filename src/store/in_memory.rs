//! An in-memory record store.

use std::boxed::Box;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::ready;
use std::string::String;
use std::vec::Vec;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::trace;

use super::traits::{RecordStore, StoreFuture};
use crate::error::{NotFound, StoreError};
use crate::record::{Node, Record};
use crate::zone::Zone;

//------------ Constants -----------------------------------------------------

/// The TTL assigned to records stored without one.
const DEFAULT_TTL: u32 = 3600;

//------------ InMemoryStore -------------------------------------------------

/// A record store keeping all zones in memory.
///
/// All writes are serialized by a single lock. Node versions are drawn from
/// a store wide counter so that a node that is deleted and created again
/// never reuses an old version.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    zones: HashMap<String, ZoneData>,
    last_version: u64,
}

#[derive(Debug)]
struct ZoneData {
    zone: Zone,
    serial: u32,
    nodes: BTreeMap<String, Node>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a store holding the given, empty zones.
    pub fn with_zones(zones: impl IntoIterator<Item = Zone>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write();
            let now = Utc::now();
            for mut zone in zones {
                zone.touch(now);
                let _ = inner.zones.insert(
                    zone.name().into(),
                    ZoneData {
                        zone,
                        serial: 0,
                        nodes: BTreeMap::new(),
                    },
                );
            }
        }
        store
    }

    /// Returns the number of nodes in a zone.
    pub fn node_count(&self, zone: &str) -> usize {
        self.inner
            .read()
            .zones
            .get(zone)
            .map(|data| data.nodes.len())
            .unwrap_or(0)
    }

    fn create_zone_now(&self, mut zone: Zone) -> Result<Zone, StoreError> {
        let mut inner = self.inner.write();
        if inner.zones.contains_key(zone.name()) {
            return Err(StoreError::AlreadyExists(zone.name().into()));
        }
        zone.touch(Utc::now());
        trace!("Creating zone '{}'", zone.name());
        let _ = inner.zones.insert(
            zone.name().into(),
            ZoneData {
                zone: zone.clone(),
                serial: 0,
                nodes: BTreeMap::new(),
            },
        );
        Ok(zone)
    }

    fn delete_zone_now(&self, zone: &str) -> Result<(), StoreError> {
        match self.inner.write().zones.remove(zone) {
            Some(data) => {
                trace!(
                    "Deleted zone '{zone}' with {} nodes",
                    data.nodes.len()
                );
                Ok(())
            }
            None => Err(zone_not_found(zone)),
        }
    }

    fn get_node_now(&self, zone: &str, name: &str) -> Result<Node, StoreError> {
        let inner = self.inner.read();
        let data = inner.zones.get(zone).ok_or_else(|| zone_not_found(zone))?;
        data.nodes.get(name).cloned().ok_or_else(|| {
            StoreError::NotFound(NotFound::Node {
                zone: zone.into(),
                node: name.into(),
            })
        })
    }

    fn put_node_now(
        &self,
        zone: &str,
        name: &str,
        records: BTreeSet<Record>,
        expected_version: Option<u64>,
    ) -> Result<Option<Node>, StoreError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let data = inner
            .zones
            .get_mut(zone)
            .ok_or_else(|| zone_not_found(zone))?;

        let current = data.nodes.get(name);
        let current_version = current.map(Node::version).unwrap_or(0);
        if let Some(expected) = expected_version {
            if expected != current_version {
                trace!(
                    "Version mismatch for '{name}' in '{zone}': \
                     expected {expected}, found {current_version}"
                );
                return Err(StoreError::Conflict);
            }
        }

        if records.is_empty() && current.is_none() {
            return Ok(None);
        }

        let now = Utc::now();
        data.serial = data.serial.wrapping_add(1);
        data.zone.touch(now);

        if records.is_empty() {
            let _ = data.nodes.remove(name);
            trace!("Removed node '{name}' from '{zone}'");
            return Ok(None);
        }

        inner.last_version += 1;
        let version = inner.last_version;
        let serial = data.serial;
        let records: BTreeSet<Record> = records
            .into_iter()
            .map(|mut record| {
                match current.and_then(|node| node.records().get(&record)) {
                    Some(existing) => existing.clone(),
                    None => {
                        record.annotate(None, None);
                        record.set_store_fields(
                            DEFAULT_TTL,
                            serial,
                            version,
                            now,
                        );
                        record
                    }
                }
            })
            .collect();

        let mut node = Node::with_records(data.zone.name(), name, records);
        node.set_version(version);
        trace!(
            "Stored node '{name}' in '{zone}' with {} records at version \
             {version}",
            node.len()
        );
        let _ = data.nodes.insert(name.into(), node.clone());
        Ok(Some(node))
    }

    fn delete_node_now(&self, zone: &str, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let data = inner
            .zones
            .get_mut(zone)
            .ok_or_else(|| zone_not_found(zone))?;
        match data.nodes.remove(name) {
            Some(_) => {
                data.serial = data.serial.wrapping_add(1);
                data.zone.touch(Utc::now());
                Ok(())
            }
            None => Err(StoreError::NotFound(NotFound::Node {
                zone: zone.into(),
                node: name.into(),
            })),
        }
    }

    fn list_nodes_now(
        &self,
        zone: &str,
        query: Option<&str>,
    ) -> Result<Vec<Node>, StoreError> {
        let inner = self.inner.read();
        let data = inner.zones.get(zone).ok_or_else(|| zone_not_found(zone))?;
        Ok(data
            .nodes
            .values()
            .filter(|node| query.map(|q| node.matches_text(q)).unwrap_or(true))
            .cloned()
            .collect())
    }
}

fn zone_not_found(zone: &str) -> StoreError {
    StoreError::NotFound(NotFound::Zone(zone.into()))
}

//--- impl RecordStore

impl RecordStore for InMemoryStore {
    fn list_zones(&self) -> StoreFuture<'_, Vec<Zone>> {
        let mut zones: Vec<Zone> = self
            .inner
            .read()
            .zones
            .values()
            .map(|data| data.zone.clone())
            .collect();
        zones.sort_by(|left, right| left.name().cmp(right.name()));
        Box::pin(ready(Ok(zones)))
    }

    fn create_zone(&self, zone: Zone) -> StoreFuture<'_, Zone> {
        Box::pin(ready(self.create_zone_now(zone)))
    }

    fn delete_zone<'a>(&'a self, zone: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(ready(self.delete_zone_now(zone)))
    }

    fn get_node<'a>(
        &'a self,
        zone: &'a str,
        name: &'a str,
    ) -> StoreFuture<'a, Node> {
        Box::pin(ready(self.get_node_now(zone, name)))
    }

    fn put_node<'a>(
        &'a self,
        zone: &'a str,
        name: &'a str,
        records: BTreeSet<Record>,
        expected_version: Option<u64>,
    ) -> StoreFuture<'a, Option<Node>> {
        Box::pin(ready(self.put_node_now(
            zone,
            name,
            records,
            expected_version,
        )))
    }

    fn delete_node<'a>(
        &'a self,
        zone: &'a str,
        name: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(ready(self.delete_node_now(zone, name)))
    }

    fn list_nodes<'a>(
        &'a self,
        zone: &'a str,
        query: Option<&'a str>,
    ) -> StoreFuture<'a, Vec<Node>> {
        Box::pin(ready(self.list_nodes_now(zone, query)))
    }
}

//============ Testing =======================================================
