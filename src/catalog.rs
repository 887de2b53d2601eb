//! The set of known zones.
//!
//! The [`ZoneCatalog`] answers which zone owns a name or an address. It
//! keeps an immutable [`ZoneSet`] snapshot that readers load without
//! locking. Changes build a modified copy of the current snapshot and swap
//! it in atomically; writers are serialized so that no change is lost.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::string::String;
use std::sync::Arc;
use std::vec::Vec;

use arc_swap::ArcSwap;
use tracing::{debug, trace, warn};

use crate::codec;
use crate::error::Error;
use crate::name;
use crate::store::RecordStore;
use crate::zone::{Zone, ZoneKind};

//------------ ZoneSet -------------------------------------------------------

/// An immutable snapshot of the known zones.
#[derive(Clone, Debug, Default)]
pub struct ZoneSet {
    /// All zones by canonical name.
    zones: BTreeMap<String, Zone>,

    /// The forward zones arranged by their labels from the root down.
    forward: ZoneSetNode,

    /// The reverse zones, most specific network first.
    reverse: Vec<Zone>,
}

impl ZoneSet {
    pub fn new() -> Self {
        Default::default()
    }

    /// Builds a zone set from a list of zones as delivered by a store.
    ///
    /// Inconsistencies such as overlapping reverse networks are logged but
    /// do not prevent loading. Later duplicates replace earlier ones.
    pub fn from_zones(zones: impl IntoIterator<Item = Zone>) -> Self {
        let mut set = Self::new();
        for zone in zones {
            if let Err(err) = set.check_new_zone(&zone) {
                warn!("Inconsistent zone data for '{}': {err}", zone.name());
            }
            set.insert_zone(zone);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Returns a zone by name.
    pub fn get_zone(&self, name: &str) -> Option<&Zone> {
        self.zones.get(&name::normalize_fqdn(name))
    }

    /// Returns all zones ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// Returns the default zone of the given kind.
    pub fn default_zone(&self, kind: ZoneKind) -> Option<&Zone> {
        self.iter()
            .find(|zone| zone.kind() == kind && zone.is_default())
    }

    /// Returns the forward zone with the longest suffix match for a name.
    pub fn find_forward_zone(&self, fqdn: &str) -> Option<&Zone> {
        let fqdn = name::normalize_fqdn(fqdn);
        let apex = self.forward.find_zone(name::labels_from_root(&fqdn))?;
        self.zones.get(apex)
    }

    /// Returns the most specific reverse zone covering an address.
    pub fn find_reverse_zone(&self, addr: IpAddr) -> Option<&Zone> {
        let mut matching =
            self.reverse.iter().filter(|zone| zone.contains_addr(addr));
        let best = matching.next()?;
        if let Some(other) = matching.next() {
            warn!(
                "Address {addr} is covered by overlapping reverse zones \
                 '{}' and '{}', using the former",
                best.name(),
                other.name()
            );
        }
        Some(best)
    }

    /// Checks whether a zone could be added to the set.
    ///
    /// Fails with [`Error::PreconditionFailed`] if a zone of the same name
    /// exists, if a reverse zone would overlap an existing one, or if a
    /// default zone of the same kind already exists.
    pub fn check_new_zone(&self, zone: &Zone) -> Result<(), Error> {
        if self.zones.contains_key(zone.name()) {
            return Err(Error::PreconditionFailed(format!(
                "zone '{}' already exists",
                zone.name()
            )));
        }
        if zone.is_reverse() {
            if zone.network().is_none() {
                return Err(Error::PreconditionFailed(format!(
                    "reverse zone '{}' has no network",
                    zone.name()
                )));
            }
            if let Some(other) =
                self.reverse.iter().find(|other| other.overlaps(zone))
            {
                return Err(Error::PreconditionFailed(format!(
                    "reverse zone '{zone}' overlaps '{other}'"
                )));
            }
        }
        if zone.is_default() {
            if let Some(other) = self.default_zone(zone.kind()) {
                return Err(Error::PreconditionFailed(format!(
                    "'{}' already is the default {} zone",
                    other.name(),
                    zone.kind()
                )));
            }
        }
        Ok(())
    }

    fn insert_zone(&mut self, zone: Zone) {
        let _ = self.remove_zone(zone.name());
        match zone.kind() {
            ZoneKind::Forward => {
                self.forward
                    .insert_zone(name::labels_from_root(zone.name()), zone.name());
            }
            ZoneKind::Reverse => {
                self.reverse.push(zone.clone());
                // Stable, so zones of equal prefix length keep their order.
                self.reverse.sort_by_key(|zone| {
                    std::cmp::Reverse(zone.prefix_len().unwrap_or(0))
                });
            }
        }
        let _ = self.zones.insert(zone.name().into(), zone);
    }

    fn remove_zone(&mut self, name: &str) -> Option<Zone> {
        let zone = self.zones.remove(name)?;
        match zone.kind() {
            ZoneKind::Forward => {
                self.forward.remove_zone(name::labels_from_root(name));
            }
            ZoneKind::Reverse => {
                self.reverse.retain(|item| item.name() != name);
            }
        }
        Some(zone)
    }
}

//------------ ZoneSetNode ---------------------------------------------------

/// A node in the label tree of forward zones.
#[derive(Clone, Debug, Default)]
struct ZoneSetNode {
    /// The apex name of the zone at this node, if any.
    zone: Option<String>,
    children: HashMap<String, ZoneSetNode>,
}

impl ZoneSetNode {
    fn find_zone<'l>(
        &self,
        mut labels: impl Iterator<Item = &'l str>,
    ) -> Option<&str> {
        if let Some(label) = labels.next() {
            if let Some(node) = self.children.get(label) {
                if let Some(zone) = node.find_zone(labels) {
                    return Some(zone);
                }
            }
        }
        self.zone.as_deref()
    }

    fn insert_zone<'l>(
        &mut self,
        mut labels: impl Iterator<Item = &'l str>,
        apex: &str,
    ) {
        match labels.next() {
            Some(label) => self
                .children
                .entry(label.into())
                .or_default()
                .insert_zone(labels, apex),
            None => self.zone = Some(apex.into()),
        }
    }

    /// Removes the zone and prunes nodes left without content.
    ///
    /// Returns whether this node itself has become empty.
    fn remove_zone<'l>(
        &mut self,
        mut labels: impl Iterator<Item = &'l str>,
    ) -> bool {
        match labels.next() {
            Some(label) => {
                let prune = match self.children.get_mut(label) {
                    Some(child) => child.remove_zone(labels),
                    None => false,
                };
                if prune {
                    let _ = self.children.remove(label);
                }
            }
            None => self.zone = None,
        }
        self.zone.is_none() && self.children.is_empty()
    }
}

//------------ ZoneCatalog ---------------------------------------------------

/// The shared, read-mostly catalog of zones.
#[derive(Debug)]
pub struct ZoneCatalog {
    zones: ArcSwap<ZoneSet>,

    /// Serializes writers of `zones`.
    write_lock: tokio::sync::Mutex<()>,
}

impl Default for ZoneCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::with_zones(ZoneSet::new())
    }

    /// Creates a catalog from an existing zone set.
    pub fn with_zones(zones: ZoneSet) -> Self {
        ZoneCatalog {
            zones: ArcSwap::from_pointee(zones),
            write_lock: Default::default(),
        }
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Arc<ZoneSet> {
        self.zones.load_full()
    }

    /// Finds the forward zone owning a fully qualified name.
    ///
    /// Returns the zone and the node name of `fqdn` within it. Fails with
    /// [`Error::NotFound`] if no forward zone is a suffix of the name.
    pub fn resolve_forward_zone(
        &self,
        fqdn: &str,
    ) -> Result<(Zone, String), Error> {
        let zones = self.zones.load();
        let zone = zones
            .find_forward_zone(fqdn)
            .ok_or_else(|| Error::zone_not_found(name::normalize_fqdn(fqdn)))?;
        let local = codec::fqdn_to_local_label(fqdn, zone.name())?;
        trace!("Resolved '{fqdn}' to '{local}' in '{}'", zone.name());
        Ok((zone.clone(), local))
    }

    /// Finds the reverse zone covering an address.
    ///
    /// Returns the zone and the node name of `addr` within it. If several
    /// zones cover the address, the one with the longest prefix wins.
    pub fn resolve_reverse_zone(
        &self,
        addr: IpAddr,
    ) -> Result<(Zone, String), Error> {
        let zones = self.zones.load();
        let zone = zones
            .find_reverse_zone(addr)
            .ok_or_else(|| Error::no_reverse_zone(addr))?;
        let local =
            codec::address_to_reverse_label(addr, zone.prefix_len().unwrap_or(0));
        trace!("Resolved {addr} to '{local}' in '{}'", zone.name());
        Ok((zone.clone(), local))
    }

    /// Returns the zones, optionally only those of one kind, ordered by name.
    pub fn list_zones(&self, kind: Option<ZoneKind>) -> Vec<Zone> {
        self.zones
            .load()
            .iter()
            .filter(|zone| kind.map(|kind| zone.kind() == kind).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// Returns a zone by name.
    pub fn get_zone(&self, name: &str) -> Option<Zone> {
        self.zones.load().get_zone(name).cloned()
    }

    /// Returns the default zone of the given kind.
    pub fn default_zone(&self, kind: ZoneKind) -> Option<Zone> {
        self.zones.load().default_zone(kind).cloned()
    }

    /// Checks whether a zone could be added to the catalog.
    pub fn validate_new_zone(&self, zone: &Zone) -> Result<(), Error> {
        self.zones.load().check_new_zone(zone)
    }

    /// Reloads the catalog from a record store.
    ///
    /// Returns the number of zones loaded.
    pub async fn refresh(&self, store: &dyn RecordStore) -> Result<usize, Error> {
        let _guard = self.write_lock.lock().await;
        let zones = store.list_zones().await?;
        let set = ZoneSet::from_zones(zones);
        let count = set.len();
        self.zones.store(Arc::new(set));
        debug!("Zone catalog refreshed with {count} zones");
        Ok(count)
    }

    /// Adds a zone after checking it against the current zones.
    pub async fn insert(&self, zone: Zone) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        let mut new_zones = ZoneSet::clone(&self.zones.load());
        new_zones.check_new_zone(&zone)?;
        trace!("Adding zone '{}' to the catalog", zone.name());
        new_zones.insert_zone(zone);
        self.zones.store(Arc::new(new_zones));
        Ok(())
    }

    /// Adds a zone, replacing any zone of the same name, without checks.
    pub async fn replace(&self, zone: Zone) {
        let _guard = self.write_lock.lock().await;
        let mut new_zones = ZoneSet::clone(&self.zones.load());
        new_zones.insert_zone(zone);
        self.zones.store(Arc::new(new_zones));
    }

    /// Removes a zone and returns it.
    pub async fn remove(&self, name: &str) -> Option<Zone> {
        let _guard = self.write_lock.lock().await;
        let mut new_zones = ZoneSet::clone(&self.zones.load());
        let zone = new_zones.remove_zone(&name::normalize_fqdn(name))?;
        trace!("Removed zone '{}' from the catalog", zone.name());
        self.zones.store(Arc::new(new_zones));
        Some(zone)
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::NotFound;

    fn catalog() -> ZoneCatalog {
        ZoneCatalog::with_zones(ZoneSet::from_zones([
            Zone::forward("example.com").with_default(true),
            Zone::forward("lab.example.com"),
            Zone::forward("example.net"),
            Zone::reverse("10.0.0.0/16".parse().unwrap()),
            Zone::reverse("192.168.1.0/26".parse().unwrap()),
            Zone::reverse("2001:db8::/32".parse().unwrap()),
        ]))
    }

    #[test]
    fn longest_suffix_wins() {
        let catalog = catalog();
        let (zone, local) =
            catalog.resolve_forward_zone("ws01.lab.example.com").unwrap();
        assert_eq!(zone.name(), "lab.example.com.");
        assert_eq!(local, "ws01");

        let (zone, local) =
            catalog.resolve_forward_zone("Host.Example.COM.").unwrap();
        assert_eq!(zone.name(), "example.com.");
        assert_eq!(local, "host");

        let (zone, local) = catalog.resolve_forward_zone("a.b.example.com").unwrap();
        assert_eq!(zone.name(), "example.com.");
        assert_eq!(local, "a.b");

        let (_, local) = catalog.resolve_forward_zone("example.net").unwrap();
        assert_eq!(local, "@");
    }

    #[test]
    fn unknown_suffix_is_not_found() {
        assert!(matches!(
            catalog().resolve_forward_zone("host.example.org"),
            Err(Error::NotFound(NotFound::Zone(_)))
        ));
        // Only full labels match.
        assert!(catalog().resolve_forward_zone("host.myexample.com").is_err());
    }

    #[test]
    fn reverse_resolution() {
        let catalog = catalog();
        let (zone, local) = catalog
            .resolve_reverse_zone("10.0.1.5".parse().unwrap())
            .unwrap();
        assert_eq!(zone.name(), "0.10.in-addr.arpa.");
        assert_eq!(local, "5.1");

        let (zone, local) = catalog
            .resolve_reverse_zone("192.168.1.17".parse().unwrap())
            .unwrap();
        assert_eq!(zone.name(), "0-63.1.168.192.in-addr.arpa.");
        assert_eq!(local, "17");

        let (zone, local) = catalog
            .resolve_reverse_zone("2001:db8::1".parse().unwrap())
            .unwrap();
        assert_eq!(zone.name(), "8.b.d.0.1.0.0.2.ip6.arpa.");
        assert_eq!(local.split('.').count(), 24);

        assert!(matches!(
            catalog.resolve_reverse_zone("192.168.1.65".parse().unwrap()),
            Err(Error::NotFound(NotFound::ReverseZone(_)))
        ));
    }

    #[test]
    fn most_specific_reverse_zone_wins() {
        // Overlaps are a data error but must resolve deterministically.
        let set = ZoneSet::from_zones([
            Zone::reverse("10.0.0.0/8".parse().unwrap()),
            Zone::reverse("10.0.1.0/24".parse().unwrap()),
            Zone::reverse("10.0.0.0/16".parse().unwrap()),
        ]);
        let zone = set.find_reverse_zone("10.0.1.5".parse().unwrap()).unwrap();
        assert_eq!(zone.prefix_len(), Some(24));
        let zone = set.find_reverse_zone("10.0.2.5".parse().unwrap()).unwrap();
        assert_eq!(zone.prefix_len(), Some(16));
    }

    #[test]
    fn listing_is_ordered() {
        let catalog = catalog();
        let names: Vec<_> = catalog
            .list_zones(Some(ZoneKind::Forward))
            .into_iter()
            .map(|zone| zone.name().to_string())
            .collect();
        assert_eq!(names, ["example.com.", "example.net.", "lab.example.com."]);
        assert_eq!(catalog.list_zones(Some(ZoneKind::Reverse)).len(), 3);
        assert_eq!(catalog.list_zones(None).len(), 6);
        assert_eq!(
            catalog.default_zone(ZoneKind::Forward).unwrap().name(),
            "example.com."
        );
        assert!(catalog.default_zone(ZoneKind::Reverse).is_none());
    }

    #[tokio::test]
    async fn copy_on_write_changes() {
        let catalog = catalog();
        let before = catalog.snapshot();

        assert!(matches!(
            catalog.insert(Zone::forward("EXAMPLE.com")).await,
            Err(Error::PreconditionFailed(_))
        ));
        assert!(matches!(
            catalog
                .insert(Zone::reverse("10.0.5.0/24".parse().unwrap()))
                .await,
            Err(Error::PreconditionFailed(_))
        ));
        assert!(matches!(
            catalog
                .insert(Zone::forward("example.org").with_default(true))
                .await,
            Err(Error::PreconditionFailed(_))
        ));

        catalog
            .insert(Zone::reverse("10.1.0.0/16".parse().unwrap()))
            .await
            .unwrap();
        assert!(catalog
            .resolve_reverse_zone("10.1.2.3".parse().unwrap())
            .is_ok());

        // Removing the inner zone falls back to the enclosing one.
        assert!(catalog.remove("lab.example.com").await.is_some());
        let (zone, local) =
            catalog.resolve_forward_zone("ws01.lab.example.com").unwrap();
        assert_eq!(zone.name(), "example.com.");
        assert_eq!(local, "ws01.lab");
        assert!(catalog.remove("lab.example.com").await.is_none());

        // Earlier snapshots are unaffected.
        assert_eq!(before.len(), 6);
        assert!(before.get_zone("lab.example.com").is_some());
    }
}
