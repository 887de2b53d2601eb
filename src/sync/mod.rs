//! The synchronization engine.
//!
//! A [`Synchronizer`] applies record writes to a [`RecordStore`] and keeps
//! address records in forward zones and PTR records in reverse zones in
//! step with each other.
//!
//! # Record writes
//!
//! A write passes through the states of [`WriteState`]. It first resolves
//! the primary target: the reverse node for a PTR record, the forward node
//! for all other types. Resolution failures are returned before anything is
//! written. The primary record is then created or deleted. If mirroring was
//! requested and the type has a mirror, the counterpart is written next.
//!
//! When the mirror cannot be written the outcome depends on the action. A
//! failed mirror create rolls back the primary create and reports
//! [`Error::MirrorUnavailable`]. A failed mirror delete leaves the primary
//! deletion in place and reports [`Error::MirrorDeleteFailed`].
//!
//! # Cancellation
//!
//! Every mutating operation takes a [`Deadline`]. It is checked before the
//! primary write and again before the mirror write. If it expires after a
//! primary create, the create is rolled back before [`Error::Cancelled`] is
//! returned. The rollback itself is not subject to the deadline. Callers
//! must not drop the returned future while it is compensating, or the
//! primary record may be left without its mirror.

mod deadline;
mod report;

pub use self::deadline::Deadline;
pub use self::report::{
    Action, ChangeKind, ChangeSet, RecordChange, WriteReport, WriteState,
};

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::string::{String, ToString};
use std::sync::Arc;
use std::vec::Vec;

use tracing::{debug, trace, warn};

use crate::catalog::ZoneCatalog;
use crate::codec;
use crate::error::{Error, NotFound, StoreError};
use crate::name::{self, APEX};
use crate::record::{Mirror, Node, Record, RecordType};
use crate::store::RecordStore;
use crate::zone::{Zone, ZoneKind};

//------------ Constants -----------------------------------------------------

/// How often a compensating write is attempted.
///
/// Each attempt re-reads the node, so only conflicts are worth repeating.
const COMPENSATION_ATTEMPTS: usize = 3;

//------------ RecordRequest -------------------------------------------------

/// A request to create or delete a single record.
///
/// The name is interpreted relative to the zone if one is given. Without a
/// zone, multi-label names are resolved to the forward zone with the
/// longest matching suffix and single labels go to the default forward
/// zone. For PTR records the name is the owner address, either as an
/// address literal, as a full reverse name, or as a node name of the given
/// reverse zone, and the data is the target host name.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordRequest {
    #[cfg_attr(feature = "serde", serde(default))]
    zone: Option<String>,
    name: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    rtype: RecordType,
    data: String,
    action: Action,
    #[cfg_attr(feature = "serde", serde(default = "default_mirror_reverse"))]
    mirror_reverse: bool,
}

#[cfg(feature = "serde")]
fn default_mirror_reverse() -> bool {
    true
}

impl RecordRequest {
    pub fn new(action: Action, name: &str, rtype: RecordType, data: &str) -> Self {
        RecordRequest {
            zone: None,
            name: name.into(),
            rtype,
            data: data.into(),
            action,
            mirror_reverse: true,
        }
    }

    pub fn create(name: &str, rtype: RecordType, data: &str) -> Self {
        Self::new(Action::Create, name, rtype, data)
    }

    pub fn delete(name: &str, rtype: RecordType, data: &str) -> Self {
        Self::new(Action::Delete, name, rtype, data)
    }

    /// Places the record in the given zone.
    pub fn in_zone(mut self, zone: &str) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Sets whether the mirror record is written, too. Defaults to `true`.
    pub fn with_mirror_reverse(mut self, mirror: bool) -> Self {
        self.mirror_reverse = mirror;
        self
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rtype(&self) -> RecordType {
        self.rtype
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn mirror_reverse(&self) -> bool {
        self.mirror_reverse
    }
}

//------------ UpdateRequest -------------------------------------------------

/// A request to replace the value of a record.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpdateRequest {
    #[cfg_attr(feature = "serde", serde(default))]
    zone: Option<String>,
    name: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    rtype: RecordType,
    old_data: String,
    new_data: String,
}

impl UpdateRequest {
    pub fn new(
        name: &str,
        rtype: RecordType,
        old_data: &str,
        new_data: &str,
    ) -> Self {
        UpdateRequest {
            zone: None,
            name: name.into(),
            rtype,
            old_data: old_data.into(),
            new_data: new_data.into(),
        }
    }

    pub fn in_zone(mut self, zone: &str) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn old_data(&self) -> &str {
        &self.old_data
    }

    pub fn new_data(&self) -> &str {
        &self.new_data
    }

    fn step(&self, action: Action, data: &str) -> RecordRequest {
        let request = RecordRequest::new(action, &self.name, self.rtype, data);
        match self.zone.as_deref() {
            Some(zone) => request.in_zone(zone),
            None => request,
        }
    }
}

//------------ Target --------------------------------------------------------

/// A resolved record write.
#[derive(Clone, Debug)]
struct Target {
    zone: Zone,
    node: String,
    record: Record,
}

impl Target {
    fn zone_name(&self) -> &str {
        self.zone.name()
    }

    fn fqdn(&self) -> String {
        codec::local_label_to_fqdn(&self.node, self.zone.name())
    }
}

//------------ Synchronizer --------------------------------------------------

/// Applies writes to a record store, keeping mirrored records in step.
#[derive(Clone, Debug)]
pub struct Synchronizer {
    store: Arc<dyn RecordStore>,
    catalog: Arc<ZoneCatalog>,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn RecordStore>, catalog: Arc<ZoneCatalog>) -> Self {
        Synchronizer { store, catalog }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<ZoneCatalog> {
        &self.catalog
    }
}

/// # Record writes
///
impl Synchronizer {
    /// Creates or deletes a record and, if requested, its mirror.
    ///
    /// On success the report lists every record that was changed. Creating
    /// a record that already exists changes nothing and succeeds.
    pub async fn apply_record(
        &self,
        request: &RecordRequest,
        deadline: Deadline,
    ) -> Result<WriteReport, Error> {
        let action = request.action();
        let mut report = WriteReport::new();

        let primary = self.resolve_primary(request)?;
        trace!(
            "Resolved {action} of {} to '{}' in '{}'",
            primary.record,
            primary.node,
            primary.zone_name()
        );
        deadline.check(report.changes())?;

        match self
            .write_record(primary.zone_name(), &primary.node, &primary.record, action)
            .await
        {
            Ok(Some(change)) => report.changes_mut().push_primary(change),
            Ok(None) => {
                debug!(
                    "{action} of {} at {} changed nothing",
                    primary.record,
                    primary.fqdn()
                );
            }
            Err(err) => {
                report.enter(WriteState::ForwardFailed);
                debug!(
                    "{action} of {} at {} failed: {err}",
                    primary.record,
                    primary.fqdn()
                );
                return Err(err);
            }
        }
        report.enter(WriteState::ForwardApplied);

        let mirrored = primary
            .record
            .rtype()
            .map(|rtype| rtype.mirror() != Mirror::None)
            .unwrap_or(false);
        if !request.mirror_reverse() || !mirrored {
            report.enter(WriteState::Done);
            return Ok(report);
        }

        if deadline.is_expired() {
            let changes = match action {
                Action::Create => self.compensate(report.changes()).await,
                Action::Delete => report.into_changes(),
            };
            debug!("{action} cancelled before mirroring, left {changes}");
            return Err(Error::Cancelled { changes });
        }

        let mirror_res = match self.resolve_mirror(&primary) {
            Ok(mirror) => self.write_mirror(&mirror, action).await,
            Err(err) => Err(err),
        };
        match mirror_res {
            Ok(change) => {
                if let Some(change) = change {
                    report.changes_mut().push_mirror(change);
                }
                report.enter(WriteState::ReverseApplied);
                report.enter(WriteState::Done);
                debug!("{action} done: {}", report.changes());
                Ok(report)
            }
            Err(err) => {
                report.enter(WriteState::ReverseFailed);
                match action {
                    Action::Create => {
                        let changes = self.compensate(report.changes()).await;
                        if changes.is_empty() {
                            warn!(
                                "Mirror of {} at {} unavailable, rolled back: \
                                 {err}",
                                primary.record,
                                primary.fqdn()
                            );
                        } else {
                            report.enter(WriteState::Failed);
                            warn!(
                                "Mirror of {} at {} unavailable and rollback \
                                 incomplete, {changes} remain: {err}",
                                primary.record,
                                primary.fqdn()
                            );
                        }
                        Err(Error::MirrorUnavailable {
                            cause: Box::new(err),
                            changes,
                        })
                    }
                    Action::Delete => {
                        warn!(
                            "Deleted {} at {} but not its mirror: {err}",
                            primary.record,
                            primary.fqdn()
                        );
                        Err(Error::MirrorDeleteFailed {
                            cause: Box::new(err),
                            changes: report.into_changes(),
                        })
                    }
                }
            }
        }
    }

    /// Replaces the value of a record by deleting the old and creating the
    /// new one, both with mirroring.
    ///
    /// If the create fails after the delete succeeded, the old record is
    /// not restored and [`Error::UpdateIncomplete`] lists what was changed.
    /// If only the mirror of the old record could not be deleted, the
    /// create still happens and the result is
    /// [`Error::MirrorDeleteFailed`] listing all changes.
    pub async fn apply_update(
        &self,
        request: &UpdateRequest,
        deadline: Deadline,
    ) -> Result<WriteReport, Error> {
        let delete = request.step(Action::Delete, request.old_data());
        let create = request.step(Action::Create, request.new_data());

        let (mut report, mirror_err) =
            match self.apply_record(&delete, deadline).await {
                Ok(report) => (report, None),
                Err(Error::MirrorDeleteFailed { cause, changes }) => {
                    let mut report = WriteReport::new();
                    report.changes_mut().extend(changes);
                    report.enter(WriteState::ReverseFailed);
                    (report, Some(cause))
                }
                Err(err) => return Err(err),
            };

        match self.apply_record(&create, deadline).await {
            Ok(created) => {
                report.merge(created);
                match mirror_err {
                    Some(cause) => Err(Error::MirrorDeleteFailed {
                        cause,
                        changes: report.into_changes(),
                    }),
                    None => Ok(report),
                }
            }
            Err(err) => {
                let mut changes = report.into_changes();
                if let Some(residue) = err.changes() {
                    changes.extend(residue.clone());
                }
                warn!(
                    "Update of '{}' incomplete, {changes} applied: {err}",
                    request.name
                );
                match err {
                    Error::Cancelled { .. } => Err(Error::Cancelled { changes }),
                    err => Err(Error::UpdateIncomplete {
                        cause: Box::new(err),
                        changes,
                    }),
                }
            }
        }
    }

    /// Resolves the primary target of a request.
    fn resolve_primary(&self, request: &RecordRequest) -> Result<Target, Error> {
        let rtype = request.rtype();
        let record = make_record(rtype, request.data())?;
        if rtype == RecordType::Ptr {
            return self.resolve_ptr_target(request, record);
        }

        let (zone, node) = match request.zone() {
            Some(zone_name) => {
                let zone = self.zone(zone_name)?;
                if rtype.is_address() && zone.is_reverse() {
                    return Err(Error::InvalidName(format!(
                        "{rtype} records cannot be placed in reverse zone '{}'",
                        zone.name()
                    )));
                }
                let node = relative_name(request.name(), zone.name())?;
                (zone, node)
            }
            None if name::is_multi_label(request.name()) => {
                self.catalog.resolve_forward_zone(request.name())?
            }
            None => {
                let zone = self
                    .catalog
                    .default_zone(ZoneKind::Forward)
                    .ok_or_else(|| {
                        Error::zone_not_found(name::normalize_fqdn(
                            request.name(),
                        ))
                    })?;
                (zone, name::normalize_label(request.name()))
            }
        };
        check_node_name(&node)?;
        Ok(Target { zone, node, record })
    }

    /// Resolves the reverse node owning a PTR record.
    fn resolve_ptr_target(
        &self,
        request: &RecordRequest,
        record: Record,
    ) -> Result<Target, Error> {
        let zone = match request.zone() {
            Some(zone_name) => {
                let zone = self.zone(zone_name)?;
                if !zone.is_reverse() {
                    return Err(Error::InvalidName(format!(
                        "PTR records cannot be placed in forward zone '{}'",
                        zone.name()
                    )));
                }
                Some(zone)
            }
            None => None,
        };

        let owner = request.name().trim();
        let addr = match owner.parse::<IpAddr>() {
            Ok(addr) => addr,
            Err(_) => match codec::reverse_name_to_address(owner) {
                Some(addr) => addr,
                None => match &zone {
                    Some(zone) => codec::reverse_label_to_address(
                        zone,
                        &relative_name(owner, zone.name())?,
                    )?,
                    None => {
                        return Err(Error::InvalidName(format!(
                            "'{owner}' is neither an address nor a reverse \
                             name"
                        )))
                    }
                },
            },
        };

        match zone {
            Some(zone) => {
                if !zone.contains_addr(addr) {
                    return Err(Error::InvalidName(format!(
                        "{addr} is outside reverse zone {zone}"
                    )));
                }
                let node = codec::address_to_reverse_label(
                    addr,
                    zone.prefix_len().unwrap_or(0),
                );
                Ok(Target { zone, node, record })
            }
            None => {
                let (zone, node) = self.catalog.resolve_reverse_zone(addr)?;
                Ok(Target { zone, node, record })
            }
        }
    }

    /// Resolves the counterpart of a primary record.
    fn resolve_mirror(&self, primary: &Target) -> Result<Target, Error> {
        match primary.record.rtype().map(RecordType::mirror) {
            Some(Mirror::Reverse) => {
                let addr = primary.record.addr().ok_or_else(|| {
                    Error::InvalidData(format!(
                        "'{}' is not an address",
                        primary.record.value()
                    ))
                })?;
                let (zone, node) = self.catalog.resolve_reverse_zone(addr)?;
                let record = Record::new(RecordType::Ptr, &primary.fqdn());
                Ok(Target { zone, node, record })
            }
            Some(Mirror::Forward) => {
                let addr =
                    codec::reverse_label_to_address(&primary.zone, &primary.node)?;
                let (zone, node) = self
                    .catalog
                    .resolve_forward_zone(primary.record.value())?;
                let record =
                    Record::new(RecordType::for_addr(addr), &addr.to_string());
                Ok(Target { zone, node, record })
            }
            _ => Err(Error::InvalidData(format!(
                "{} records are not mirrored",
                primary.record.type_mnemonic()
            ))),
        }
    }

    /// Writes a mirror record.
    ///
    /// Deleting a mirror that does not exist counts as success.
    async fn write_mirror(
        &self,
        mirror: &Target,
        action: Action,
    ) -> Result<Option<RecordChange>, Error> {
        match self
            .write_record(mirror.zone_name(), &mirror.node, &mirror.record, action)
            .await
        {
            Err(Error::NotFound(NotFound::Record { .. } | NotFound::Node { .. }))
                if action == Action::Delete =>
            {
                debug!(
                    "Mirror {} at {} already absent",
                    mirror.record,
                    mirror.fqdn()
                );
                Ok(None)
            }
            res => res,
        }
    }

    /// Adds or removes a single record with a conditional write.
    ///
    /// Returns `None` if a record to be created already exists. Fails with
    /// [`NotFound::Record`] if a record to be deleted does not exist.
    async fn write_record(
        &self,
        zone: &str,
        node: &str,
        record: &Record,
        action: Action,
    ) -> Result<Option<RecordChange>, Error> {
        let (version, mut records) = match self.store.get_node(zone, node).await
        {
            Ok(current) => (current.version(), current.into_records()),
            Err(StoreError::NotFound(NotFound::Node { .. })) => {
                (0, BTreeSet::new())
            }
            Err(err) => return Err(err.into()),
        };

        match action {
            Action::Create => {
                if !records.insert(record.clone()) {
                    return Ok(None);
                }
            }
            Action::Delete => {
                if !records.remove(record) {
                    return Err(NotFound::Record {
                        zone: zone.into(),
                        node: node.into(),
                        record: record.to_string(),
                    }
                    .into());
                }
            }
        }

        let stored = self
            .store
            .put_node(zone, node, records, Some(version))
            .await?;
        trace!("{action} of {record} at '{node}' in '{zone}' stored");
        Ok(Some(match action {
            Action::Create => {
                let record = stored
                    .and_then(|node| node.records().get(record).cloned())
                    .unwrap_or_else(|| record.clone());
                RecordChange::added(zone, node, record)
            }
            Action::Delete => RecordChange::removed(zone, node, record.clone()),
        }))
    }

    /// Reverts applied changes.
    ///
    /// Returns the changes that could not be reverted. This never gives up
    /// early because of a deadline.
    async fn compensate(&self, changes: &ChangeSet) -> ChangeSet {
        let mut residue = ChangeSet::new();
        for change in changes.primary() {
            if !self.revert(change).await {
                residue.push_primary(change.clone());
            }
        }
        for change in changes.mirror() {
            if !self.revert(change).await {
                residue.push_mirror(change.clone());
            }
        }
        residue
    }

    async fn revert(&self, change: &RecordChange) -> bool {
        let action = if change.is_added() {
            Action::Delete
        } else {
            Action::Create
        };
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .write_record(change.zone(), change.node(), change.record(), action)
                .await
            {
                Ok(_) => {
                    debug!("Reverted {change}");
                    return true;
                }
                Err(Error::NotFound(_)) if change.is_added() => {
                    debug!("Reverted {change}, already gone");
                    return true;
                }
                Err(Error::Conflict) if attempt < COMPENSATION_ATTEMPTS => {
                    trace!("Conflict reverting {change}, attempt {attempt}");
                }
                Err(err) => {
                    warn!("Failed to revert {change}: {err}");
                    return false;
                }
            }
        }
    }
}

/// # Zone and node administration
///
/// None of these operations mirror records.
impl Synchronizer {
    /// Creates a zone in the store and adds it to the catalog.
    ///
    /// Fails with [`Error::PreconditionFailed`] if the name is taken, if a
    /// reverse zone overlaps an existing one, or if a second default zone
    /// of the same kind is requested.
    pub async fn create_zone(
        &self,
        zone: Zone,
        deadline: Deadline,
    ) -> Result<Zone, Error> {
        self.catalog.validate_new_zone(&zone)?;
        deadline.check(&ChangeSet::new())?;
        let created = self.store.create_zone(zone).await?;
        self.catalog.replace(created.clone()).await;
        debug!("Created {} zone {created}", created.kind());
        Ok(created)
    }

    /// Deletes a zone with all its nodes.
    pub async fn delete_zone(
        &self,
        zone: &str,
        deadline: Deadline,
    ) -> Result<(), Error> {
        let zone = name::normalize_fqdn(zone);
        deadline.check(&ChangeSet::new())?;
        self.store.delete_zone(&zone).await?;
        let _ = self.catalog.remove(&zone).await;
        debug!("Deleted zone '{zone}'");
        Ok(())
    }

    /// Returns a node.
    pub async fn get_node(&self, zone: &str, name: &str) -> Result<Node, Error> {
        let zone = self.zone(zone)?;
        let node = relative_name(name, zone.name())?;
        Ok(self.store.get_node(zone.name(), &node).await?)
    }

    /// Replaces all records of a node.
    ///
    /// An empty record set deletes the node, in which case `None` is
    /// returned.
    pub async fn save_node(
        &self,
        zone: &str,
        name: &str,
        records: impl IntoIterator<Item = Record>,
        deadline: Deadline,
    ) -> Result<Option<Node>, Error> {
        let zone = self.zone(zone)?;
        let node = relative_name(name, zone.name())?;
        check_node_name(&node)?;
        let records = records
            .into_iter()
            .map(|record| {
                check_record(&record)?;
                Ok(record)
            })
            .collect::<Result<BTreeSet<_>, Error>>()?;
        deadline.check(&ChangeSet::new())?;
        let stored = self
            .store
            .put_node(zone.name(), &node, records, None)
            .await?;
        debug!(
            "Saved node '{node}' in '{}' with {} records",
            zone.name(),
            stored.as_ref().map(Node::len).unwrap_or(0)
        );
        Ok(stored)
    }

    /// Deletes a node with all its records.
    pub async fn delete_node(
        &self,
        zone: &str,
        name: &str,
        deadline: Deadline,
    ) -> Result<(), Error> {
        let zone = self.zone(zone)?;
        let node = relative_name(name, zone.name())?;
        deadline.check(&ChangeSet::new())?;
        self.store.delete_node(zone.name(), &node).await?;
        debug!("Deleted node '{node}' in '{}'", zone.name());
        Ok(())
    }

    /// Deletes the named nodes of a zone, or all nodes if no names are given.
    ///
    /// Named nodes that do not exist are skipped. The report lists every
    /// removed record on the primary side.
    pub async fn delete_all_nodes(
        &self,
        zone: &str,
        names: &[String],
        deadline: Deadline,
    ) -> Result<WriteReport, Error> {
        let zone = self.zone(zone)?;
        let mut report = WriteReport::new();

        let nodes: Vec<Node> = if names.is_empty() {
            self.store.list_nodes(zone.name(), None).await?
        } else {
            let mut nodes = Vec::with_capacity(names.len());
            for name in names {
                let node = relative_name(name, zone.name())?;
                match self.store.get_node(zone.name(), &node).await {
                    Ok(node) => nodes.push(node),
                    Err(StoreError::NotFound(NotFound::Node { .. })) => {
                        debug!("Skipping missing node '{node}'");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            nodes
        };

        for node in nodes {
            deadline.check(report.changes())?;
            match self.store.delete_node(zone.name(), node.name()).await {
                Ok(()) => {}
                Err(StoreError::NotFound(_)) => continue,
                Err(err) => return Err(err.into()),
            }
            for record in node.iter() {
                report.changes_mut().push_primary(RecordChange::removed(
                    zone.name(),
                    node.name(),
                    record.clone(),
                ));
            }
        }
        report.enter(WriteState::ForwardApplied);
        report.enter(WriteState::Done);
        debug!(
            "Deleted {} records from '{}'",
            report.changes().len(),
            zone.name()
        );
        Ok(report)
    }

    fn zone(&self, name: &str) -> Result<Zone, Error> {
        self.catalog
            .get_zone(name)
            .ok_or_else(|| Error::zone_not_found(name::normalize_fqdn(name)))
    }
}

//------------ Helper Functions ----------------------------------------------

/// Returns the node name of `name` within a zone.
///
/// Names with a terminating dot must be within the zone. Other names are
/// accepted both relative to the zone and with the zone as suffix.
pub(crate) fn relative_name(name: &str, zone: &str) -> Result<String, Error> {
    let name = name.trim();
    match codec::fqdn_to_local_label(name, zone) {
        Ok(label) => Ok(label),
        Err(err) if name.ends_with('.') => Err(err),
        Err(_) => Ok(name::normalize_label(name)),
    }
}

fn check_node_name(node: &str) -> Result<(), Error> {
    if node == APEX {
        return Ok(());
    }
    let valid = node.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.bytes().any(|ch| ch.is_ascii_whitespace())
    });
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(format!("'{node}' is not a valid node name")))
    }
}

/// Creates the record for a write request, checking its data.
fn make_record(rtype: RecordType, data: &str) -> Result<Record, Error> {
    if rtype == RecordType::Unknown {
        return Err(Error::InvalidData(
            "records of unknown type cannot be written".into(),
        ));
    }
    let record = Record::new(rtype, data);
    check_record(&record)?;
    Ok(record)
}

fn check_record(record: &Record) -> Result<(), Error> {
    let value = record.value();
    if value.is_empty() || value == "." {
        return Err(Error::InvalidData(format!(
            "empty {} record data",
            record.type_mnemonic()
        )));
    }
    let valid = match record.rtype() {
        Some(RecordType::A) => value.parse::<Ipv4Addr>().is_ok(),
        Some(RecordType::Aaaa) => value.parse::<Ipv6Addr>().is_ok(),
        _ => true,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidData(format!("invalid record {record}")))
    }
}

//============ Testing =======================================================
