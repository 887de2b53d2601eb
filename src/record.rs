//! Records and nodes.
//!
//! A [`Node`] is the set of [`Record`]s sharing one name within a zone.
//! Record identity is the pair of record type and value, both compared
//! case-insensitively. The same pair defines the total order used for
//! stable output and for deduplication, so a node never holds two records
//! of the same type and value.

use std::cmp::Ordering;
use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::string::{String, ToString};

use chrono::{DateTime, Utc};

use crate::codec;
use crate::lease::LeaseRef;
use crate::name::{self, APEX};

//------------ RecordType ----------------------------------------------------

/// The type of a record.
///
/// Types the backend could not classify are represented by
/// [`RecordType::Unknown`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "UPPERCASE")
)]
pub enum RecordType {
    A,
    Aaaa,
    Ptr,
    Cname,
    Mx,
    Ns,
    Soa,
    Srv,
    Txt,
    Unknown,
}

/// What a record of a given type is mirrored to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mirror {
    /// An address record is mirrored by a PTR record in a reverse zone.
    Reverse,

    /// A PTR record is mirrored by an address record in a forward zone.
    Forward,

    /// The record is not mirrored.
    None,
}

/// The mirroring rule table.
///
/// Types not listed here are never mirrored.
const MIRROR_RULES: &[(RecordType, Mirror)] = &[
    (RecordType::A, Mirror::Reverse),
    (RecordType::Aaaa, Mirror::Reverse),
    (RecordType::Ptr, Mirror::Forward),
];

impl RecordType {
    /// Returns the mnemonic of the type.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Ptr => "PTR",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Soa => "SOA",
            RecordType::Srv => "SRV",
            RecordType::Txt => "TXT",
            RecordType::Unknown => "UNKNOWN",
        }
    }

    /// Parses a type mnemonic as delivered by a backend.
    ///
    /// Returns `None` for empty input. Unrecognized mnemonics map to
    /// [`RecordType::Unknown`].
    pub fn parse(mnemonic: &str) -> Option<Self> {
        let mnemonic = mnemonic.trim();
        if mnemonic.is_empty() {
            return None;
        }
        let rtype = [
            RecordType::A,
            RecordType::Aaaa,
            RecordType::Ptr,
            RecordType::Cname,
            RecordType::Mx,
            RecordType::Ns,
            RecordType::Soa,
            RecordType::Srv,
            RecordType::Txt,
        ]
        .into_iter()
        .find(|rtype| rtype.mnemonic().eq_ignore_ascii_case(mnemonic));
        Some(rtype.unwrap_or(RecordType::Unknown))
    }

    /// Returns the address record type for an address.
    pub fn for_addr(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Returns how records of this type are mirrored.
    pub fn mirror(self) -> Mirror {
        MIRROR_RULES
            .iter()
            .find(|(rtype, _)| *rtype == self)
            .map(|(_, mirror)| *mirror)
            .unwrap_or(Mirror::None)
    }

    /// Returns whether the record data of this type is an address.
    pub fn is_address(self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa)
    }

    /// Returns whether the record data of this type is a domain name.
    pub fn has_name_data(self) -> bool {
        matches!(
            self,
            RecordType::Ptr | RecordType::Cname | RecordType::Ns
        )
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

//------------ Record --------------------------------------------------------

/// A single record at a node.
///
/// Only the type and the value take part in comparisons. All other fields
/// are informational: the store fills in TTL, serial, version and
/// timestamp, and the correlation engine fills in the correlated value and
/// the attached lease.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    rtype: Option<RecordType>,
    value: String,
    #[cfg_attr(feature = "serde", serde(default))]
    raw_value: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    ttl_seconds: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    serial: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    version: Option<u64>,
    #[cfg_attr(feature = "serde", serde(default))]
    timestamp: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "serde", serde(default))]
    correlated_value: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    lease: Option<LeaseRef>,
}

impl Record {
    /// Creates a new record.
    ///
    /// Address values are brought into their canonical textual form if they
    /// parse, domain name values are made fully qualified.
    pub fn new(rtype: RecordType, value: &str) -> Self {
        Self::with_type(Some(rtype), value)
    }

    /// Creates a record whose type may be absent.
    pub fn with_type(rtype: Option<RecordType>, value: &str) -> Self {
        let value = value.trim();
        let value = match rtype {
            Some(rtype) if rtype.is_address() => value
                .parse::<IpAddr>()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| value.into()),
            Some(rtype) if rtype.has_name_data() => {
                name::normalize_fqdn(value)
            }
            _ => value.into(),
        };
        Record {
            rtype,
            value,
            raw_value: None,
            ttl_seconds: None,
            serial: None,
            version: None,
            timestamp: None,
            correlated_value: None,
            lease: None,
        }
    }

    /// Sets the backend specific representation of the record.
    pub fn with_raw_value(mut self, raw: impl Into<String>) -> Self {
        self.raw_value = Some(raw.into());
        self
    }

    /// Sets the TTL.
    pub fn with_ttl(mut self, ttl_seconds: u32) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    pub fn rtype(&self) -> Option<RecordType> {
        self.rtype
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn raw_value(&self) -> Option<&str> {
        self.raw_value.as_deref()
    }

    pub fn ttl_seconds(&self) -> Option<u32> {
        self.ttl_seconds
    }

    pub fn serial(&self) -> Option<u32> {
        self.serial
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn correlated_value(&self) -> Option<&str> {
        self.correlated_value.as_deref()
    }

    pub fn lease(&self) -> Option<&LeaseRef> {
        self.lease.as_ref()
    }

    /// Returns the value as an address for address records.
    pub fn addr(&self) -> Option<IpAddr> {
        match self.rtype {
            Some(rtype) if rtype.is_address() => self.value.parse().ok(),
            _ => None,
        }
    }

    /// Returns whether the record has the given type.
    pub fn is(&self, rtype: RecordType) -> bool {
        self.rtype == Some(rtype)
    }

    /// Returns the type mnemonic or an empty string if the type is absent.
    pub fn type_mnemonic(&self) -> &'static str {
        self.rtype.map(RecordType::mnemonic).unwrap_or("")
    }

    pub(crate) fn set_store_fields(
        &mut self,
        ttl_seconds: u32,
        serial: u32,
        version: u64,
        timestamp: DateTime<Utc>,
    ) {
        if self.ttl_seconds.is_none() {
            self.ttl_seconds = Some(ttl_seconds);
        }
        self.serial = Some(serial);
        self.version = Some(version);
        self.timestamp = Some(timestamp);
    }

    pub(crate) fn annotate(
        &mut self,
        correlated_value: Option<String>,
        lease: Option<LeaseRef>,
    ) {
        self.correlated_value = correlated_value;
        self.lease = lease;
    }
}

//--- PartialEq, Eq, PartialOrd, Ord

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Record {}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_ignore_case(self.type_mnemonic(), other.type_mnemonic())
            .then_with(|| cmp_ignore_case(&self.value, &other.value))
    }
}

fn cmp_ignore_case(left: &str, right: &str) -> Ordering {
    left.bytes()
        .map(|ch| ch.to_ascii_lowercase())
        .cmp(right.bytes().map(|ch| ch.to_ascii_lowercase()))
}

//--- Display

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rtype {
            Some(rtype) => write!(f, "{} {}", rtype, self.value),
            None => write!(f, "? {}", self.value),
        }
    }
}

//------------ Node ----------------------------------------------------------

/// The records sharing one name within a zone.
///
/// A node with no records does not exist in the store; storing an empty
/// node deletes it. The version is assigned by the store and used for
/// conditional writes. A node that has not been stored yet has version 0.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    zone: String,
    name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    records: BTreeSet<Record>,
    #[cfg_attr(feature = "serde", serde(default))]
    version: u64,
}

impl Node {
    /// Creates a new, empty node.
    pub fn new(zone: &str, name: &str) -> Self {
        Node {
            zone: name::normalize_fqdn(zone),
            name: name::normalize_label(name),
            records: BTreeSet::new(),
            version: 0,
        }
    }

    /// Creates a node with the given records.
    pub fn with_records(
        zone: &str,
        name: &str,
        records: impl IntoIterator<Item = Record>,
    ) -> Self {
        let mut node = Self::new(zone, name);
        node.records.extend(records);
        node
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fully qualified name of the node.
    pub fn fqdn(&self) -> String {
        codec::local_label_to_fqdn(&self.name, &self.zone)
    }

    pub fn is_apex(&self) -> bool {
        self.name == APEX
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn records(&self) -> &BTreeSet<Record> {
        &self.records
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns whether the node holds a record of this type and value.
    pub fn contains(&self, record: &Record) -> bool {
        self.records.contains(record)
    }

    /// Adds a record.
    ///
    /// Returns `false` if a record of the same type and value exists.
    pub fn insert(&mut self, record: Record) -> bool {
        self.records.insert(record)
    }

    /// Removes the record of the same type and value.
    pub fn remove(&mut self, record: &Record) -> Option<Record> {
        self.records.take(record)
    }

    /// Keeps only the records for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&Record) -> bool) {
        self.records.retain(keep)
    }

    /// Replaces the records with the result of `op`.
    pub fn map_records(
        &mut self,
        op: impl FnOnce(std::vec::Vec<Record>) -> std::vec::Vec<Record>,
    ) {
        let records = std::mem::take(&mut self.records);
        self.records = op(records.into_iter().collect()).into_iter().collect();
    }

    pub fn into_records(self) -> BTreeSet<Record> {
        self.records
    }

    /// Returns whether the node matches a free text search term.
    ///
    /// The term matches case-insensitively as a substring of the node name,
    /// of its fully qualified name, or of any record value.
    pub fn matches_text(&self, term: &str) -> bool {
        let term = term.trim().trim_end_matches('.').to_ascii_lowercase();
        if term.is_empty() {
            return true;
        }
        self.name.contains(&term)
            || self.fqdn().contains(&term)
            || self
                .records
                .iter()
                .any(|record| record.value.to_ascii_lowercase().contains(&term))
    }
}

impl<'a> IntoIterator for &'a Node {
    type Item = &'a Record;
    type IntoIter = btree_set::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

//============ Testing =======================================================
