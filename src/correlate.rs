//! Joining DNS records with DHCP leases.
//!
//! Address records are joined with the leases for their address, PTR
//! records with the leases whose host name is the record's target. All
//! functions here are pure: they depend only on their arguments, including
//! the evaluation time.

use std::fmt;
use std::string::{String, ToString};
use std::sync::Arc;
use std::vec::Vec;

use chrono::{DateTime, Utc};

use crate::lease::{DhcpLease, LeaseRef};
use crate::record::{Node, Record, RecordType};

//------------ AddMode -------------------------------------------------------

/// Which leases to attach to records.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "UPPERCASE")
)]
pub enum AddMode {
    /// Attach nothing.
    #[default]
    None,

    /// Attach the most recently started lease active at evaluation time.
    Active,

    /// Attach the most recently started lease, whether active or not.
    All,
}

impl AddMode {
    /// Returns whether leases that are no longer active are needed.
    pub fn needs_expired(self) -> bool {
        self == AddMode::All
    }
}

impl fmt::Display for AddMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AddMode::None => "NONE",
            AddMode::Active => "ACTIVE",
            AddMode::All => "ALL",
        })
    }
}

//------------ UnknownFilter -------------------------------------------------

/// Which records to keep with regard to their type being unknown.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum UnknownFilter {
    /// Keep all records.
    #[default]
    All,

    /// Drop records of unknown type.
    NoUnknown,

    /// Keep only records of unknown type.
    Unknown,
}

impl UnknownFilter {
    /// Returns whether the filter keeps a record.
    ///
    /// A record without a type matches neither of the two restricting
    /// modes, so only [`UnknownFilter::All`] keeps it.
    pub fn keeps(self, record: &Record) -> bool {
        match (self, record.rtype()) {
            (UnknownFilter::All, _) => true,
            (_, None) => false,
            (UnknownFilter::NoUnknown, Some(rtype)) => rtype != RecordType::Unknown,
            (UnknownFilter::Unknown, Some(rtype)) => rtype == RecordType::Unknown,
        }
    }
}

impl fmt::Display for UnknownFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnknownFilter::All => "ALL",
            UnknownFilter::NoUnknown => "NO_UNKNOWN",
            UnknownFilter::Unknown => "UNKNOWN",
        })
    }
}

//------------ Correlation ---------------------------------------------------

/// Attaches leases to records.
///
/// Every record's previous annotation is replaced, so correlating a result
/// again never stacks leases. The order of records is kept.
pub fn correlate(
    records: Vec<Record>,
    leases: &[Arc<DhcpLease>],
    mode: AddMode,
    now: DateTime<Utc>,
) -> Vec<Record> {
    records
        .into_iter()
        .map(|mut record| {
            let (value, lease) = match select_lease(&record, leases, mode, now) {
                Some(lease) => (
                    correlated_value(&record, lease),
                    Some(LeaseRef::new(lease.clone(), lease.state_at(now))),
                ),
                None => (None, None),
            };
            record.annotate(value, lease);
            record
        })
        .collect()
}

/// Attaches leases to the records of a node.
pub fn correlate_node(
    node: &mut Node,
    leases: &[Arc<DhcpLease>],
    mode: AddMode,
    now: DateTime<Utc>,
) {
    node.map_records(|records| correlate(records, leases, mode, now))
}

/// Picks the lease to attach to a record.
///
/// Among several candidates the one with the latest begin wins. Of
/// candidates with equal begin the first one is used.
fn select_lease<'a>(
    record: &Record,
    leases: &'a [Arc<DhcpLease>],
    mode: AddMode,
    now: DateTime<Utc>,
) -> Option<&'a Arc<DhcpLease>> {
    if mode == AddMode::None {
        return None;
    }
    leases
        .iter()
        .filter(|lease| lease_matches(record, lease))
        .filter(|lease| mode == AddMode::All || lease.is_active(now))
        .fold(None, |best: Option<&Arc<DhcpLease>>, lease| match best {
            Some(best) if best.begin() >= lease.begin() => Some(best),
            _ => Some(lease),
        })
}

fn lease_matches(record: &Record, lease: &DhcpLease) -> bool {
    match record.rtype() {
        Some(RecordType::A) | Some(RecordType::Aaaa) => {
            record.addr() == Some(lease.ip())
        }
        Some(RecordType::Ptr) => lease.has_hostname(record.value()),
        _ => false,
    }
}

fn correlated_value(record: &Record, lease: &DhcpLease) -> Option<String> {
    if record.is(RecordType::Ptr) {
        Some(lease.ip().to_string())
    } else {
        lease.hostname().map(Into::into)
    }
}

//------------ Unknown filter ------------------------------------------------

/// Keeps only the records the filter accepts, in their original order.
///
/// [`UnknownFilter::All`] returns the records unchanged.
pub fn apply_unknown_filter(
    records: Vec<Record>,
    filter: UnknownFilter,
) -> Vec<Record> {
    if filter == UnknownFilter::All {
        return records;
    }
    records
        .into_iter()
        .filter(|record| filter.keeps(record))
        .collect()
}

/// Applies the unknown filter to the records of a node.
pub fn filter_node(node: &mut Node, filter: UnknownFilter) {
    if filter != UnknownFilter::All {
        node.retain(|record| filter.keeps(record))
    }
}

//============ Testing =======================================================
