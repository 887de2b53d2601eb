//! Reporting what a write changed.

use std::fmt;
use std::string::String;

use smallvec::SmallVec;

use crate::codec;
use crate::record::Record;

//------------ Action --------------------------------------------------------

/// What a record write does.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "UPPERCASE")
)]
pub enum Action {
    Create,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => f.write_str("create"),
            Action::Delete => f.write_str("delete"),
        }
    }
}

//------------ ChangeKind ----------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "UPPERCASE")
)]
pub enum ChangeKind {
    Added,
    Removed,
}

//------------ RecordChange --------------------------------------------------

/// A single record added to or removed from a node.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordChange {
    zone: String,
    node: String,
    record: Record,
    kind: ChangeKind,
}

impl RecordChange {
    pub fn added(zone: &str, node: &str, record: Record) -> Self {
        RecordChange {
            zone: zone.into(),
            node: node.into(),
            record,
            kind: ChangeKind::Added,
        }
    }

    pub fn removed(zone: &str, node: &str, record: Record) -> Self {
        RecordChange {
            zone: zone.into(),
            node: node.into(),
            record,
            kind: ChangeKind::Removed,
        }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn is_added(&self) -> bool {
        self.kind == ChangeKind::Added
    }

    /// The fully qualified name of the changed node.
    pub fn fqdn(&self) -> String {
        codec::local_label_to_fqdn(&self.node, &self.zone)
    }
}

impl fmt::Display for RecordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.kind {
            ChangeKind::Added => '+',
            ChangeKind::Removed => '-',
        };
        write!(f, "{sign}{} {}", self.fqdn(), self.record)
    }
}

//------------ ChangeSet -----------------------------------------------------

/// The record changes of a write, split by side.
///
/// The primary side is the record the request named, the mirror side is
/// its forward or reverse counterpart.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeSet {
    primary: SmallVec<[RecordChange; 2]>,
    mirror: SmallVec<[RecordChange; 2]>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn primary(&self) -> &[RecordChange] {
        &self.primary
    }

    pub fn mirror(&self) -> &[RecordChange] {
        &self.mirror
    }

    pub fn push_primary(&mut self, change: RecordChange) {
        self.primary.push(change)
    }

    pub fn push_mirror(&mut self, change: RecordChange) {
        self.mirror.push(change)
    }

    /// Appends all changes of `other`, keeping their sides.
    pub fn extend(&mut self, other: ChangeSet) {
        self.primary.extend(other.primary);
        self.mirror.extend(other.mirror);
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.mirror.is_empty()
    }

    pub fn len(&self) -> usize {
        self.primary.len() + self.mirror.len()
    }

    /// Returns all changes, primary side first.
    pub fn iter(&self) -> impl Iterator<Item = &RecordChange> {
        self.primary.iter().chain(self.mirror.iter())
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no changes");
        }
        let mut first = true;
        for change in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{change}")?;
        }
        Ok(())
    }
}

//------------ WriteState ----------------------------------------------------

/// The states a record write passes through.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum WriteState {
    /// The targets of the write are being determined.
    Resolving,

    /// The primary record has been written.
    ForwardApplied,

    /// The mirror record has been written.
    ReverseApplied,

    /// The write is complete.
    Done,

    /// Writing the primary record failed. Nothing was changed.
    ForwardFailed,

    /// Writing the mirror record failed and compensation is under way.
    ReverseFailed,

    /// Compensation did not restore the previous state.
    Failed,
}

impl fmt::Display for WriteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteState::Resolving => "RESOLVING",
            WriteState::ForwardApplied => "FORWARD_APPLIED",
            WriteState::ReverseApplied => "REVERSE_APPLIED",
            WriteState::Done => "DONE",
            WriteState::ForwardFailed => "FORWARD_FAILED",
            WriteState::ReverseFailed => "REVERSE_FAILED",
            WriteState::Failed => "FAILED",
        })
    }
}

//------------ WriteReport ---------------------------------------------------

/// The result of a successful write.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WriteReport {
    changes: ChangeSet,
    path: SmallVec<[WriteState; 4]>,
}

impl WriteReport {
    pub(crate) fn new() -> Self {
        let mut path = SmallVec::new();
        path.push(WriteState::Resolving);
        WriteReport {
            changes: ChangeSet::new(),
            path,
        }
    }

    /// The records actually changed, by side.
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn into_changes(self) -> ChangeSet {
        self.changes
    }

    /// The states the write passed through, in order.
    pub fn path(&self) -> &[WriteState] {
        &self.path
    }

    /// Returns whether the write changed nothing.
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn state(&self) -> WriteState {
        self.path.last().copied().unwrap_or(WriteState::Resolving)
    }

    pub(crate) fn changes_mut(&mut self) -> &mut ChangeSet {
        &mut self.changes
    }

    pub(crate) fn enter(&mut self, state: WriteState) {
        self.path.push(state)
    }

    /// Appends a later write to this one.
    pub(crate) fn merge(&mut self, other: WriteReport) {
        self.changes.extend(other.changes);
        self.path.extend(other.path);
    }
}

//============ Testing =======================================================
