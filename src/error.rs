//! Error types.
//!
//! All engine operations report failures through [`Error`]. Failures of the
//! backing repositories are reported as [`StoreError`] and converted at the
//! engine boundary.
//!
//! Mutating operations that leave part of a change applied always carry a
//! [`ChangeSet`] describing exactly what remained applied so that callers
//! can reconcile or retry precisely.

use std::boxed::Box;
use std::fmt;
use std::net::IpAddr;
use std::result;
use std::string::String;

use crate::sync::ChangeSet;

//------------ Result --------------------------------------------------------

pub type Result<T> = result::Result<T, Error>;

//------------ Error ---------------------------------------------------------

/// An engine operation failed.
#[derive(Clone, Debug)]
pub enum Error {
    /// A zone, node or record does not exist.
    NotFound(NotFound),

    /// A name or address does not fit the target zone.
    InvalidName(String),

    /// The record data is not valid for the record type.
    InvalidData(String),

    /// A fully qualified name is not inside the given zone.
    NotInZone {
        /// The name that was looked up.
        name: String,

        /// The zone the name was expected in.
        zone: String,
    },

    /// A concurrent modification was detected. Retryable.
    Conflict,

    /// The mirror record could not be created.
    ///
    /// The primary change has been rolled back. If the rollback failed,
    /// `changes` lists what is still applied. Retryable if the rollback
    /// succeeded and the cause is retryable.
    MirrorUnavailable {
        /// Why the mirror could not be created.
        cause: Box<Error>,

        /// Changes that remain applied.
        changes: ChangeSet,
    },

    /// The primary record was deleted but its mirror could not be.
    ///
    /// This is a partial success: the primary deletion stands.
    MirrorDeleteFailed {
        /// Why the mirror could not be deleted.
        cause: Box<Error>,

        /// Changes that were applied.
        changes: ChangeSet,
    },

    /// The delete half of an update succeeded but the create half failed.
    ///
    /// The old record is not restored.
    UpdateIncomplete {
        /// Why the create half failed.
        cause: Box<Error>,

        /// Changes that were applied.
        changes: ChangeSet,
    },

    /// A backend could not be reached. Retryable.
    Unavailable(String),

    /// A precondition for the operation was not met.
    PreconditionFailed(String),

    /// The operation deadline expired.
    ///
    /// Any change applied before expiry that could not be compensated is
    /// listed in `changes`.
    Cancelled {
        /// Changes that remain applied.
        changes: ChangeSet,
    },
}

impl Error {
    /// Returns whether the caller may retry the operation as is.
    ///
    /// A failed mirror write is retryable if its cause is and the primary
    /// write was fully rolled back.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Conflict | Error::Unavailable(_) => true,
            Error::MirrorUnavailable { cause, changes } => {
                changes.is_empty() && cause.is_retryable()
            }
            _ => false,
        }
    }

    /// Returns the changes left applied by a partially successful operation.
    pub fn changes(&self) -> Option<&ChangeSet> {
        match self {
            Error::MirrorUnavailable { changes, .. }
            | Error::MirrorDeleteFailed { changes, .. }
            | Error::UpdateIncomplete { changes, .. }
            | Error::Cancelled { changes } => Some(changes),
            _ => None,
        }
    }

    pub(crate) fn zone_not_found(name: impl Into<String>) -> Self {
        Error::NotFound(NotFound::Zone(name.into()))
    }

    pub(crate) fn no_reverse_zone(addr: IpAddr) -> Self {
        Error::NotFound(NotFound::ReverseZone(addr))
    }
}

//--- From

impl From<NotFound> for Error {
    fn from(err: NotFound) -> Self {
        Error::NotFound(err)
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Error::NotFound(what),
            StoreError::AlreadyExists(name) => Error::PreconditionFailed(
                format!("zone '{name}' already exists"),
            ),
            StoreError::Conflict => Error::Conflict,
            StoreError::Unavailable(msg) => Error::Unavailable(msg),
        }
    }
}

//--- Display and Error

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(what) => write!(f, "{what}"),
            Error::InvalidName(msg) => write!(f, "invalid name: {msg}"),
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::NotInZone { name, zone } => {
                write!(f, "name '{name}' is not in zone '{zone}'")
            }
            Error::Conflict => write!(f, "conflicting concurrent write"),
            Error::MirrorUnavailable { cause, changes } => {
                write!(f, "mirror record unavailable: {cause}")?;
                if !changes.is_empty() {
                    write!(f, " (rollback incomplete: {changes})")?;
                }
                Ok(())
            }
            Error::MirrorDeleteFailed { cause, changes } => {
                write!(f, "mirror delete failed after {changes}: {cause}")
            }
            Error::UpdateIncomplete { cause, changes } => {
                write!(f, "update incomplete after {changes}: {cause}")
            }
            Error::Unavailable(msg) => write!(f, "backend unavailable: {msg}"),
            Error::PreconditionFailed(msg) => {
                write!(f, "precondition failed: {msg}")
            }
            Error::Cancelled { changes } => {
                write!(f, "operation cancelled")?;
                if !changes.is_empty() {
                    write!(f, " with {changes} still applied")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MirrorUnavailable { cause, .. }
            | Error::MirrorDeleteFailed { cause, .. }
            | Error::UpdateIncomplete { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

//------------ NotFound ------------------------------------------------------

/// What could not be found.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NotFound {
    /// No zone of the given name, or no zone covering the given name.
    Zone(String),

    /// No reverse zone covers the given address.
    ReverseZone(IpAddr),

    /// The node does not exist in the zone.
    Node {
        /// The zone name.
        zone: String,

        /// The node name.
        node: String,
    },

    /// The record does not exist at the node.
    Record {
        /// The zone name.
        zone: String,

        /// The node name.
        node: String,

        /// The record type and value.
        record: String,
    },
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFound::Zone(name) => write!(f, "zone not found for '{name}'"),
            NotFound::ReverseZone(addr) => {
                write!(f, "no reverse zone covers {addr}")
            }
            NotFound::Node { zone, node } => {
                write!(f, "node '{node}' not found in zone '{zone}'")
            }
            NotFound::Record { zone, node, record } => {
                write!(f, "record {record} not found at '{node}' in '{zone}'")
            }
        }
    }
}

//------------ StoreError ----------------------------------------------------

/// A repository operation failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoreError {
    /// The zone or node does not exist.
    NotFound(NotFound),

    /// A zone of that name already exists.
    AlreadyExists(String),

    /// The node was modified concurrently.
    Conflict,

    /// The backend could not be reached.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(what) => write!(f, "{what}"),
            StoreError::AlreadyExists(name) => {
                write!(f, "zone '{name}' already exists")
            }
            StoreError::Conflict => write!(f, "node modified concurrently"),
            StoreError::Unavailable(msg) => {
                write!(f, "backend unavailable: {msg}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

//============ Testing =======================================================
