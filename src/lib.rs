//! Synchronization and correlation of DNS zones, records and DHCP leases.
//!
//! This crate provides the engine behind a management interface for a
//! directory integrated DNS service. It maps record writes onto the nodes
//! of forward and reverse zones, keeps address records and their PTR
//! counterparts in step, and joins DNS data with DHCP leases for sorted,
//! paginated views.
//!
//! The backends are abstracted: DNS data is read and written through a
//! [`RecordStore`][store::RecordStore] and leases come from a
//! [`LeaseSource`][lease::LeaseSource]. Transport, authentication and the
//! wire protocols of the backends are left to the caller.
//!
//! # Modules
//!
//! The data model lives in
//!
//! * [zone], for forward and reverse zones,
//! * [record], for records, record types and nodes,
//! * [lease], for DHCP leases and their sources, and
//! * [directory], for the directory objects zones and nodes are stored as.
//!
//! The engine itself is made of
//!
//! * [codec], translating between addresses, host names and node names,
//! * [catalog], the cached set of zones used to route names and addresses,
//! * [sync], applying writes and mirroring them between forward and
//!   reverse zones,
//! * [correlate], attaching leases to records and filtering record types,
//! * [query], producing sorted pages of search and listing results, and
//! * [service], the operations offered to callers.
//!
//! [retry] helps callers act on retryable errors, [config] holds the
//! defaults applied by the service.
//!
//! # Reference of Feature Flags
//!
//! * `logging`: adds [`init_logging`][crate::logging::init_logging] to set
//!   up a [tracing-subscriber](https://github.com/tokio-rs/tracing) for the
//!   events the engine emits.
//! * `serde`: derives `Serialize` and `Deserialize` for the data model,
//!   requests, reports and configuration.

#![allow(renamed_and_removed_lints)]
#![allow(clippy::unknown_clippy_lints)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod catalog;
pub mod codec;
pub mod config;
pub mod correlate;
pub mod directory;
pub mod error;
pub mod lease;
pub mod name;
pub mod query;
pub mod record;
pub mod retry;
pub mod service;
pub mod store;
pub mod sync;
pub mod zone;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

pub use self::config::Config;
pub use self::error::{Error, NotFound, StoreError};
pub use self::service::DnsService;
