use std::boxed::Box;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::vec::Vec;

use crate::error::StoreError;
use crate::record::{Node, Record};
use crate::zone::Zone;

//------------ StoreFuture ---------------------------------------------------

/// The future returned by all [`RecordStore`] operations.
pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

//------------ RecordStore ---------------------------------------------------

/// A repository of zones and their nodes.
///
/// Zone and node names passed to a store are in canonical form, see
/// [`crate::name`].
///
/// # Concurrent writes
///
/// Writes to the same node must not interleave in a way that loses an
/// update. [`put_node()`] therefore takes the version of the node the
/// caller based its change on and fails with [`StoreError::Conflict`] if
/// the node has been changed since.
///
/// [`put_node()`]: RecordStore::put_node
pub trait RecordStore: Debug + Send + Sync {
    /// Returns all zones.
    fn list_zones(&self) -> StoreFuture<'_, Vec<Zone>>;

    /// Creates a zone and returns it with its timestamps set.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if a zone of that name
    /// exists.
    fn create_zone(&self, zone: Zone) -> StoreFuture<'_, Zone>;

    /// Deletes a zone and all its nodes.
    fn delete_zone<'a>(&'a self, zone: &'a str) -> StoreFuture<'a, ()>;

    /// Returns a node.
    ///
    /// Fails with [`StoreError::NotFound`] if the zone or the node does not
    /// exist.
    fn get_node<'a>(
        &'a self,
        zone: &'a str,
        name: &'a str,
    ) -> StoreFuture<'a, Node>;

    /// Replaces the full record set of a node.
    ///
    /// If `expected_version` is given, the write only succeeds if the
    /// stored node still has that version, where version 0 means the node
    /// must not exist. An empty record set deletes the node and returns
    /// `None`, otherwise the stored node is returned.
    fn put_node<'a>(
        &'a self,
        zone: &'a str,
        name: &'a str,
        records: BTreeSet<Record>,
        expected_version: Option<u64>,
    ) -> StoreFuture<'a, Option<Node>>;

    /// Deletes a node with all its records.
    fn delete_node<'a>(
        &'a self,
        zone: &'a str,
        name: &'a str,
    ) -> StoreFuture<'a, ()>;

    /// Returns the nodes of a zone, ordered by name.
    ///
    /// If a query is given, only nodes matching it as per
    /// [`Node::matches_text()`] are returned.
    fn list_nodes<'a>(
        &'a self,
        zone: &'a str,
        query: Option<&'a str>,
    ) -> StoreFuture<'a, Vec<Node>>;
}
