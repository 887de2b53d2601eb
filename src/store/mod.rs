//! Access to the zones, nodes and records of the DNS backend.
//!
//! The engine never talks to the directory service directly. Instead it
//! consumes a [`RecordStore`], which may be backed by anything that can
//! list zones and read and replace the record sets of nodes. An in-memory
//! implementation is provided by [`InMemoryStore`].

mod in_memory;
mod traits;

pub use self::in_memory::InMemoryStore;
pub use self::traits::{RecordStore, StoreFuture};
