//! Driver abstraction over ordered key-value engines.
//!
//! A driver turns the opaque remainder of a `scheme://rest` URI into a
//! [`Connection`], and a connection hands out snapshot-isolated [`KvTx`]
//! transactions over a single flat, byte-ordered keyspace. Everything above
//! this module (buckets, typed access, the record layer) is engine-agnostic.
//!
//! Two drivers ship in-tree: [`RedbDriver`] over a memory-mapped
//! copy-on-write B+tree file, and [`MemoryDriver`] for ephemeral in-process
//! stores.
//!
//! [`RedbDriver`]: redb::RedbDriver
//! [`MemoryDriver`]: memory::MemoryDriver

pub mod memory;
pub mod redb;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use snafu::{ensure, OptionExt};

use crate::error::{Result, UnsupportedDriverSnafu};
use crate::flags::DatabaseFlags;

/// A pluggable storage engine adapter, selected by URI scheme.
pub trait Driver: Send + Sync {
    /// Opens (or creates, per `flags`) the backing store at `path`.
    ///
    /// `path` is everything after the URI's `://`, passed verbatim.
    fn connect(&self, path: &str, flags: DatabaseFlags) -> Result<Arc<dyn Connection>>;
}

/// An open backing store.
///
/// Connections are shareable across threads; transactions are not.
pub trait Connection: Send + Sync {
    /// Begins a read-only transaction with a stable snapshot.
    ///
    /// Arbitrarily many read transactions may be live at once.
    fn begin_read(&self) -> Result<Box<dyn KvTx>>;

    /// Begins a read-write transaction.
    ///
    /// Writers are serialized: at most one is active at a time.
    fn begin_write(&self) -> Result<Box<dyn KvTx>>;

    /// Releases the connection. Idempotent; later begins fail.
    fn close(&self) -> Result<()>;
}

/// A raw engine transaction over the shared byte keyspace.
///
/// Writes are buffered by the engine and applied atomically on
/// [`commit`](KvTx::commit); dropping an uncommitted transaction rolls it
/// back. All returned keys and values are copied out of the engine, so they
/// stay valid after the transaction ends. Transactions are owned by the
/// thread that began them.
pub trait KvTx {
    /// Reads the value stored at `key`, or `None` if absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Inserts or overwrites the value at `key`.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes the entry at `key`. Succeeds whether or not it existed.
    fn remove(&mut self, key: &[u8]) -> Result<()>;

    /// Returns all entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Atomically applies all buffered writes.
    fn commit(self: Box<Self>) -> Result<()>;

    /// Discards all buffered writes.
    fn rollback(self: Box<Self>);
}

/// Splits `scheme://rest` into its parts.
///
/// A URI without `://`, or with an empty scheme or remainder, is rejected
/// with [`Error::UnsupportedDriver`](crate::Error::UnsupportedDriver).
pub fn parse_uri(uri: &str) -> Result<(&str, &str)> {
    let (scheme, rest) = uri.split_once("://").context(UnsupportedDriverSnafu { uri })?;
    ensure!(!scheme.is_empty() && !rest.is_empty(), UnsupportedDriverSnafu { uri });
    Ok((scheme, rest))
}

/// Maps URI schemes to drivers.
#[derive(Default)]
pub struct Registry {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `scheme` to `driver`, replacing any previous binding.
    pub fn register(&self, scheme: &str, driver: Arc<dyn Driver>) {
        self.drivers.write().insert(scheme.to_string(), driver);
    }

    /// Looks up the driver bound to `scheme`.
    pub fn find(&self, scheme: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.read().get(scheme).cloned()
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry, pre-seeded with the `redb` and `memory`
/// schemes.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        let registry = Registry::new();
        registry.register("redb", Arc::new(redb::RedbDriver));
        registry.register("memory", Arc::new(memory::MemoryDriver));
        registry
    })
}
