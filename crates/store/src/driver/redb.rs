//! Reference driver over the redb memory-mapped B+tree engine.
//!
//! The entire store lives in a single redb table holding the shared
//! keyspace; bucket scoping happens above the driver via key prefixes.
//! redb gives us what the driver contract demands for free: MVCC snapshots
//! for readers, serialized writers, and atomic commit with rollback on
//! drop.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use redb::{
    Database, Durability, ReadOnlyTable, ReadTransaction, ReadableTable, TableDefinition,
    TableError, WriteTransaction,
};
use snafu::ensure;

use crate::driver::{Connection, Driver, KvTx};
use crate::error::{ConnectionFailedSnafu, DatabaseClosedSnafu, Error, ReadOnlySnafu, Result};
use crate::flags::DatabaseFlags;

/// The single table holding the shared keyspace.
const KEYSPACE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("burrow");

/// Driver for `redb://<path>` URIs.
pub struct RedbDriver;

impl Driver for RedbDriver {
    fn connect(&self, path: &str, flags: DatabaseFlags) -> Result<Arc<dyn Connection>> {
        let exists = Path::new(path).exists();
        ensure!(
            exists || flags.contains(DatabaseFlags::CREATE_IF_NOT_EXISTS),
            ConnectionFailedSnafu { path, message: "store does not exist" }
        );

        let opened = if exists { Database::open(path) } else { Database::create(path) };
        let db = opened.map_err(|e| Error::ConnectionFailed {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        let conn = RedbConnection {
            db,
            read_only: flags.contains(DatabaseFlags::READ_ONLY),
            disable_sync: flags.contains(DatabaseFlags::DISABLE_SYNC),
            closed: AtomicBool::new(false),
        };

        // Materialize the keyspace table so read transactions on a fresh
        // store do not race its creation.
        if !conn.read_only {
            let txn = conn.db.begin_write().map_err(Error::driver)?;
            txn.open_table(KEYSPACE).map_err(Error::driver)?;
            txn.commit().map_err(Error::driver)?;
        }

        Ok(Arc::new(conn))
    }
}

struct RedbConnection {
    db: Database,
    read_only: bool,
    disable_sync: bool,
    closed: AtomicBool,
}

impl Connection for RedbConnection {
    fn begin_read(&self) -> Result<Box<dyn KvTx>> {
        ensure!(!self.closed.load(Ordering::Acquire), DatabaseClosedSnafu);

        let txn = self.db.begin_read().map_err(Error::driver)?;
        let table = match txn.open_table(KEYSPACE) {
            Ok(table) => Some(table),
            Err(TableError::TableDoesNotExist(_)) => None,
            Err(e) => return Err(Error::driver(e)),
        };

        Ok(Box::new(RedbReadTx { _txn: txn, table }))
    }

    fn begin_write(&self) -> Result<Box<dyn KvTx>> {
        ensure!(!self.closed.load(Ordering::Acquire), DatabaseClosedSnafu);
        ensure!(!self.read_only, ReadOnlySnafu);

        let mut txn = self.db.begin_write().map_err(Error::driver)?;
        if self.disable_sync {
            txn.set_durability(Durability::Eventual);
        }

        Ok(Box::new(RedbWriteTx { txn }))
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Read transaction holding an owned snapshot table.
struct RedbReadTx {
    _txn: ReadTransaction,
    /// Absent when the store predates the keyspace table (read-only open of
    /// an empty file); reads then see an empty store.
    table: Option<ReadOnlyTable<&'static [u8], &'static [u8]>>,
}

impl KvTx for RedbReadTx {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(table) = &self.table else {
            return Ok(None);
        };
        let guard = table.get(key).map_err(Error::driver)?;
        Ok(guard.map(|g| g.value().to_vec()))
    }

    fn set(&mut self, _key: &[u8], _value: &[u8]) -> Result<()> {
        ReadOnlySnafu.fail()
    }

    fn remove(&mut self, _key: &[u8]) -> Result<()> {
        ReadOnlySnafu.fail()
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let Some(table) = &self.table else {
            return Ok(Vec::new());
        };
        collect_prefix(table, prefix)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}

/// Write transaction; the keyspace table is reopened per operation.
struct RedbWriteTx {
    txn: WriteTransaction,
}

impl KvTx for RedbWriteTx {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = self.txn.open_table(KEYSPACE).map_err(Error::driver)?;
        let guard = table.get(key).map_err(Error::driver)?;
        Ok(guard.map(|g| g.value().to_vec()))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut table = self.txn.open_table(KEYSPACE).map_err(Error::driver)?;
        table.insert(key, value).map_err(Error::driver)?;
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<()> {
        let mut table = self.txn.open_table(KEYSPACE).map_err(Error::driver)?;
        table.remove(key).map_err(Error::driver)?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let table = self.txn.open_table(KEYSPACE).map_err(Error::driver)?;
        collect_prefix(&table, prefix)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.txn.commit().map_err(Error::driver)
    }

    fn rollback(self: Box<Self>) {
        let _ = self.txn.abort();
    }
}

/// Range-scans from `prefix` and stops at the first key past it.
fn collect_prefix(
    table: &impl ReadableTable<&'static [u8], &'static [u8]>,
    prefix: &[u8],
) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut entries = Vec::new();
    for item in table.range(prefix..).map_err(Error::driver)? {
        let (key, value) = item.map_err(Error::driver)?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        entries.push((key.to_vec(), value.value().to_vec()));
    }
    Ok(entries)
}
