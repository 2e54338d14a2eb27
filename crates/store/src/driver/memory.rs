//! Ephemeral in-process driver.
//!
//! The whole keyspace is an immutable `BTreeMap` snapshot behind an
//! `Arc`. Readers clone the `Arc` (point-in-time view for free); the single
//! writer clones the map, mutates its private copy, and publishes it
//! atomically on commit. Every `connect` produces a fresh, empty store;
//! the URI path is ignored.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex, RwLock};
use snafu::ensure;

use crate::driver::{Connection, Driver, KvTx};
use crate::error::{DatabaseClosedSnafu, ReadOnlySnafu, Result};
use crate::flags::DatabaseFlags;

type Keyspace = BTreeMap<Vec<u8>, Vec<u8>>;

/// Driver for `memory://` URIs.
pub struct MemoryDriver;

impl Driver for MemoryDriver {
    fn connect(&self, _path: &str, flags: DatabaseFlags) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(MemoryConnection {
            current: Arc::new(RwLock::new(Arc::new(Keyspace::new()))),
            writer: Arc::new(Mutex::new(())),
            read_only: flags.contains(DatabaseFlags::READ_ONLY),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryConnection {
    /// The last committed snapshot.
    current: Arc<RwLock<Arc<Keyspace>>>,
    /// Held for the lifetime of each write transaction.
    writer: Arc<Mutex<()>>,
    read_only: bool,
    closed: AtomicBool,
}

impl Connection for MemoryConnection {
    fn begin_read(&self) -> Result<Box<dyn KvTx>> {
        ensure!(!self.closed.load(Ordering::Acquire), DatabaseClosedSnafu);
        Ok(Box::new(MemoryReadTx { snapshot: Arc::clone(&self.current.read()) }))
    }

    fn begin_write(&self) -> Result<Box<dyn KvTx>> {
        ensure!(!self.closed.load(Ordering::Acquire), DatabaseClosedSnafu);
        ensure!(!self.read_only, ReadOnlySnafu);

        let guard = self.writer.lock_arc();
        let working = (**self.current.read()).clone();
        Ok(Box::new(MemoryWriteTx { current: Arc::clone(&self.current), _guard: guard, working }))
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

struct MemoryReadTx {
    snapshot: Arc<Keyspace>,
}

impl KvTx for MemoryReadTx {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.snapshot.get(key).cloned())
    }

    fn set(&mut self, _key: &[u8], _value: &[u8]) -> Result<()> {
        ReadOnlySnafu.fail()
    }

    fn remove(&mut self, _key: &[u8]) -> Result<()> {
        ReadOnlySnafu.fail()
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(collect_prefix(&self.snapshot, prefix))
    }

    fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}

struct MemoryWriteTx {
    current: Arc<RwLock<Arc<Keyspace>>>,
    _guard: ArcMutexGuard<RawMutex, ()>,
    working: Keyspace,
}

impl KvTx for MemoryWriteTx {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.working.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.working.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<()> {
        self.working.remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(collect_prefix(&self.working, prefix))
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let MemoryWriteTx { current, _guard, working } = *self;
        *current.write() = Arc::new(working);
        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}

fn collect_prefix(map: &Keyspace, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    map.range(prefix.to_vec()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect() -> Arc<dyn Connection> {
        MemoryDriver.connect("", DatabaseFlags::empty()).unwrap()
    }

    #[test]
    fn test_write_commit_read() {
        let conn = connect();

        let mut txn = conn.begin_write().unwrap();
        txn.set(b"k", b"v").unwrap();
        txn.commit().unwrap();

        let txn = conn.begin_read().unwrap();
        assert_eq!(txn.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_rollback_discards_writes() {
        let conn = connect();

        let mut txn = conn.begin_write().unwrap();
        txn.set(b"k", b"v").unwrap();
        txn.rollback();

        let txn = conn.begin_read().unwrap();
        assert_eq!(txn.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_readers_keep_snapshot_across_commit() {
        let conn = connect();

        let reader = conn.begin_read().unwrap();

        let mut writer = conn.begin_write().unwrap();
        writer.set(b"k", b"v").unwrap();
        writer.commit().unwrap();

        assert_eq!(reader.get(b"k").unwrap(), None);
        assert_eq!(conn.begin_read().unwrap().get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_writer_sees_own_uncommitted_writes() {
        let conn = connect();

        let mut txn = conn.begin_write().unwrap();
        txn.set(b"k", b"v").unwrap();
        assert_eq!(txn.get(b"k").unwrap(), Some(b"v".to_vec()));
        txn.remove(b"k").unwrap();
        assert_eq!(txn.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_scan_prefix_ordered() {
        let conn = connect();

        let mut txn = conn.begin_write().unwrap();
        for key in [&b"p/c"[..], b"p/a", b"q/x", b"p/b"] {
            txn.set(key, b"").unwrap();
        }
        let keys: Vec<_> = txn.scan_prefix(b"p/").unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"p/a".to_vec(), b"p/b".to_vec(), b"p/c".to_vec()]);
    }

    #[test]
    fn test_connections_are_isolated() {
        let first = connect();
        let second = connect();

        let mut txn = first.begin_write().unwrap();
        txn.set(b"k", b"v").unwrap();
        txn.commit().unwrap();

        assert_eq!(second.begin_read().unwrap().get(b"k").unwrap(), None);
    }

    #[test]
    fn test_close_fails_later_begins() {
        let conn = connect();
        conn.close().unwrap();
        conn.close().unwrap();
        assert!(conn.begin_read().is_err());
        assert!(conn.begin_write().is_err());
    }
}
