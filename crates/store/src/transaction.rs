//! Transactions: the unit of atomicity over buckets.
//!
//! A [`Transaction`] wraps a driver transaction and mediates every bucket
//! and key-value operation. Reads see a snapshot consistent with the
//! transaction's start; writes are buffered by the driver and applied
//! atomically on [`commit`](Transaction::commit). Dropping an uncommitted
//! transaction rolls it back.
//!
//! After commit or rollback the handle is closed and every operation fails
//! with [`Error::TransactionClosed`](crate::Error::TransactionClosed);
//! [`reset`](Transaction::reset) re-arms the handle with a fresh driver
//! transaction of the same mode.

use std::sync::Arc;

use snafu::{ensure, OptionExt};

use crate::bucket::{self, Bucket};
use crate::codec::Datum;
use crate::driver::{Connection, KvTx};
use crate::error::{
    InvalidKeySnafu, KeyNotFoundSnafu, ReadOnlySnafu, Result, TransactionClosedSnafu,
};

/// A transaction over one database connection.
///
/// Owned by the thread that began it; buckets and entries obtained through
/// it are only meaningful while it is active.
pub struct Transaction {
    conn: Arc<dyn Connection>,
    kv: Option<Box<dyn KvTx>>,
    writable: bool,
}

impl Transaction {
    pub(crate) fn begin(conn: Arc<dyn Connection>, writable: bool) -> Result<Self> {
        let kv = if writable { conn.begin_write()? } else { conn.begin_read()? };
        Ok(Self { conn, kv: Some(kv), writable })
    }

    /// Whether this transaction accepts writes.
    pub fn writable(&self) -> bool {
        self.writable
    }

    fn kv(&self) -> Result<&(dyn KvTx + '_)> {
        self.kv.as_deref().context(TransactionClosedSnafu)
    }

    fn kv_mut(&mut self) -> Result<&mut (dyn KvTx + 'static)> {
        ensure!(self.writable, ReadOnlySnafu);
        self.kv.as_deref_mut().context(TransactionClosedSnafu)
    }

    /// Re-arms the handle with a fresh driver transaction of the same mode.
    ///
    /// Any in-flight work is rolled back first.
    pub fn reset(&mut self) -> Result<()> {
        self.rollback();
        self.kv = Some(if self.writable {
            self.conn.begin_write()?
        } else {
            self.conn.begin_read()?
        });
        Ok(())
    }

    /// Atomically applies all buffered writes and closes the handle.
    pub fn commit(&mut self) -> Result<()> {
        let kv = self.kv.take().context(TransactionClosedSnafu)?;
        kv.commit()
    }

    /// Discards all buffered writes and closes the handle. Idempotent.
    pub fn rollback(&mut self) {
        if let Some(kv) = self.kv.take() {
            kv.rollback();
        }
    }

    // ------------------------------------------------------------------
    // Raw byte-oriented entry operations
    // ------------------------------------------------------------------

    /// Inserts or overwrites `value` at `key` within `bucket`.
    pub fn set(&mut self, bucket: &Bucket, key: &[u8], value: &[u8]) -> Result<()> {
        ensure!(!key.is_empty(), InvalidKeySnafu);
        let raw = bucket.raw_key(key);
        self.kv_mut()?.set(&raw, value)
    }

    /// Reads the value at `key` within `bucket`, or `None` if absent.
    pub fn get(&self, bucket: &Bucket, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.kv()?.get(&bucket.raw_key(key))
    }

    /// Removes the entry at `key`. Succeeds whether or not it existed.
    pub fn remove(&mut self, bucket: &Bucket, key: &[u8]) -> Result<()> {
        let raw = bucket.raw_key(key);
        self.kv_mut()?.remove(&raw)
    }

    /// Iterates all entries of `bucket` in key order.
    ///
    /// Entries are materialized up front, so the iterator stays valid for
    /// the rest of the transaction regardless of later writes.
    pub fn iterate(&self, bucket: &Bucket) -> Result<BucketIter> {
        let prefix = bucket.key_prefix();
        let entries = self
            .kv()?
            .scan_prefix(&prefix)?
            .into_iter()
            .map(|(key, value)| (key[prefix.len()..].to_vec(), value))
            .collect::<Vec<_>>();
        Ok(BucketIter { entries: entries.into_iter() })
    }

    // ------------------------------------------------------------------
    // Typed entry operations
    // ------------------------------------------------------------------

    /// Typed upsert: encodes `key` and `value` through [`Datum`].
    pub fn put<K: Datum, V: Datum>(&mut self, bucket: &Bucket, key: &K, value: &V) -> Result<()> {
        self.set(bucket, &key.encode(), &value.encode())
    }

    /// Typed read. Returns `Ok(None)` for a missing key; a stored value
    /// that does not decode as `V` is an error.
    pub fn fetch<K: Datum, V: Datum>(&self, bucket: &Bucket, key: &K) -> Result<Option<V>> {
        match self.get(bucket, &key.encode())? {
            Some(bytes) => Ok(Some(V::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Typed read that promises presence; a missing key is
    /// [`Error::KeyNotFound`](crate::Error::KeyNotFound).
    pub fn require<K: Datum, V: Datum>(&self, bucket: &Bucket, key: &K) -> Result<V> {
        self.fetch(bucket, key)?.context(KeyNotFoundSnafu)
    }

    /// Typed remove.
    pub fn delete<K: Datum>(&mut self, bucket: &Bucket, key: &K) -> Result<()> {
        self.remove(bucket, &key.encode())
    }

    // ------------------------------------------------------------------
    // Bucket management
    // ------------------------------------------------------------------

    /// Creates a bucket, failing if the name is already bound.
    pub fn create_bucket(&mut self, name: &[u8]) -> Result<Bucket> {
        bucket::create(self.kv_mut()?, name)
    }

    /// Returns the named bucket, creating it if absent.
    pub fn create_bucket_if_not_exists(&mut self, name: &[u8]) -> Result<Bucket> {
        if let Some(existing) = bucket::lookup(self.kv()?, name)? {
            return Ok(existing);
        }
        bucket::create(self.kv_mut()?, name)
    }

    /// Looks up a bucket by name.
    pub fn bucket(&self, name: &[u8]) -> Result<Option<Bucket>> {
        bucket::lookup(self.kv()?, name)
    }

    /// Removes the named bucket together with all its entries, releasing
    /// its identity for reuse.
    pub fn remove_bucket(&mut self, name: &[u8]) -> Result<()> {
        bucket::remove(self.kv_mut()?, name)
    }

    /// Lists all buckets as `(name, handle)` pairs in name order.
    pub fn buckets(&self) -> Result<Vec<(Vec<u8>, Bucket)>> {
        bucket::list(self.kv()?)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.rollback();
    }
}

/// Ordered iterator over one bucket's entries.
pub struct BucketIter {
    entries: std::vec::IntoIter<(Vec<u8>, Vec<u8>)>,
}

impl Iterator for BucketIter {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for BucketIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::memory::MemoryDriver;
    use crate::driver::Driver;
    use crate::flags::DatabaseFlags;
    use crate::Error;

    fn conn() -> Arc<dyn Connection> {
        MemoryDriver.connect("", DatabaseFlags::empty()).unwrap()
    }

    #[test]
    fn test_set_get_remove_round_trip() {
        let conn = conn();
        let mut tx = Transaction::begin(conn, true).unwrap();
        let bucket = tx.create_bucket(b"b").unwrap();

        tx.set(&bucket, b"name", b"john").unwrap();
        assert_eq!(tx.get(&bucket, b"name").unwrap(), Some(b"john".to_vec()));

        tx.remove(&bucket, b"name").unwrap();
        assert_eq!(tx.get(&bucket, b"name").unwrap(), None);

        // Removing again is still fine.
        tx.remove(&bucket, b"name").unwrap();
    }

    #[test]
    fn test_set_rejects_empty_key() {
        let conn = conn();
        let mut tx = Transaction::begin(conn, true).unwrap();
        let bucket = tx.create_bucket(b"b").unwrap();
        assert!(matches!(tx.set(&bucket, b"", b"v"), Err(Error::InvalidKey)));
    }

    #[test]
    fn test_read_only_transaction_refuses_writes() {
        let conn = conn();
        {
            let mut tx = Transaction::begin(Arc::clone(&conn), true).unwrap();
            tx.create_bucket(b"b").unwrap();
            tx.commit().unwrap();
        }

        let mut tx = Transaction::begin(conn, false).unwrap();
        let bucket = tx.bucket(b"b").unwrap().unwrap();
        assert!(matches!(tx.set(&bucket, b"k", b"v"), Err(Error::ReadOnly)));
        assert!(matches!(tx.create_bucket(b"c"), Err(Error::ReadOnly)));
        assert!(matches!(tx.remove_bucket(b"b"), Err(Error::ReadOnly)));
    }

    #[test]
    fn test_operations_after_commit_fail_closed() {
        let conn = conn();
        let mut tx = Transaction::begin(conn, true).unwrap();
        let bucket = tx.create_bucket(b"b").unwrap();
        tx.commit().unwrap();

        assert!(matches!(tx.get(&bucket, b"k"), Err(Error::TransactionClosed)));
        assert!(matches!(tx.set(&bucket, b"k", b"v"), Err(Error::TransactionClosed)));
        assert!(matches!(tx.commit(), Err(Error::TransactionClosed)));
    }

    #[test]
    fn test_reset_rearms_a_committed_transaction() {
        let conn = conn();
        let mut tx = Transaction::begin(conn, true).unwrap();
        tx.create_bucket(b"b").unwrap();
        tx.commit().unwrap();

        tx.reset().unwrap();
        let bucket = tx.bucket(b"b").unwrap().unwrap();
        tx.set(&bucket, b"k", b"v").unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn test_typed_round_trip_and_missing_key() {
        let conn = conn();
        let mut tx = Transaction::begin(conn, true).unwrap();
        let bucket = tx.create_bucket(b"b").unwrap();

        tx.put(&bucket, &7u64, &"seven".to_string()).unwrap();
        assert_eq!(
            tx.fetch::<u64, String>(&bucket, &7).unwrap(),
            Some("seven".to_string())
        );
        assert_eq!(tx.fetch::<u64, String>(&bucket, &8).unwrap(), None);
        assert!(matches!(
            tx.require::<u64, String>(&bucket, &8),
            Err(Error::KeyNotFound)
        ));

        tx.delete(&bucket, &7u64).unwrap();
        assert_eq!(tx.fetch::<u64, String>(&bucket, &7).unwrap(), None);
    }

    #[test]
    fn test_fetch_surfaces_decode_failures() {
        let conn = conn();
        let mut tx = Transaction::begin(conn, true).unwrap();
        let bucket = tx.create_bucket(b"b").unwrap();

        tx.set(&bucket, b"k", b"not-eight-bytes").unwrap();
        let key = b"k".to_vec();
        assert!(matches!(
            tx.fetch::<Vec<u8>, u64>(&bucket, &key),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn test_iteration_is_byte_ordered() {
        let conn = conn();
        let mut tx = Transaction::begin(conn, true).unwrap();
        let bucket = tx.create_bucket(b"b").unwrap();

        for key in [&b"banana"[..], b"apple", b"cherry"] {
            tx.set(&bucket, key, b"").unwrap();
        }

        let keys: Vec<_> = tx.iterate(&bucket).unwrap().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"apple".to_vec(), b"banana".to_vec(), b"cherry".to_vec()]);
    }

    #[test]
    fn test_unsigned_keys_iterate_in_numeric_order() {
        let conn = conn();
        let mut tx = Transaction::begin(conn, true).unwrap();
        let bucket = tx.create_bucket(b"n").unwrap();

        for i in [300u32, 2, 1000, 1, 65536] {
            tx.put(&bucket, &i, &i).unwrap();
        }

        let keys: Vec<u32> = tx
            .iterate(&bucket)
            .unwrap()
            .map(|(k, _)| u32::decode(&k).unwrap())
            .collect();
        assert_eq!(keys, vec![1, 2, 300, 1000, 65536]);
    }

    #[test]
    fn test_create_bucket_if_not_exists_is_idempotent() {
        let conn = conn();
        let mut tx = Transaction::begin(conn, true).unwrap();
        let first = tx.create_bucket_if_not_exists(b"b").unwrap();
        let second = tx.create_bucket_if_not_exists(b"b").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_drop_rolls_back() {
        let conn = conn();
        {
            let mut tx = Transaction::begin(Arc::clone(&conn), true).unwrap();
            tx.create_bucket(b"b").unwrap();
            // Dropped without commit.
        }
        let tx = Transaction::begin(conn, false).unwrap();
        assert!(tx.bucket(b"b").unwrap().is_none());
    }
}
