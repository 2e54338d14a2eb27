//! Bucket identity management over the shared keyspace.
//!
//! Every user-visible entry of a bucket with identity `I` is stored under
//! the real key `be32(I) ++ user_key`, so ordered iteration of a bucket is
//! a prefix scan. Identity 0 is reserved for the manager's own state, kept
//! under tagged keys in that prefix:
//!
//! - `[0,0,0,0,'n'] ++ name -> be32(identity)`: the name map, which also
//!   drives `buckets()` listing in name order.
//! - `[0,0,0,0,'f'] ++ be32(identity) -> ""`: released identities, popped
//!   smallest-first on the next create.
//! - `[0,0,0,0,'s'] -> be32(identity)`: allocation high-water mark. It
//!   never decrements; reuse always comes from the free list, which keeps
//!   the identity space dense.

use snafu::{ensure, OptionExt};

use crate::codec::Datum;
use crate::driver::KvTx;
use crate::error::{
    BucketAlreadyExistsSnafu, BucketNotFoundSnafu, InvalidBucketNameSnafu, Result,
};

/// Bucket names under this prefix are reserved for internal state and are
/// refused on create.
pub const RESERVED_NAME_PREFIX: &[u8] = b"$meta:";

const META_ID: [u8; 4] = [0, 0, 0, 0];
const TAG_NAMES: u8 = b'n';
const TAG_FREE: u8 = b'f';
const TAG_SEQUENCE: u8 = b's';

/// A handle to a named bucket within one transaction.
///
/// The handle itself is plain data (identity + name); it stays meaningful
/// only for the lifetime of the transaction it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    id: u32,
    name: Vec<u8>,
}

impl Bucket {
    pub(crate) fn new(id: u32, name: Vec<u8>) -> Self {
        Self { id, name }
    }

    /// The numeric identity backing this bucket's key prefix.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The user-chosen bucket name.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// The on-disk key prefix shared by all entries of this bucket.
    pub(crate) fn key_prefix(&self) -> [u8; 4] {
        self.id.to_be_bytes()
    }

    /// Builds the real keyspace key for `key` within this bucket.
    pub(crate) fn raw_key(&self, key: &[u8]) -> Vec<u8> {
        let mut raw = Vec::with_capacity(4 + key.len());
        raw.extend_from_slice(&self.key_prefix());
        raw.extend_from_slice(key);
        raw
    }
}

fn tag_prefix(tag: u8) -> [u8; 5] {
    [META_ID[0], META_ID[1], META_ID[2], META_ID[3], tag]
}

fn name_key(name: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(5 + name.len());
    key.extend_from_slice(&tag_prefix(TAG_NAMES));
    key.extend_from_slice(name);
    key
}

fn free_key(id: u32) -> Vec<u8> {
    let mut key = tag_prefix(TAG_FREE).to_vec();
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn display_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

/// Creates a new bucket, failing if the name is already bound.
pub(crate) fn create(kv: &mut dyn KvTx, name: &[u8]) -> Result<Bucket> {
    ensure!(!name.is_empty(), InvalidBucketNameSnafu);
    ensure!(
        !name.starts_with(RESERVED_NAME_PREFIX),
        BucketAlreadyExistsSnafu { name: display_name(name) }
    );
    ensure!(
        kv.get(&name_key(name))?.is_none(),
        BucketAlreadyExistsSnafu { name: display_name(name) }
    );

    let id = allocate(kv)?;
    kv.set(&name_key(name), &id.to_be_bytes())?;
    tracing::debug!(name = %display_name(name), id, "bucket created");
    Ok(Bucket::new(id, name.to_vec()))
}

/// Looks up a bucket by name.
pub(crate) fn lookup(kv: &dyn KvTx, name: &[u8]) -> Result<Option<Bucket>> {
    if name.is_empty() || name.starts_with(RESERVED_NAME_PREFIX) {
        return Ok(None);
    }
    match kv.get(&name_key(name))? {
        Some(id) => Ok(Some(Bucket::new(u32::decode(&id)?, name.to_vec()))),
        None => Ok(None),
    }
}

/// Removes a bucket: erases all its entries, unbinds the name, and releases
/// the identity for reuse.
pub(crate) fn remove(kv: &mut dyn KvTx, name: &[u8]) -> Result<()> {
    let bucket =
        lookup(kv, name)?.context(BucketNotFoundSnafu { name: display_name(name) })?;

    for (key, _) in kv.scan_prefix(&bucket.key_prefix())? {
        kv.remove(&key)?;
    }
    kv.remove(&name_key(name))?;
    kv.set(&free_key(bucket.id()), &[])?;
    tracing::debug!(name = %display_name(name), id = bucket.id(), "bucket removed");
    Ok(())
}

/// Lists all live buckets as `(name, handle)` pairs in name order.
pub(crate) fn list(kv: &dyn KvTx) -> Result<Vec<(Vec<u8>, Bucket)>> {
    let prefix_len = tag_prefix(TAG_NAMES).len();
    kv.scan_prefix(&tag_prefix(TAG_NAMES))?
        .into_iter()
        .map(|(key, value)| {
            let name = key[prefix_len..].to_vec();
            let id = u32::decode(&value)?;
            Ok((name.clone(), Bucket::new(id, name)))
        })
        .collect()
}

/// Picks the next identity: smallest released one, else high-water + 1.
fn allocate(kv: &mut dyn KvTx) -> Result<u32> {
    let released = kv.scan_prefix(&tag_prefix(TAG_FREE))?;
    if let Some((key, _)) = released.into_iter().next() {
        let id = u32::decode(&key[tag_prefix(TAG_FREE).len()..])?;
        kv.remove(&key)?;
        return Ok(id);
    }

    let next = match kv.get(&tag_prefix(TAG_SEQUENCE))? {
        Some(bytes) => u32::decode(&bytes)? + 1,
        None => 1,
    };
    kv.set(&tag_prefix(TAG_SEQUENCE), &next.to_be_bytes())?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::memory::MemoryDriver;
    use crate::driver::{Connection, Driver};
    use crate::flags::DatabaseFlags;
    use crate::Error;
    use std::sync::Arc;

    fn write_tx() -> (Arc<dyn Connection>, Box<dyn KvTx>) {
        let conn = MemoryDriver.connect("", DatabaseFlags::empty()).unwrap();
        let tx = conn.begin_write().unwrap();
        (conn, tx)
    }

    #[test]
    fn test_identities_start_at_one_and_increment() {
        let (_conn, mut kv) = write_tx();
        for expected in 1..=5u32 {
            let bucket = create(kv.as_mut(), expected.to_string().as_bytes()).unwrap();
            assert_eq!(bucket.id(), expected);
        }
    }

    #[test]
    fn test_create_rejects_duplicate_name() {
        let (_conn, mut kv) = write_tx();
        create(kv.as_mut(), b"dup").unwrap();
        assert!(matches!(
            create(kv.as_mut(), b"dup"),
            Err(Error::BucketAlreadyExists { .. })
        ));
    }

    #[test]
    fn test_create_rejects_empty_and_reserved_names() {
        let (_conn, mut kv) = write_tx();
        assert!(matches!(create(kv.as_mut(), b""), Err(Error::InvalidBucketName)));
        assert!(matches!(
            create(kv.as_mut(), b"$meta:names"),
            Err(Error::BucketAlreadyExists { .. })
        ));
    }

    #[test]
    fn test_removed_identity_is_reused_smallest_first() {
        let (_conn, mut kv) = write_tx();
        for name in ["1", "2", "3", "4", "5"] {
            create(kv.as_mut(), name.as_bytes()).unwrap();
        }
        remove(kv.as_mut(), b"3").unwrap();
        remove(kv.as_mut(), b"2").unwrap();

        assert_eq!(create(kv.as_mut(), b"20").unwrap().id(), 2);
        assert_eq!(create(kv.as_mut(), b"21").unwrap().id(), 3);
        assert_eq!(create(kv.as_mut(), b"22").unwrap().id(), 6);
    }

    #[test]
    fn test_remove_erases_entries_and_name() {
        let (_conn, mut kv) = write_tx();
        let bucket = create(kv.as_mut(), b"b").unwrap();
        kv.set(&bucket.raw_key(b"k1"), b"v1").unwrap();
        kv.set(&bucket.raw_key(b"k2"), b"v2").unwrap();

        remove(kv.as_mut(), b"b").unwrap();

        assert!(lookup(kv.as_ref(), b"b").unwrap().is_none());
        assert!(kv.scan_prefix(&bucket.key_prefix()).unwrap().is_empty());
    }

    #[test]
    fn test_remove_unknown_name_is_not_found() {
        let (_conn, mut kv) = write_tx();
        assert!(matches!(
            remove(kv.as_mut(), b"ghost"),
            Err(Error::BucketNotFound { .. })
        ));
    }

    #[test]
    fn test_list_is_ordered_by_name() {
        let (_conn, mut kv) = write_tx();
        for name in ["zebra", "apple", "mango"] {
            create(kv.as_mut(), name.as_bytes()).unwrap();
        }
        let names: Vec<_> = list(kv.as_ref())
            .unwrap()
            .into_iter()
            .map(|(name, _)| String::from_utf8(name).unwrap())
            .collect();
        assert_eq!(names, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn test_entries_do_not_leak_across_buckets() {
        let (_conn, mut kv) = write_tx();
        let a = create(kv.as_mut(), b"a").unwrap();
        let b = create(kv.as_mut(), b"b").unwrap();
        kv.set(&a.raw_key(b"k"), b"in-a").unwrap();
        kv.set(&b.raw_key(b"k"), b"in-b").unwrap();

        assert_eq!(kv.get(&a.raw_key(b"k")).unwrap(), Some(b"in-a".to_vec()));
        assert_eq!(kv.scan_prefix(&a.key_prefix()).unwrap().len(), 1);
    }
}
