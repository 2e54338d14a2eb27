//! Record persistence over the bucket layout.
//!
//! Every record of a model `M` is spread over:
//!
//! - the model bucket `M::NAME`, mapping `encode(pkey)` to the row bucket
//!   name,
//! - a row bucket holding `encode(field name) -> encode(value)` for scalar
//!   fields,
//! - one index bucket per indexed field, mapping `encode(value)` back to
//!   `encode(pkey)`,
//! - one bucket per slice field of the record, holding elements as keys.
//!
//! [`ModelStore::create_model`] creates the model and index buckets once;
//! [`ModelStore::save`] creates row and slice buckets lazily and keeps the
//! index buckets consistent; [`ModelStore::remove`] erases all of it.

use burrow_store::{Bucket, Datum, Transaction};
use snafu::OptionExt;

use crate::error::{IntegritySnafu, NoMatchingRecordSnafu, Result};
use crate::model::{index_bucket_name, row_bucket_name, slice_bucket_name, FieldCodec, Model};

/// Non-empty marker stored as the value of every slice element key. The
/// content is opaque; only presence matters.
const SLICE_MARK: &[u8] = &[0x00, 0x01];

/// Record operations over a [`Transaction`].
pub struct ModelStore;

impl ModelStore {
    /// Ensures the model bucket and every index bucket exist.
    ///
    /// Must run once (in a write transaction) before the first
    /// [`save`](Self::save) of a model.
    pub fn create_model<M: Model + 'static>(tx: &mut Transaction) -> Result<()> {
        tx.create_bucket_if_not_exists(M::NAME.as_bytes())?;
        for field in M::fields() {
            if let FieldCodec::Scalar { indexed: true, .. } = field.codec {
                tx.create_bucket_if_not_exists(index_bucket_name(M::NAME, field.name).as_bytes())?;
            }
        }
        tracing::debug!(model = M::NAME, "model buckets ensured");
        Ok(())
    }

    /// Persists `obj`, creating or updating its row.
    ///
    /// Index entries for changed indexed values are moved; slice buckets
    /// are rebuilt from scratch so removed elements disappear.
    pub fn save<M: Model + 'static>(tx: &mut Transaction, obj: &M) -> Result<()> {
        let pk = obj.key().encode();
        let row_name = row_bucket_name(M::NAME, &pk);

        // The previous row state drives index cleanup below.
        let previous: Option<M> = match Self::load_raw(tx, &pk) {
            Ok(old) => Some(old),
            Err(crate::Error::NoMatchingRecord { .. }) => None,
            Err(e) => return Err(e),
        };

        let model_bucket = Self::model_bucket::<M>(tx)?;
        tx.set(&model_bucket, &pk, row_name.as_bytes())?;
        let row_bucket = tx.create_bucket_if_not_exists(row_name.as_bytes())?;

        for field in M::fields() {
            match &field.codec {
                FieldCodec::Scalar { get, indexed, .. } => {
                    let value = get(obj);
                    tx.set(&row_bucket, field.name.as_bytes(), &value)?;

                    if *indexed {
                        let index_bucket = Self::index_bucket::<M>(tx, field.name)?;
                        if let Some(old) = &previous {
                            let old_value = get(old);
                            if old_value != value {
                                tx.remove(&index_bucket, &old_value)?;
                            }
                        }
                        tx.set(&index_bucket, &value, &pk)?;
                    }
                }
                FieldCodec::Slice { get, .. } => {
                    let slice_name = slice_bucket_name(M::NAME, &pk, field.name);
                    if tx.bucket(slice_name.as_bytes())?.is_some() {
                        tx.remove_bucket(slice_name.as_bytes())?;
                    }
                    let slice_bucket = tx.create_bucket(slice_name.as_bytes())?;
                    for element in get(obj) {
                        tx.set(&slice_bucket, &element, SLICE_MARK)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Loads the record with the given primary key.
    pub fn load<M: Model + 'static>(tx: &Transaction, key: &M::Key) -> Result<M> {
        Self::load_raw(tx, &key.encode())
    }

    /// Loads the record whose indexed `field` equals `value`.
    pub fn load_by_index<M: Model + 'static, V: Datum>(
        tx: &Transaction,
        field: &str,
        value: &V,
    ) -> Result<M> {
        let index_bucket = Self::index_bucket::<M>(tx, field)?;
        let pk = tx
            .get(&index_bucket, &value.encode())?
            .context(NoMatchingRecordSnafu { model: M::NAME })?;
        Self::load_raw(tx, &pk)
    }

    /// Iterates all records of `M` in primary-key order.
    ///
    /// Rows are loaded lazily; iteration stops at the first error.
    pub fn list<'tx, M: Model>(tx: &'tx Transaction) -> Result<ModelIter<'tx, M>> {
        let model_bucket = Self::model_bucket::<M>(tx)?;
        let entries: Vec<_> = tx.iterate(&model_bucket)?.collect();
        Ok(ModelIter { tx, entries: entries.into_iter(), failed: false, _marker: Default::default() })
    }

    /// Removes `obj`: its row bucket, its slice buckets, its model-bucket
    /// entry, and the index entries matching its indexed values.
    pub fn remove<M: Model + 'static>(tx: &mut Transaction, obj: &M) -> Result<()> {
        let pk = obj.key().encode();
        let row_name = row_bucket_name(M::NAME, &pk);

        for field in M::fields() {
            if let FieldCodec::Slice { .. } = field.codec {
                let slice_name = slice_bucket_name(M::NAME, &pk, field.name);
                if tx.bucket(slice_name.as_bytes())?.is_some() {
                    tx.remove_bucket(slice_name.as_bytes())?;
                }
            }
        }
        if tx.bucket(row_name.as_bytes())?.is_some() {
            tx.remove_bucket(row_name.as_bytes())?;
        }

        let model_bucket = Self::model_bucket::<M>(tx)?;
        tx.remove(&model_bucket, &pk)?;

        for field in M::fields() {
            if let FieldCodec::Scalar { get, indexed: true, .. } = &field.codec {
                let index_bucket = Self::index_bucket::<M>(tx, field.name)?;
                tx.remove(&index_bucket, &get(obj))?;
            }
        }

        Ok(())
    }

    /// Loads a record from its already-encoded primary key.
    fn load_raw<M: Model + 'static>(tx: &Transaction, pk: &[u8]) -> Result<M> {
        let model_bucket = Self::model_bucket::<M>(tx)?;
        let row_name = tx
            .get(&model_bucket, pk)?
            .context(NoMatchingRecordSnafu { model: M::NAME })?;
        let row_bucket = tx.bucket(&row_name)?.context(IntegritySnafu {
            bucket: String::from_utf8_lossy(&row_name).into_owned(),
        })?;

        let mut obj = M::default();
        for field in M::fields() {
            match &field.codec {
                FieldCodec::Scalar { set, .. } => {
                    // Missing entries leave the field at its default.
                    if let Some(bytes) = tx.get(&row_bucket, field.name.as_bytes())? {
                        set(&mut obj, &bytes)?;
                    }
                }
                FieldCodec::Slice { push, .. } => {
                    let slice_name = slice_bucket_name(M::NAME, pk, field.name);
                    if let Some(slice_bucket) = tx.bucket(slice_name.as_bytes())? {
                        for (element, _) in tx.iterate(&slice_bucket)? {
                            push(&mut obj, &element)?;
                        }
                    }
                }
            }
        }
        Ok(obj)
    }

    /// The model bucket, which must already exist.
    fn model_bucket<M: Model>(tx: &Transaction) -> Result<Bucket> {
        Ok(tx.bucket(M::NAME.as_bytes())?.ok_or_else(|| {
            burrow_store::Error::BucketNotFound { name: M::NAME.to_string() }
        })?)
    }

    /// The index bucket for `field`, which must already exist.
    fn index_bucket<M: Model>(tx: &Transaction, field: &str) -> Result<Bucket> {
        let name = index_bucket_name(M::NAME, field);
        Ok(tx.bucket(name.as_bytes())?.ok_or(burrow_store::Error::BucketNotFound { name })?)
    }
}

/// Lazy iterator over all records of a model, in primary-key order.
pub struct ModelIter<'tx, M: Model> {
    tx: &'tx Transaction,
    entries: std::vec::IntoIter<(Vec<u8>, Vec<u8>)>,
    failed: bool,
    _marker: std::marker::PhantomData<M>,
}

impl<M: Model + 'static> Iterator for ModelIter<'_, M> {
    type Item = Result<M>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (pk, _row_name) = self.entries.next()?;
        match ModelStore::load_raw(self.tx, &pk) {
            Ok(obj) => Some(Ok(obj)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
