//! Model descriptors: how a record shape maps onto buckets.
//!
//! A [`Model`] carries a compile-time descriptor of its fields. Each field
//! is either a scalar (optionally indexed for equality lookup) or a slice
//! (an ordered multi-valued field with set semantics). The descriptor's
//! fn-pointer accessors move encoded bytes in and out of the record, so
//! the mapping layer never needs reflection.
//!
//! Descriptors are written by hand; the shape is deliberately flat so an
//! implementation takes a handful of lines per field:
//!
//! ```
//! use burrow_model::{FieldCodec, FieldSpec, Model};
//! use burrow_store::Datum;
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! impl Model for User {
//!     const NAME: &'static str = "User";
//!     type Key = u64;
//!
//!     fn key(&self) -> u64 {
//!         self.id
//!     }
//!
//!     fn fields() -> &'static [FieldSpec<Self>] {
//!         const FIELDS: &[FieldSpec<User>] = &[
//!             FieldSpec {
//!                 name: "id",
//!                 codec: FieldCodec::Scalar {
//!                     get: |u: &User| u.id.encode(),
//!                     set: |u: &mut User, b: &[u8]| {
//!                         u.id = u64::decode(b)?;
//!                         Ok(())
//!                     },
//!                     indexed: false,
//!                 },
//!             },
//!             FieldSpec {
//!                 name: "name",
//!                 codec: FieldCodec::Scalar {
//!                     get: |u: &User| u.name.encode(),
//!                     set: |u: &mut User, b: &[u8]| {
//!                         u.name = String::decode(b)?;
//!                         Ok(())
//!                     },
//!                     indexed: false,
//!                 },
//!             },
//!         ];
//!         FIELDS
//!     }
//! }
//! ```

use burrow_store::Datum;

/// How one field moves between the record and its encoded form.
pub enum FieldCodec<M> {
    /// A single encodable value stored in the record's row bucket.
    Scalar {
        /// Encodes the field's current value.
        get: fn(&M) -> Vec<u8>,
        /// Decodes bytes into the field.
        set: fn(&mut M, &[u8]) -> Result<(), burrow_store::Error>,
        /// Whether the field is equality-indexed.
        indexed: bool,
    },
    /// An ordered multi-valued field stored in a per-record bucket.
    ///
    /// Elements are stored as keys, so duplicates collapse and iteration
    /// yields encoded-key order.
    Slice {
        /// Encodes every element of the field.
        get: fn(&M) -> Vec<Vec<u8>>,
        /// Decodes one element and appends it to the field.
        push: fn(&mut M, &[u8]) -> Result<(), burrow_store::Error>,
    },
}

/// One field of a model: its name plus its codec.
pub struct FieldSpec<M> {
    /// The field name; part of the on-disk bucket/entry naming contract.
    pub name: &'static str,
    /// The field's codec.
    pub codec: FieldCodec<M>,
}

/// A record shape that maps onto the bucket layout.
///
/// Each model owns one model bucket (`NAME`), one row bucket per record,
/// one index bucket per indexed field, and one slice bucket per
/// (record, slice field). See [`ModelStore`](crate::ModelStore) for the
/// operations that maintain them.
pub trait Model: Default + Sized {
    /// The model name; also the model bucket's name.
    const NAME: &'static str;

    /// The primary key type.
    type Key: Datum;

    /// Returns the record's primary key.
    fn key(&self) -> Self::Key;

    /// The field descriptors, in declaration order.
    fn fields() -> &'static [FieldSpec<Self>];
}

/// Name of the per-record row bucket: `<Model>.<lowercase-hex(pkey)>`.
pub(crate) fn row_bucket_name(model: &str, encoded_key: &[u8]) -> String {
    format!("{}.{}", model, hex::encode(encoded_key))
}

/// Name of a per-field index bucket: `<Model>.<field>.index`.
pub(crate) fn index_bucket_name(model: &str, field: &str) -> String {
    format!("{model}.{field}.index")
}

/// Name of a per-record slice bucket: `<Model>.<lowercase-hex(pkey)>.<field>`.
pub(crate) fn slice_bucket_name(model: &str, encoded_key: &[u8], field: &str) -> String {
    format!("{}.{}.{}", model, hex::encode(encoded_key), field)
}
