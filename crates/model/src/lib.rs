//! burrow-model: a thin record-mapping layer over the Burrow bucket store.
//!
//! A [`Model`] describes a record shape: one primary key, scalar fields
//! (optionally equality-indexed), and slice fields. [`ModelStore`]
//! persists records of that shape across a model bucket, per-row buckets,
//! per-index buckets, and per-slice buckets, keeping them consistent on
//! create/save/load/list/remove.
//!
//! ## Bucket naming
//!
//! The layout is part of the external contract; tools may iterate buckets
//! by name:
//!
//! - model bucket: `<Model>`
//! - row bucket: `<Model>.<lowercase-hex(encoded pkey)>`
//! - index bucket: `<Model>.<field>.index`
//! - slice bucket: `<Model>.<lowercase-hex(encoded pkey)>.<field>`
//!
//! ## Quick start
//!
//! ```no_run
//! use burrow_model::{FieldCodec, FieldSpec, Model, ModelStore};
//! use burrow_store::{Database, DatabaseFlags, Datum};
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//! # impl Model for User {
//! #     const NAME: &'static str = "User";
//! #     type Key = u64;
//! #     fn key(&self) -> u64 { self.id }
//! #     fn fields() -> &'static [FieldSpec<Self>] {
//! #         const FIELDS: &[FieldSpec<User>] = &[
//! #             FieldSpec { name: "id", codec: FieldCodec::Scalar {
//! #                 get: |u: &User| u.id.encode(),
//! #                 set: |u: &mut User, b: &[u8]| { u.id = u64::decode(b)?; Ok(()) },
//! #                 indexed: false } },
//! #             FieldSpec { name: "name", codec: FieldCodec::Scalar {
//! #                 get: |u: &User| u.name.encode(),
//! #                 set: |u: &mut User, b: &[u8]| { u.name = String::decode(b)?; Ok(()) },
//! #                 indexed: false } },
//! #         ];
//! #         FIELDS
//! #     }
//! # }
//!
//! let db = Database::open("memory://users", DatabaseFlags::empty())?;
//! db.update(|tx| ModelStore::create_model::<User>(tx))?;
//! db.update(|tx| ModelStore::save(tx, &User { id: 42, name: "ada".into() }))?;
//! let user: User = db.view(|tx| ModelStore::load(tx, &42))?;
//! assert_eq!(user.name, "ada");
//! # Ok::<(), burrow_model::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod model;
mod store;

pub use error::{Error, Result};
pub use model::{FieldCodec, FieldSpec, Model};
pub use store::{ModelIter, ModelStore};
