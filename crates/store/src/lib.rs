//! burrow-store: an embedded, bucket-namespaced transactional key-value
//! store.
//!
//! Buckets are named namespaces of byte-ordered entries. Each bucket owns a
//! small numeric identity that prefixes its on-disk keys; identities are
//! reused smallest-first after deletion so prefixes stay short. A pluggable
//! driver supplies the ordered keyspace underneath; URI schemes select the
//! driver.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Database facade                │
//! │        (open by URI, view, update)          │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │               Transaction                    │
//! │   (typed + raw entry ops, commit/rollback)  │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │             Bucket manager                   │
//! │  (identity allocation, free list, listing)  │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │                Driver                        │
//! │       (redb file engine / in-memory)        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use burrow_store::{Database, DatabaseFlags};
//!
//! let db = Database::open("redb://./data.db", DatabaseFlags::CREATE_IF_NOT_EXISTS)?;
//!
//! db.update(|tx| {
//!     let bucket = tx.create_bucket_if_not_exists(b"users")?;
//!     tx.set(&bucket, b"1", b"john")
//! })?;
//!
//! db.view(|tx| {
//!     let bucket = tx.bucket(b"users")?.expect("created above");
//!     assert_eq!(tx.get(&bucket, b"1")?, Some(b"john".to_vec()));
//!     Ok::<_, burrow_store::Error>(())
//! })?;
//! # Ok::<(), burrow_store::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
// All unwraps in this crate are infallible:
// - write_u*::<BigEndian>().unwrap() on growable Vec<u8> buffers
#![allow(clippy::disallowed_methods)]

mod bucket;
mod codec;
mod db;
mod error;
mod flags;
mod transaction;

pub mod driver;

pub use bucket::{Bucket, RESERVED_NAME_PREFIX};
pub use codec::Datum;
pub use db::Database;
pub use error::{Error, Result};
pub use flags::DatabaseFlags;
pub use transaction::{BucketIter, Transaction};
