//! Database facade: URI-based open and scoped transactions.
//!
//! [`Database::view`] and [`Database::update`] are the documented way to
//! run transactions: they guarantee release on every exit path, including
//! callback errors and panics. Explicit [`Database::begin_read`] /
//! [`Database::begin_write`] handles are available where scoping does not
//! fit; those rely on rollback-on-drop for the same guarantee.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use snafu::OptionExt;

use crate::driver::{parse_uri, registry, Connection};
use crate::error::{Error, Result, UnsupportedDriverSnafu};
use crate::flags::DatabaseFlags;
use crate::transaction::Transaction;

/// A handle to an open database.
///
/// Cheap to clone and shareable across threads; transactions obtained from
/// it are not.
#[derive(Clone)]
pub struct Database {
    conn: Arc<dyn Connection>,
}

impl Database {
    /// Opens a database through the driver selected by the URI scheme.
    ///
    /// Everything after the first `://` is passed to the driver verbatim.
    /// An unknown scheme or malformed URI fails with
    /// [`Error::UnsupportedDriver`].
    pub fn open(uri: &str, flags: DatabaseFlags) -> Result<Self> {
        let (scheme, rest) = parse_uri(uri)?;
        let driver = registry().find(scheme).context(UnsupportedDriverSnafu { uri })?;
        let conn = driver.connect(rest, flags)?;
        tracing::debug!(scheme, path = rest, "database opened");
        Ok(Self { conn })
    }

    /// Wraps an already-connected driver, bypassing the registry.
    pub fn from_connection(conn: Arc<dyn Connection>) -> Self {
        Self { conn }
    }

    /// Begins an explicit read-only transaction.
    pub fn begin_read(&self) -> Result<Transaction> {
        Transaction::begin(Arc::clone(&self.conn), false)
    }

    /// Begins an explicit read-write transaction.
    pub fn begin_write(&self) -> Result<Transaction> {
        Transaction::begin(Arc::clone(&self.conn), true)
    }

    /// Runs `f` inside a read-only transaction that is always released.
    ///
    /// A panic inside `f` is caught, the transaction rolled back, and the
    /// panic surfaced as [`Error::Callback`].
    pub fn view<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&Transaction) -> std::result::Result<T, E>,
    {
        let mut tx = self.begin_read()?;
        let outcome = catch_unwind(AssertUnwindSafe(|| f(&tx)));
        tx.rollback();
        match outcome {
            Ok(result) => result,
            Err(payload) => Err(E::from(Error::Callback { message: panic_message(payload) })),
        }
    }

    /// Runs `f` inside a read-write transaction: committed when `f`
    /// returns `Ok`, rolled back when it returns `Err` or panics.
    pub fn update<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&mut Transaction) -> std::result::Result<T, E>,
    {
        let mut tx = self.begin_write()?;
        match catch_unwind(AssertUnwindSafe(|| f(&mut tx))) {
            Ok(Ok(value)) => {
                tx.commit()?;
                Ok(value)
            }
            Ok(Err(e)) => {
                tracing::warn!("update rolled back: callback returned an error");
                tx.rollback();
                Err(e)
            }
            Err(payload) => {
                let message = panic_message(payload);
                tracing::warn!(message, "update rolled back: callback panicked");
                tx.rollback();
                Err(E::from(Error::Callback { message }))
            }
        }
    }

    /// Closes the underlying connection. Idempotent; transactions can no
    /// longer be started afterwards.
    pub fn close(&self) -> Result<()> {
        tracing::debug!("database closed");
        self.conn.close()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
