//! Error types for the Burrow store.

use snafu::Snafu;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during store operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The URI scheme has no registered driver, or the URI is malformed.
    #[snafu(display("Unsupported driver: {uri}"))]
    UnsupportedDriver {
        /// The offending URI.
        uri: String,
    },

    /// The backing store could not be opened.
    #[snafu(display("Failed to open store at {path}: {message}"))]
    ConnectionFailed {
        /// Path handed to the driver.
        path: String,
        /// Engine-reported reason.
        message: String,
    },

    /// A write was attempted on a read-only transaction.
    #[snafu(display("Write attempted on a read-only transaction"))]
    ReadOnly,

    /// An operation was attempted on a committed or rolled-back transaction.
    #[snafu(display("Transaction is closed"))]
    TransactionClosed,

    /// An operation was attempted on a closed database connection.
    #[snafu(display("Database is closed"))]
    DatabaseClosed,

    /// The named bucket does not exist.
    #[snafu(display("Bucket not found: {name}"))]
    BucketNotFound {
        /// The bucket name, lossily decoded for display.
        name: String,
    },

    /// A create was attempted on a name that is already bound.
    #[snafu(display("Bucket already exists: {name}"))]
    BucketAlreadyExists {
        /// The bucket name, lossily decoded for display.
        name: String,
    },

    /// Bucket names must be non-empty byte sequences.
    #[snafu(display("Bucket name must not be empty"))]
    InvalidBucketName,

    /// Entry keys must be non-empty byte sequences.
    #[snafu(display("Entry key must not be empty"))]
    InvalidKey,

    /// A typed helper that promises presence found nothing.
    #[snafu(display("Key not found"))]
    KeyNotFound,

    /// Stored bytes could not be decoded into the requested type.
    #[snafu(display("Cannot decode {type_name} from {len} bytes"))]
    Decode {
        /// Name of the requested type.
        type_name: &'static str,
        /// Length of the undecodable slice.
        len: usize,
    },

    /// A scoped callback panicked; the transaction was rolled back.
    #[snafu(display("Callback panicked: {message}"))]
    Callback {
        /// The panic payload, stringified.
        message: String,
    },

    /// Wrapped failure from the underlying storage engine.
    #[snafu(display("Driver error: {message}"))]
    Driver {
        /// Engine-reported reason.
        message: String,
    },
}

impl Error {
    /// Wraps an engine failure, preserving its message.
    pub(crate) fn driver(source: impl std::fmt::Display) -> Self {
        Error::Driver { message: source.to_string() }
    }
}
