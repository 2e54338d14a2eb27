//! Error types for the record-mapping layer.

use snafu::Snafu;

/// Result type alias for record operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during record operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// A lookup found no row for the given key or indexed value.
    #[snafu(display("No matching {model} record"))]
    NoMatchingRecord {
        /// The model name.
        model: &'static str,
    },

    /// A bucket referenced by stored data is missing mid-operation.
    #[snafu(display("Integrity error: bucket {bucket} is missing"))]
    Integrity {
        /// Name of the missing bucket.
        bucket: String,
    },

    /// Underlying store failure.
    #[snafu(context(false), display("{source}"))]
    Store {
        /// The store error.
        source: burrow_store::Error,
    },
}
