//! Error types for record storage and the hashing pipeline.
//!
//! - [`StoreError`]: a [`RecordStore`](crate::RecordStore) backend failed.
//! - [`Error`]: terminal outcome of a hashing request. Store failures are
//!   carried verbatim; cancellation and caller timeouts are reported as
//!   distinct kinds.

/// Failure reported by a [`RecordStore`](crate::RecordStore) backend.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The SQLite backend rejected the statement or connection.
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The store could not service the call at all (e.g. its task was torn
    /// down before completing).
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Terminal error for a hashing request.
///
/// None of these are retried internally; a request that fails returns no
/// partial results.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Propagated verbatim from the record store.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// A work unit observed its scope finish before its computation
    /// completed. This is what a failing worker reports.
    #[error("canceled or timed out")]
    Canceled,

    /// The caller's own scope expired or was cancelled while work was in
    /// flight.
    #[error("timed out")]
    TimedOut,
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
