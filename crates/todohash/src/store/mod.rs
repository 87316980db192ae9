//! Record storage.
//!
//! [`RecordStore`] is the storage seam used by the hashing service and the
//! gRPC handlers. Two backends ship with the crate:
//!
//! - [`MemoryStore`]: mutex-guarded, process-local. Used as a test double and
//!   for ephemeral servers.
//! - [`SqliteStore`] (feature `sqlite`): a single `records` table.
//!
//! Identifiers are assigned sequentially from 1 in insertion order, list
//! operations return records in ascending identifier order, and
//! [`RecordStore::truncate`] restarts the sequence.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use crate::{OwnerId, Record, RecordId, StoreError};
use std::sync::Arc;

/// Owner-scoped record persistence.
///
/// Implementations are synchronous and must be safe to share across threads.
/// Async callers should go through [`run_blocking`].
pub trait RecordStore: Send + Sync {
    /// Stores `record` (ignoring its current `id`) and returns the assigned
    /// identifier.
    fn insert(&self, record: &Record) -> Result<RecordId, StoreError>;

    /// Returns every stored record.
    fn list_all(&self) -> Result<Vec<Record>, StoreError>;

    /// Returns every record owned by `owner_id`.
    fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Record>, StoreError>;

    /// Removes every record owned by `owner_id`.
    fn delete_by_owner(&self, owner_id: OwnerId) -> Result<(), StoreError>;

    /// Removes every record and restarts identifier assignment at 1.
    fn truncate(&self) -> Result<(), StoreError>;
}

/// Runs a store call on Tokio's blocking pool.
///
/// A store call that panics or is torn down by runtime shutdown surfaces as
/// [`StoreError::Unavailable`].
pub async fn run_blocking<S, T, F>(store: &Arc<S>, call: F) -> Result<T, StoreError>
where
    S: RecordStore + ?Sized + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || call(&*store))
        .await
        .map_err(|e| StoreError::Unavailable {
            reason: e.to_string(),
        })?
}
