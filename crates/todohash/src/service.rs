//! Record hashing service.
//!
//! [`HashingService::hash_owner_records`] drives one request through these
//! states:
//!
//! 1. **Fetching**: list the owner's records. A store error ends the request
//!    as [`Error::Store`].
//! 2. **Dispatching**: one [`WorkUnit`] per record. No records means an empty
//!    result right away.
//! 3. **Running**: aggregate the work units with the configured [`Strategy`]
//!    under the caller's scope.
//! 4. **Completed / Failed / TimedOut**: on failure the caller's scope is
//!    checked; if it is done, the request timed out, otherwise the worker's
//!    error is returned.

use crate::{
    DEFAULT_HASH_DELAY, Error, HashedRecord, OwnerId, RecordStore, Result, Scope, Strategy,
    WorkUnit, aggregate, run_blocking,
};
use core::time::Duration;
use std::sync::Arc;

/// Tuning for [`HashingService`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashingConfig {
    /// Simulated processing time of each work unit.
    pub delay: Duration,
    /// How worker outputs are collected.
    pub strategy: Strategy,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_HASH_DELAY,
            strategy: Strategy::default(),
        }
    }
}

/// Computes hashes for every record an owner holds.
pub struct HashingService<S: ?Sized> {
    store: Arc<S>,
    config: HashingConfig,
}

impl<S: ?Sized> Clone for HashingService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl<S> HashingService<S>
where
    S: RecordStore + ?Sized + 'static,
{
    pub const fn new(store: Arc<S>, config: HashingConfig) -> Self {
        Self { store, config }
    }

    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub const fn config(&self) -> HashingConfig {
        self.config
    }

    /// Returns every record of `owner_id` annotated with its hash.
    ///
    /// The response is all-or-nothing: partial results are never returned.
    /// An owner without records yields an empty `Vec` and incurs no wait.
    ///
    /// # Errors
    ///
    /// - [`Error::Store`] if the records could not be listed.
    /// - [`Error::TimedOut`] if `scope` finished before every record was
    ///   hashed.
    /// - The first worker error (for hashing, [`Error::Canceled`]) otherwise.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, scope)))]
    pub async fn hash_owner_records(
        &self,
        scope: &Scope,
        owner_id: OwnerId,
    ) -> Result<Vec<HashedRecord>> {
        let records = run_blocking(&self.store, move |store| store.list_by_owner(owner_id)).await?;

        if records.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::debug!("No records to hash");
            return Ok(Vec::new());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Dispatching {} work units ({})",
            records.len(),
            self.config.strategy
        );

        let delay = self.config.delay;
        let outcome = aggregate(scope, self.config.strategy, records, move |scope, record| {
            WorkUnit::new(record, delay).run(scope)
        })
        .await;

        match outcome {
            Ok(hashed) => Ok(hashed),
            Err(_e) if scope.is_done() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Caller scope finished before hashing completed: {_e}");
                Err(Error::TimedOut)
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Hashing failed: {e}");
                Err(e)
            }
        }
    }
}
