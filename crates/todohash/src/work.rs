use crate::{Error, HashedRecord, OwnerId, Record, RecordId, Result, Scope};
use core::time::Duration;

/// Modulus applied to `id + owner_id` when hashing a record.
pub const HASH_MODULUS: i64 = 291_391;

/// Simulated processing time of a single work unit.
pub const DEFAULT_HASH_DELAY: Duration = Duration::from_millis(500);

/// Computes `(id + owner_id) % HASH_MODULUS`.
///
/// The sum is taken in 64 bits so extreme identifiers cannot overflow. For
/// non-negative inputs the result is non-negative.
pub fn compute_hash(id: RecordId, owner_id: OwnerId) -> i32 {
    let hash = (i64::from(id) + i64::from(owner_id)) % HASH_MODULUS;
    // |hash| < HASH_MODULUS, which fits in an i32.
    hash as i32
}

/// A deferred hash computation bound to one record.
///
/// Consumed exactly once by [`WorkUnit::run`].
#[derive(Clone, Debug)]
pub struct WorkUnit {
    record: Record,
    delay: Duration,
}

impl WorkUnit {
    pub const fn new(record: Record, delay: Duration) -> Self {
        Self { record, delay }
    }

    pub const fn record(&self) -> &Record {
        &self.record
    }

    /// Waits out the simulated processing time, then hashes the record.
    ///
    /// Returns [`Error::Canceled`] without doing any further work if `scope`
    /// is cancelled or expires first.
    pub async fn run(self, scope: Scope) -> Result<HashedRecord> {
        tokio::select! {
            biased;
            () = scope.done() => Err(Error::Canceled),
            () = tokio::time::sleep(self.delay) => {
                let hash = compute_hash(self.record.id, self.record.owner_id);
                Ok(HashedRecord {
                    record: self.record,
                    hash,
                })
            }
        }
    }
}
