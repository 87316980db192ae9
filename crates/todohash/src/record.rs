/// Identifier assigned to a [`Record`] by a [`RecordStore`].
///
/// [`RecordStore`]: crate::RecordStore
pub type RecordId = i32;

/// Identifier grouping the records that belong to the same requester.
pub type OwnerId = i32;

/// Sentinel identifier carried by a [`Record`] the store has not seen yet.
pub const UNASSIGNED_ID: RecordId = -1;

/// A single owner-scoped record.
///
/// The `id` stays [`UNASSIGNED_ID`] until a store assigns one. From then on it
/// is stable and unique within that store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Record {
    pub id: RecordId,
    pub owner_id: OwnerId,
    pub payload: String,
}

impl Record {
    /// Creates a record that has not been stored yet.
    pub fn new(owner_id: OwnerId, payload: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            owner_id,
            payload: payload.into(),
        }
    }

    /// Returns a copy of this record carrying the store-assigned `id`.
    #[must_use]
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = id;
        self
    }

    /// Returns `true` once a store has assigned an identifier.
    pub const fn is_assigned(&self) -> bool {
        self.id != UNASSIGNED_ID
    }
}

/// A [`Record`] annotated with its derived hash.
///
/// Only produced by the hashing pipeline and never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HashedRecord {
    pub record: Record,
    pub hash: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_unassigned() {
        let record = Record::new(7, "write docs");
        assert_eq!(record.id, UNASSIGNED_ID);
        assert!(!record.is_assigned());
        assert_eq!(record.owner_id, 7);
        assert_eq!(record.payload, "write docs");
    }

    #[test]
    fn with_id_assigns_identifier() {
        let record = Record::new(1, "task").with_id(42);
        assert_eq!(record.id, 42);
        assert!(record.is_assigned());
    }
}
