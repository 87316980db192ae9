use super::RecordStore;
use crate::{OwnerId, Record, RecordId, StoreError};
use parking_lot::Mutex;

#[derive(Debug)]
struct Rows {
    /// `None` once the identifier range is used up.
    next_id: Option<RecordId>,
    records: Vec<Record>,
}

impl Default for Rows {
    fn default() -> Self {
        Self {
            next_id: Some(1),
            records: Vec::new(),
        }
    }
}

impl Rows {
    fn allocate(&mut self) -> Result<RecordId, StoreError> {
        let id = self.next_id.ok_or_else(exhausted)?;
        self.next_id = id.checked_add(1);
        Ok(id)
    }

    fn reserve_past(&mut self, id: RecordId) {
        if self.next_id.is_some_and(|next| next <= id) {
            self.next_id = id.checked_add(1);
        }
    }
}

fn exhausted() -> StoreError {
    StoreError::Unavailable {
        reason: format!("record id range exhausted after {}", RecordId::MAX),
    }
}

/// In-process [`RecordStore`]. Every operation takes a single mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Rows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store that already holds `records`, keeping their
    /// identifiers. Unassigned records are given the next free identifier.
    pub fn seeded(records: impl IntoIterator<Item = Record>) -> Result<Self, StoreError> {
        let mut rows = Rows::default();
        for record in records {
            let record = if record.is_assigned() {
                record
            } else {
                let id = rows.allocate()?;
                record.with_id(id)
            };
            rows.reserve_past(record.id);
            rows.records.push(record);
        }
        rows.records.sort_by_key(|record| record.id);

        Ok(Self {
            rows: Mutex::new(rows),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryStore {
    fn insert(&self, record: &Record) -> Result<RecordId, StoreError> {
        let mut rows = self.rows.lock();
        let id = rows.allocate()?;
        rows.records.push(record.clone().with_id(id));
        Ok(id)
    }

    fn list_all(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.rows.lock().records.clone())
    }

    fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .rows
            .lock()
            .records
            .iter()
            .filter(|record| record.owner_id == owner_id)
            .cloned()
            .collect())
    }

    fn delete_by_owner(&self, owner_id: OwnerId) -> Result<(), StoreError> {
        self.rows
            .lock()
            .records
            .retain(|record| record.owner_id != owner_id);
        Ok(())
    }

    fn truncate(&self) -> Result<(), StoreError> {
        *self.rows.lock() = Rows::default();
        Ok(())
    }
}
