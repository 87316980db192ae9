use super::RecordStore;
use crate::{OwnerId, Record, RecordId, StoreError};
use parking_lot::Mutex;
use rusqlite::{Connection, Row, params};
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    payload  TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS records_owner_id ON records (owner_id);
";

/// [`RecordStore`] backed by a single SQLite connection.
///
/// Calls are serialized on the connection mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and ensures the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl core::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

fn to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        payload: row.get(2)?,
    })
}

impl RecordStore for SqliteStore {
    fn insert(&self, record: &Record) -> Result<RecordId, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO records (owner_id, payload) VALUES (?1, ?2)",
            params![record.owner_id, record.payload],
        )?;
        let rowid = conn.last_insert_rowid();
        RecordId::try_from(rowid).map_err(|_| StoreError::Unavailable {
            reason: format!("row id {rowid} exceeds the record id range"),
        })
    }

    fn list_all(&self) -> Result<Vec<Record>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, owner_id, payload FROM records ORDER BY id")?;
        let records = stmt
            .query_map([], to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Record>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, payload FROM records WHERE owner_id = ?1 ORDER BY id",
        )?;
        let records = stmt
            .query_map(params![owner_id], to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn delete_by_owner(&self, owner_id: OwnerId) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute("DELETE FROM records WHERE owner_id = ?1", params![owner_id])?;
        Ok(())
    }

    fn truncate(&self) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(
            "DELETE FROM records; DELETE FROM sqlite_sequence WHERE name = 'records';",
        )?;
        Ok(())
    }
}
