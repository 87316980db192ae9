//! Conversions between [`todohash`] records and their protobuf messages.
//!
//! Domain and wire records carry the same three fields. The only fallible
//! direction is unwrapping an optional message field, which is reported as
//! [`Error::InvalidRequest`].

use crate::{Error, Result, proto};
use todohash::{HashedRecord, Record};

impl From<Record> for proto::Record {
    fn from(record: Record) -> Self {
        Self {
            id: record.id,
            owner_id: record.owner_id,
            payload: record.payload,
        }
    }
}

impl From<proto::Record> for Record {
    fn from(record: proto::Record) -> Self {
        Self::new(record.owner_id, record.payload).with_id(record.id)
    }
}

impl From<HashedRecord> for proto::HashedRecord {
    fn from(hashed: HashedRecord) -> Self {
        Self {
            record: Some(hashed.record.into()),
            hash: hashed.hash,
        }
    }
}

impl TryFrom<proto::HashedRecord> for HashedRecord {
    type Error = Error;

    fn try_from(hashed: proto::HashedRecord) -> Result<Self> {
        Ok(Self {
            record: required(hashed.record, "record")?.into(),
            hash: hashed.hash,
        })
    }
}

/// Unwraps an optional message field, naming it in the error.
pub fn required<T>(field: Option<T>, name: &str) -> Result<T> {
    field.ok_or_else(|| Error::InvalidRequest {
        reason: format!("`{name}` is required"),
    })
}

/// Converts a batch of domain records into wire records.
pub fn to_proto_records(records: Vec<Record>) -> Vec<proto::Record> {
    records.into_iter().map(Into::into).collect()
}
