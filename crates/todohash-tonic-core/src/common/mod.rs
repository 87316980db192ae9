//! Shared protocol bindings, conversions and errors.
//!
//! - [`error`]: service-level error type and its `tonic::Status` mapping.
//! - [`types`]: conversions between domain records and protobuf messages.
//! - [`proto`]: generated messages, client and server stubs.

pub mod error;
pub mod types;

pub use error::{Error, Result};

pub mod proto {
    tonic::include_proto!("todohash");
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("todohash_descriptor");
}
