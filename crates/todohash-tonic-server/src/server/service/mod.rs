//! gRPC service implementation and request lifecycle.
//!
//! ## Structure
//!
//! - [`handler`]: gRPC service entry point (`RecordHandler`).
//! - [`lifecycle`]: admission control and graceful drain.
//! - [`deadline`]: `grpc-timeout` parsing.

pub mod deadline;
pub mod handler;
pub mod lifecycle;
