//! Error types for the record service.
//!
//! [`Error`] captures every failure a handler can report and implements
//! `From<Error>` for [`tonic::Status`] so handlers can propagate with `?`.
//!
//! ## Error Cases
//! - `Hashing`: the record store or the hashing pipeline failed.
//! - `ChannelError`: an internal channel closed before a response was sent.
//! - `RequestCancelled`: the client went away mid-request.
//! - `InvalidRequest`: the request was malformed.
//! - `ServiceShutdown`: the request arrived while the service was draining.

use todohash::StoreError;
use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the record service.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Internal channel send/receive failure.
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// Store or hashing failure.
    #[error(transparent)]
    Hashing(#[from] todohash::Error),

    /// The client aborted the request.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The client request was invalid.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self::Hashing(err.into())
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::Hashing(todohash::Error::Store(e)) => {
                Status::internal(format!("Store error: {e}"))
            }
            Error::Hashing(todohash::Error::Canceled) => {
                Status::cancelled("Canceled or timed out")
            }
            Error::Hashing(todohash::Error::TimedOut) => Status::deadline_exceeded("Timed out"),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    fn code(err: impl Into<Error>) -> Code {
        Status::from(err.into()).code()
    }

    #[test]
    fn hashing_errors_map_to_distinct_codes() {
        let store = StoreError::Unavailable {
            reason: "Invalid".to_string(),
        };
        assert_eq!(code(store), Code::Internal);
        assert_eq!(code(todohash::Error::Canceled), Code::Cancelled);
        assert_eq!(code(todohash::Error::TimedOut), Code::DeadlineExceeded);
    }

    #[test]
    fn service_errors_map_to_codes() {
        assert_eq!(code(Error::ServiceShutdown), Code::Unavailable);
        assert_eq!(code(Error::RequestCancelled), Code::Cancelled);
        assert_eq!(
            code(Error::ChannelError {
                context: "closed".to_string()
            }),
            Code::Internal
        );

        let status = Status::from(Error::InvalidRequest {
            reason: "record is required".to_string(),
        });
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "record is required");
    }

    #[test]
    fn store_message_is_preserved() {
        let status = Status::from(Error::from(StoreError::Unavailable {
            reason: "disk full".to_string(),
        }));
        assert!(status.message().contains("disk full"));
    }
}
