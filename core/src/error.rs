//! Error types shared by rivulet processors and transports

use thiserror::Error;

/// Error type for transport operations
///
/// Returned by [`Transport`](crate::Transport) implementations when a
/// payload cannot be delivered. The output router logs these per target;
/// they never stop a processor.
///
/// # Example
///
/// ```
/// use rivulet_core::TransportError;
///
/// fn publish() -> Result<(), TransportError> {
///     Err(TransportError::Connection("refused".to_string()))
/// }
///
/// match publish() {
///     Ok(_) => println!("published"),
///     Err(TransportError::Connection(msg)) => println!("sidecar unreachable: {}", msg),
///     Err(e) => println!("other error: {}", e),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Initialization failed
    ///
    /// Examples: invalid base URL, TLS backend unavailable.
    #[error("initialization failed: {0}")]
    Init(String),

    /// Topic publish failed before a response was received
    #[error("publish failed: {0}")]
    Publish(String),

    /// Remote invocation failed before a response was received
    #[error("invoke failed: {0}")]
    Invoke(String),

    /// Connection error
    ///
    /// Examples: DNS lookup failed, connection refused, request timed out.
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote side answered with a non-success status
    #[error("rejected with status {status}: {body}")]
    Rejected {
        /// HTTP-style status code returned by the remote side
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Not ready
    ///
    /// Transient state during startup of the transport substrate.
    #[error("transport not ready")]
    NotReady,

    /// Shutdown error
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

/// Error returned when an event payload cannot be viewed as a JSON object
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Payload bytes are not valid JSON
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),

    /// Payload is valid JSON but not an object
    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}
