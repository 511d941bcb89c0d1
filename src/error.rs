//! Error types for memcluster
//!
//! Provides a unified error type for all operations.
//!
//! Expected failures (node down, key not found, CAS mismatch) are reported
//! through [`OperationResult`](crate::protocol::OperationResult) values. This
//! type covers transport failures inside the core and programmer errors at the
//! public surface.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using ClusterError
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Unified error type for memcluster operations
#[derive(Debug, Error)]
pub enum ClusterError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    #[error("Could not connect to {endpoint} within {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },

    #[error("Receive timed out on {0}")]
    ReceiveTimeout(String),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    // -------------------------------------------------------------------------
    // Pool Errors
    // -------------------------------------------------------------------------
    #[error("Pool is dead or disposed: {0}")]
    PoolDead(String),

    #[error("Pool is full, timed out waiting for a connection: {0}")]
    PoolTimeout(String),

    // -------------------------------------------------------------------------
    // Topology Errors
    // -------------------------------------------------------------------------
    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("Cluster configuration could not be retrieved: {0}")]
    DiscoveryTimeout(String),

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<std::io::Error> for ClusterError {
    /// Unwraps a `ClusterError` that crossed a `std::io::Read` boundary
    fn from(error: std::io::Error) -> Self {
        if !error.get_ref().is_some_and(|inner| inner.is::<ClusterError>()) {
            return ClusterError::Io(error);
        }
        match error.into_inner().map(|inner| inner.downcast::<ClusterError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => ClusterError::Io(std::io::Error::new(std::io::ErrorKind::Other, other)),
            None => ClusterError::Protocol("I/O error without a cause".to_string()),
        }
    }
}

impl ClusterError {
    /// Wrap into an `io::Error` whose kind matches, recoverable through `From`
    pub fn into_io(self) -> std::io::Error {
        let kind = match self {
            ClusterError::Io(inner) => return inner,
            ClusterError::ReceiveTimeout(_) | ClusterError::ConnectTimeout { .. } => std::io::ErrorKind::TimedOut,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, self)
    }

    /// True for failures caused by waiting too long (connect, receive, queue).
    pub fn is_timeout(&self) -> bool {
        match self {
            ClusterError::ConnectTimeout { .. }
            | ClusterError::ReceiveTimeout(_)
            | ClusterError::PoolTimeout(_)
            | ClusterError::DiscoveryTimeout(_) => true,
            ClusterError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// True when the stream position of the connection can no longer be trusted.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(
            self,
            ClusterError::Io(_)
                | ClusterError::ReceiveTimeout(_)
                | ClusterError::Protocol(_)
                | ClusterError::ConnectTimeout { .. }
        )
    }
}
