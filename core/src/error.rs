//! Error types for the portfinder-core library.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for portfinder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can leave a discovery run or a settings operation.
#[derive(Error, Debug)]
pub enum Error {
    /// The run was configured with something it cannot probe.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every port in the range was probed without a successful answer.
    #[error("Server not found ({probed} ports probed)")]
    NotFound { probed: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if this is the not-found outcome of a discovery run.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Why a single probe did not identify the server.
///
/// These never leave a discovery run; they are kept on the outcome record
/// and logged at trace level.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Nothing is listening on the port.
    #[error("Connection refused")]
    Refused,

    /// The check did not complete within its own timeout.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-success status.
    #[error("Unexpected status {0}")]
    Status(u16),

    /// Something answered, but not the server being looked for.
    #[error("Response mismatch: {0}")]
    Mismatch(String),

    /// The run stopped before the probe finished.
    #[error("Probe cancelled")]
    Cancelled,

    /// The check itself panicked.
    #[error("Port check panicked")]
    Panicked,

    /// The HTTP exchange failed below the status line.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for ProbeError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::ConnectionRefused => ProbeError::Refused,
            _ => ProbeError::Io(e),
        }
    }
}

/// Returned by a queue operation once the queue has been closed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Queue is closed")]
pub struct QueueClosed;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_io_error_maps_to_refused() {
        let err: ProbeError = std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into();
        assert!(matches!(err, ProbeError::Refused));

        let err: ProbeError = std::io::Error::from(std::io::ErrorKind::BrokenPipe).into();
        assert!(matches!(err, ProbeError::Io(_)));
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::NotFound { probed: 3 };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Server not found (3 ports probed)");
    }
}
