//! Error types for the remote downloader protocol.
//!
//! This module defines all error types used throughout the crate, on both
//! the client and the server side.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use remote_downloader_rpc::{Error, Result};
//!
//! async fn example(session: &Session) -> Result<()> {
//!     match session.delete_file("f1").await {
//!         Err(Error::Server { kind, message }) => eprintln!("{kind}: {message}"),
//!         other => other?,
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::NotConnected`] |
//! | Authentication | [`Error::AuthenticationFailed`] |
//! | Protocol | [`Error::MalformedFrame`], [`Error::Protocol`], [`Error::RequestIdExhaustion`] |
//! | Request | [`Error::Server`], [`Error::Timeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::client::SessionState;
use crate::protocol::{ErrorKind, ServerError};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client or server configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport connection failed.
    ///
    /// Returned when the WebSocket cannot be opened or a send fails.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Transport closed while the request was pending.
    ///
    /// Every outstanding call is rejected with this when the connection drops.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The session is not open.
    ///
    /// Returned for calls issued while connecting, authenticating, waiting to
    /// reconnect or after `close()`.
    #[error("Not connected (session is {state})")]
    NotConnected {
        /// State the session was in when the call was made.
        state: SessionState,
    },

    // ========================================================================
    // Authentication Errors
    // ========================================================================
    /// The server rejected the LOGIN request.
    #[error("Authentication failed ({kind}): {message}")]
    AuthenticationFailed {
        /// Error kind reported by the server.
        kind: ErrorKind,
        /// Human readable reason.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Frame could not be decoded.
    ///
    /// Fatal to that frame only; the session drops it and continues.
    #[error("Malformed frame: {message}")]
    MalformedFrame {
        /// Description of the decoding failure.
        message: String,
    },

    /// Protocol violation or local protocol limit.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// The 32-bit request id space of one connection is used up.
    ///
    /// Fatal: the session is closed.
    #[error("Request id space exhausted")]
    RequestIdExhaustion,

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// The server answered with an ERROR frame.
    #[error("Server error ({kind}): {message}")]
    Server {
        /// Enumerated error kind.
        kind: ErrorKind,
        /// Human readable message from the server.
        message: String,
    },

    /// Operation timeout.
    ///
    /// Returned when a caller stops waiting for a response, or when the
    /// transport does not open or authenticate in time.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a not connected error.
    #[inline]
    pub fn not_connected(state: SessionState) -> Self {
        Self::NotConnected { state }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates an authentication failure from the server's error body.
    #[inline]
    pub fn authentication_failed(error: ServerError) -> Self {
        Self::AuthenticationFailed {
            kind: error.kind,
            message: error.message,
        }
    }
}

impl From<ServerError> for Error {
    fn from(error: ServerError) -> Self {
        Self::Server {
            kind: error.kind,
            message: error.message,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::NotConnected { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns the server error kind, if the server produced this error.
    #[inline]
    #[must_use]
    pub fn server_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Server { kind, .. } | Self::AuthenticationFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed once the session has reconnected.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::NotConnected { .. } | Self::Timeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind as IoErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("missing address");
        assert_eq!(err.to_string(), "Configuration error: missing address");
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::timeout("LOGIN", 10_000).is_timeout());
        assert!(!Error::ConnectionClosed.is_timeout());
    }

    #[test]
    fn test_not_connected_display() {
        let err = Error::not_connected(SessionState::ReconnectScheduled);
        assert_eq!(
            err.to_string(),
            "Not connected (session is reconnect-scheduled)"
        );
    }

    #[test]
    fn test_server_error_conversion() {
        let err: Error = ServerError::new(ErrorKind::NotFound, "File is not found.").into();
        assert_eq!(err.server_kind(), Some(ErrorKind::NotFound));
        assert_eq!(err.to_string(), "Server error (NOT_FOUND): File is not found.");
    }

    #[test]
    fn test_authentication_failed() {
        let err = Error::authentication_failed(ServerError::new(
            ErrorKind::IncorrectCredentials,
            "Incorrect username or password.",
        ));
        assert!(matches!(err, Error::AuthenticationFailed { .. }));
        assert_eq!(err.server_kind(), Some(ErrorKind::IncorrectCredentials));
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::not_connected(SessionState::Connecting).is_connection_error());
        assert!(!Error::config("test").is_connection_error());
        assert!(!Error::RequestIdExhaustion.is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::ConnectionClosed.is_recoverable());
        assert!(Error::timeout("DELETE_FILE", 500).is_recoverable());
        assert!(!Error::malformed_frame("short").is_recoverable());
        assert!(!Error::RequestIdExhaustion.is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(IoErrorKind::ConnectionRefused, "refused");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
