/// ProcLink Error Types
///
/// Errors surfaced by address resolution, endpoint lifecycle and the wire layer.

use std::io;
use thiserror::Error;

/// Main error type for messaging operations
#[derive(Error, Debug)]
pub enum MessagingError {
    /// Unknown transport kind, malformed port, or missing port for `tcp`
    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),

    /// Transport kind exists but is unavailable on this platform
    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(String),

    /// Binding the listening socket failed
    #[error("Failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// Non-blocking operation could not complete immediately
    #[error("Operation would block")]
    WouldBlock,

    /// Endpoint was already closed
    #[error("Endpoint closed")]
    Closed,

    /// Topic cannot be framed (contains the separator)
    #[error("Invalid topic: {0:?}")]
    InvalidTopic(String),

    /// Received body is not a valid message frame
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// ZMTP greeting / READY exchange failed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The process-wide I/O engine is gone
    #[error("Transport context terminated")]
    ContextTerminated,

    /// IO error during socket operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for messaging operations
pub type Result<T> = std::result::Result<T, MessagingError>;

impl MessagingError {
    /// Create an invalid protocol error
    pub fn invalid_protocol(msg: impl Into<String>) -> Self {
        Self::InvalidProtocol(msg.into())
    }

    /// Create an invalid frame error
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Create a handshake error
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }

    /// Wrap a bind failure, keeping the OS error.
    pub fn bind(endpoint: impl ToString, source: io::Error) -> Self {
        Self::Bind {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    /// Check if retrying the same call may succeed
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::WouldBlock => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Check if the endpoint or its engine is gone for good
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::ContextTerminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_would_block_is_recoverable() {
        assert!(MessagingError::WouldBlock.is_recoverable());
        assert!(!MessagingError::Closed.is_recoverable());
        let timed_out = MessagingError::from(io::Error::from(io::ErrorKind::TimedOut));
        assert!(timed_out.is_recoverable());
    }

    #[test]
    fn test_bind_keeps_os_error() {
        let err = MessagingError::bind(
            "tcp://127.0.0.1:1",
            io::Error::from(io::ErrorKind::AddrInUse),
        );
        match &err {
            MessagingError::Bind { endpoint, source } => {
                assert_eq!(endpoint, "tcp://127.0.0.1:1");
                assert_eq!(source.kind(), io::ErrorKind::AddrInUse);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().contains("tcp://127.0.0.1:1"));
    }

    #[test]
    fn test_terminal_errors() {
        assert!(MessagingError::Closed.is_terminal());
        assert!(MessagingError::ContextTerminated.is_terminal());
        assert!(!MessagingError::WouldBlock.is_terminal());
    }
}
