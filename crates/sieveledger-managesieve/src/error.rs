//! Error types for ManageSieve operations.

use std::io;
use std::time::Duration;

use crate::types::ResponseCode;

/// Result type alias for ManageSieve operations.
pub type Result<T> = std::result::Result<T, Error>;

/// ManageSieve error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The TCP connection could not be established.
    #[error("Connection to {address} failed: {source}")]
    ConnectionFailed {
        /// `host:port` that was dialled.
        address: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The server closed the stream without a BYE.
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The server refused STARTTLS.
    #[error("Server does not support STARTTLS: {0}")]
    TlsNotSupported(String),

    /// The TLS handshake did not complete.
    #[error("TLS negotiation failed: {0}")]
    TlsNegotiationFailed(String),

    /// The server sent something that is not valid ManageSieve.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The server sent BYE.
    #[error("Server closed the connection: {0}")]
    ServerClosedConnection(String),

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested SASL mechanism is not implemented by this client.
    #[error("Unsupported SASL mechanism: {0}")]
    UnsupportedMechanism(String),

    /// The server answered NO.
    #[error("Command rejected: {message}")]
    CommandRejected {
        /// Response code, if the server sent one.
        code: Option<ResponseCode>,
        /// Verbose message from the server.
        message: String,
    },

    /// A read or write did not finish within the I/O timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The session is not in a state that allows the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A caller-supplied argument cannot be sent on the wire.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Creates a command rejection from a NO response.
    #[must_use]
    pub fn rejected(code: Option<ResponseCode>, message: impl Into<String>) -> Self {
        Self::CommandRejected {
            code,
            message: message.into(),
        }
    }

    /// Returns true if the session that produced this error must be discarded.
    ///
    /// Only `CommandRejected` and argument errors leave the session usable.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::CommandRejected { .. } | Self::InvalidArgument(_) | Self::UnsupportedMechanism(_)
        )
    }

    /// Returns the response code attached to a rejection, if any.
    #[must_use]
    pub const fn response_code(&self) -> Option<&ResponseCode> {
        match self {
            Self::CommandRejected {
                code: Some(code), ..
            } => Some(code),
            _ => None,
        }
    }
}
