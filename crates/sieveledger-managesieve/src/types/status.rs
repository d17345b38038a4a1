//! Response status types.

use super::ResponseCode;
use crate::error::{Error, Result};
use crate::parser::unquote;

/// Status token that terminates a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// Command succeeded.
    Ok,
    /// Command failed; the session stays usable.
    No,
    /// Server is closing the connection.
    Bye,
}

impl StatusKind {
    /// Parses a status token. Matching is case-sensitive.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }

    /// Returns the wire form of the token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bye => "BYE",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Status token.
    pub kind: StatusKind,
    /// Verbose message as received, with any literal already substituted.
    pub message: String,
}

impl Status {
    /// Creates a new status.
    #[must_use]
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns true for `OK`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.kind, StatusKind::Ok)
    }

    /// Returns true for `NO`.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.kind, StatusKind::No)
    }

    /// Returns true for `BYE`.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.kind, StatusKind::Bye)
    }

    /// Returns the response code at the start of the message, if any.
    #[must_use]
    pub fn code(&self) -> Option<ResponseCode> {
        ResponseCode::split(&self.message).map(|(code, _)| code)
    }

    /// Returns the human-readable part of the message.
    ///
    /// The response code is removed and a quoted string is unescaped.
    #[must_use]
    pub fn text(&self) -> String {
        let rest = ResponseCode::split(&self.message)
            .map_or(self.message.as_str(), |(_, rest)| rest);
        unquote(rest)
    }

    /// Converts the status into a result.
    ///
    /// # Errors
    ///
    /// Returns `CommandRejected` for `NO` and `ServerClosedConnection` for `BYE`.
    pub fn check(&self) -> Result<()> {
        match self.kind {
            StatusKind::Ok => Ok(()),
            StatusKind::No => Err(Error::rejected(self.code(), self.text())),
            StatusKind::Bye => Err(Error::ServerClosedConnection(self.text())),
        }
    }
}
