//! Response type.

use super::Status;
use crate::error::Result;

/// One complete server response: body lines plus the terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Body lines in wire order, CRLF stripped.
    ///
    /// A line that carried a literal holds the literal's text in place of
    /// the marker.
    pub lines: Vec<String>,
    /// Raw literal payloads from body lines, in wire order.
    pub literals: Vec<Vec<u8>>,
    /// Terminal status.
    pub status: Status,
}

impl Response {
    /// Creates a response without literals.
    #[must_use]
    pub const fn new(lines: Vec<String>, status: Status) -> Self {
        Self {
            lines,
            literals: Vec::new(),
            status,
        }
    }

    /// Returns true if the status is `OK`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Returns true if the status is `NO`.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.status.is_error()
    }

    /// Returns the body joined with `\n`.
    #[must_use]
    pub fn body_text(&self) -> String {
        self.lines.join("\n")
    }

    /// Returns the first literal payload of the body, if any.
    #[must_use]
    pub fn literal(&self) -> Option<&[u8]> {
        self.literals.first().map(Vec::as_slice)
    }

    /// Passes the response through if its status is `OK`.
    ///
    /// # Errors
    ///
    /// Returns `CommandRejected` for `NO` and `ServerClosedConnection` for `BYE`.
    pub fn into_result(self) -> Result<Self> {
        self.status.check()?;
        Ok(self)
    }
}
