//! ManageSieve response parser.
//!
//! Everything here is sans-I/O: functions look at one decoded line at a
//! time. The framed stream in [`crate::connection`] drives them and does the
//! actual reading, including the raw bytes of literals.
//!
//! A response is a run of body lines closed by a status line:
//!
//! ```text
//! "script1"
//! "script2" ACTIVE
//! OK "Listscripts completed."
//! ```
//!
//! Any line (status or body) may end in a literal marker `{N}` or `{N+}`,
//! in which case exactly `N` raw bytes follow the line's CRLF.

mod string;

pub use string::{parse_strings, unquote};

use crate::error::{Error, Result};
use crate::types::{Status, StatusKind};

/// Quoted SASL prompts a server may emit mid-authentication.
///
/// These are the empty challenge and base64 of `Username:` / `Password:`.
/// They carry nothing a response needs and are dropped wherever they occur.
pub const SASL_PLACEHOLDERS: [&str; 3] = ["\"\"", "\"VXNlcm5hbWU6\"", "\"UGFzc3dvcmQ6\""];

/// Checks if a line is one of the SASL prompt placeholders.
#[must_use]
pub fn is_sasl_placeholder(line: &str) -> bool {
    SASL_PLACEHOLDERS.contains(&line)
}

/// Checks if a line terminates a response.
///
/// Matches by case-sensitive prefix, so `OKAY` counts as a status line and
/// is later rejected by [`parse_status_line`].
#[must_use]
pub fn is_status_line(line: &str) -> bool {
    line.starts_with("OK") || line.starts_with("NO") || line.starts_with("BYE")
}

/// Splits a status line into its status token and verbose message.
///
/// # Errors
///
/// Returns `ProtocolViolation` if the first token is not `OK`, `NO` or `BYE`.
pub fn parse_status_line(line: &str) -> Result<(StatusKind, String)> {
    let (token, message) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(token, rest)| (token, rest.trim_start()));

    let kind = StatusKind::parse(token)
        .ok_or_else(|| Error::ProtocolViolation(format!("unrecognized status line: {line}")))?;

    Ok((kind, message.to_string()))
}

/// Classifies a parsed status.
///
/// `OK` and `NO` are returned as-is; `NO` is a command failure the caller
/// decides about. `BYE` is fatal.
///
/// # Errors
///
/// Returns `ServerClosedConnection` carrying the human-readable text for `BYE`.
pub fn classify(kind: StatusKind, message: String) -> Result<Status> {
    let status = Status::new(kind, message);
    match kind {
        StatusKind::Ok | StatusKind::No => Ok(status),
        StatusKind::Bye => Err(Error::ServerClosedConnection(status.text())),
    }
}

/// A literal marker found at the end of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralMarker {
    /// Byte offset of the opening brace.
    pub offset: usize,
    /// Number of raw bytes that follow.
    pub length: usize,
    /// Whether the marker used the non-synchronizing `{N+}` form.
    pub non_synchronizing: bool,
}

/// Finds a literal marker `{N}` or `{N+}` at the end of a line.
///
/// The `+` is syntax only and never part of the count.
///
/// # Errors
///
/// Returns `ProtocolViolation` if the count does not fit in a `usize`.
pub fn literal_marker(line: &str) -> Result<Option<LiteralMarker>> {
    let trimmed = line.trim_end();
    let Some(inner) = trimmed.strip_suffix('}') else {
        return Ok(None);
    };
    let Some(offset) = inner.rfind('{') else {
        return Ok(None);
    };
    let digits = &inner[offset + 1..];

    let (digits, non_synchronizing) = digits
        .strip_suffix('+')
        .map_or((digits, false), |d| (d, true));

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }

    let length = digits
        .parse()
        .map_err(|_| Error::ProtocolViolation(format!("literal length out of range: {digits}")))?;

    Ok(Some(LiteralMarker {
        offset,
        length,
        non_synchronizing,
    }))
}
