//! Command serialization helpers.

use crate::error::{Error, Result};

/// Writes a quoted string, escaping `"` and `\`.
pub fn write_quoted(buf: &mut String, s: &str) {
    buf.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            buf.push('\\');
        }
        buf.push(c);
    }
    buf.push('"');
}

/// Returns `s` as a quoted string.
#[must_use]
pub fn quoted(s: &str) -> String {
    let mut buf = String::with_capacity(s.len() + 2);
    write_quoted(&mut buf, s);
    buf
}

/// Writes a non-synchronizing literal marker `{N+}`.
pub fn write_literal_marker(buf: &mut String, len: usize) {
    buf.push('{');
    buf.push_str(&len.to_string());
    buf.push_str("+}");
}

/// Validates a script name.
///
/// Names must be non-empty and free of control characters and the Unicode
/// line/paragraph separators.
///
/// # Errors
///
/// Returns `InvalidArgument` if the name cannot be sent.
pub fn validate_script_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("script name is empty".into()));
    }
    if let Some(c) = name.chars().find(|&c| is_forbidden_in_name(c)) {
        return Err(Error::InvalidArgument(format!(
            "script name contains forbidden character U+{:04X}",
            u32::from(c)
        )));
    }
    Ok(())
}

const fn is_forbidden_in_name(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}' | '\u{2028}' | '\u{2029}')
}
