//! Quoted string and atom tokenizing.

use crate::error::{Error, Result};

/// Splits a line into quoted strings and atoms.
///
/// Quoted strings are returned unescaped (`\"` and `\\`). Atoms are
/// whitespace-delimited runs returned verbatim.
///
/// # Errors
///
/// Returns `ProtocolViolation` for an unterminated quoted string.
pub fn parse_strings(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => value.push(c),
                }
            }
            if !closed {
                return Err(Error::ProtocolViolation(format!(
                    "unterminated quoted string: {line}"
                )));
            }
            tokens.push(value);
        } else {
            let mut atom = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '"' {
                    break;
                }
                atom.push(c);
                chars.next();
            }
            tokens.push(atom);
        }
    }

    Ok(tokens)
}

/// Strips the quotes from a single quoted string.
///
/// Text that is not exactly one quoted string is returned trimmed but
/// otherwise unchanged.
#[must_use]
pub fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        if let Ok(tokens) = parse_strings(trimmed) {
            if let [single] = tokens.as_slice() {
                return single.clone();
            }
        }
    }
    trimmed.to_string()
}
