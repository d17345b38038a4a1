//! Server capabilities.

use std::collections::HashMap;

use crate::parser::parse_strings;

/// Capabilities advertised in the greeting or a CAPABILITY response.
///
/// Each capability line is `"NAME"` optionally followed by `"value"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// IMPLEMENTATION: server name and version.
    pub implementation: Option<String>,
    /// SASL: supported authentication mechanisms.
    pub sasl: Vec<String>,
    /// SIEVE: supported Sieve extensions.
    pub sieve: Vec<String>,
    /// STARTTLS: TLS upgrade is available.
    pub starttls: bool,
    /// MAXREDIRECTS: limit on redirect actions per script.
    pub max_redirects: Option<u32>,
    /// NOTIFY: supported notification methods.
    pub notify: Vec<String>,
    /// LANGUAGE: language of human-readable messages.
    pub language: Option<String>,
    /// OWNER: authenticated identity.
    pub owner: Option<String>,
    /// VERSION: protocol version.
    pub version: Option<String>,
    /// Capabilities not listed above, keyed by upper-cased name.
    pub other: HashMap<String, Option<String>>,
}

impl Capabilities {
    /// Parses capability lines.
    ///
    /// Lines that are not a quoted name with an optional value are skipped.
    #[must_use]
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut caps = Self::default();
        for line in lines {
            let line = line.as_ref();
            if !caps.apply_line(line) {
                tracing::warn!(line, "Skipping malformed capability line");
            }
        }
        caps
    }

    /// Applies one capability line. Returns false if it is malformed.
    fn apply_line(&mut self, line: &str) -> bool {
        if line.trim().is_empty() {
            return true;
        }
        if !line.trim_start().starts_with('"') {
            return false;
        }
        let Ok(tokens) = parse_strings(line) else {
            return false;
        };
        let (name, value) = match tokens.as_slice() {
            [name] => (name.to_uppercase(), None),
            [name, value] => (name.to_uppercase(), Some(value.clone())),
            _ => return false,
        };

        match (name.as_str(), value) {
            ("IMPLEMENTATION", value) => self.implementation = value,
            ("SASL", value) => self.sasl = split_list(value.as_deref()),
            ("SIEVE", value) => self.sieve = split_list(value.as_deref()),
            ("STARTTLS", _) => self.starttls = true,
            ("MAXREDIRECTS", value) => {
                self.max_redirects = value.and_then(|v| v.trim().parse().ok());
            }
            ("NOTIFY", value) => self.notify = split_list(value.as_deref()),
            ("LANGUAGE", value) => self.language = value,
            ("OWNER", value) => self.owner = value,
            ("VERSION", value) => self.version = value,
            (_, value) => {
                self.other.insert(name, value);
            }
        }
        true
    }

    /// Checks if the server advertises a SASL mechanism (case-insensitive).
    #[must_use]
    pub fn supports_sasl(&self, mechanism: &str) -> bool {
        self.sasl.iter().any(|m| m.eq_ignore_ascii_case(mechanism))
    }

    /// Checks if the server supports a Sieve extension (case-insensitive).
    #[must_use]
    pub fn supports_extension(&self, extension: &str) -> bool {
        self.sieve.iter().any(|e| e.eq_ignore_ascii_case(extension))
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}
