//! Script listing derived from a LISTSCRIPTS response.

use crate::error::{Error, Result};
use crate::parser::unquote;

/// Ordered script names with at most one marked active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptListing {
    scripts: Vec<String>,
    active: Option<usize>,
}

impl ScriptListing {
    /// Builds a listing from LISTSCRIPTS body lines.
    ///
    /// A line whose last token is `ACTIVE` (any case) marks the active
    /// script. The marker and surrounding quotes are stripped from names.
    /// Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if more than one script is marked active.
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let mut listing = Self::default();

        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }

            let (name, is_active) = match line.rsplit_once(char::is_whitespace) {
                Some((name, marker)) if marker.eq_ignore_ascii_case("ACTIVE") => (name, true),
                _ => (line, false),
            };

            if is_active {
                if listing.active.is_some() {
                    return Err(Error::ProtocolViolation(
                        "more than one active script in listing".into(),
                    ));
                }
                listing.active = Some(listing.scripts.len());
            }
            listing.scripts.push(unquote(name));
        }

        Ok(listing)
    }

    /// Returns the script names in server order.
    #[must_use]
    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    /// Returns the active script, if any.
    #[must_use]
    pub fn active(&self) -> Option<&str> {
        self.active.map(|i| self.scripts[i].as_str())
    }

    /// Checks if a script with the given name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.scripts.iter().any(|s| s == name)
    }

    /// Returns the number of scripts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Returns true if there are no scripts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Iterates over `(name, is_active)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.scripts
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), self.active == Some(i)))
    }
}
