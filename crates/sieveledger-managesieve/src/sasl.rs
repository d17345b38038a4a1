//! SASL authentication mechanisms.
//!
//! Implements:
//! - PLAIN (RFC 4616) - credentials sent as the initial response
//! - LOGIN (legacy) - username and password sent as answers to two prompts
//!
//! Each mechanism is a fixed script: the AUTHENTICATE command plus the
//! answers to send, in order, for each server challenge. The session drives
//! the exchange.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::command::Command;
use crate::error::Error;

/// Username and password for authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Authentication identity.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates new credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SASL mechanism supported by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Mechanism {
    /// PLAIN - credentials in the initial response
    Plain,
    /// LOGIN - username and password as separate challenge answers
    Login,
}

impl Mechanism {
    /// Returns the mechanism name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        }
    }

    /// Builds the exchange for these credentials.
    #[must_use]
    pub fn exchange(self, credentials: &Credentials) -> Exchange {
        match self {
            Self::Plain => Exchange {
                command: Command::Authenticate {
                    mechanism: self.as_str().to_string(),
                    initial_response: Some(plain_response(
                        &credentials.username,
                        &credentials.password,
                    )),
                },
                answers: VecDeque::new(),
            },
            Self::Login => Exchange {
                command: Command::Authenticate {
                    mechanism: self.as_str().to_string(),
                    initial_response: None,
                },
                answers: VecDeque::from([
                    STANDARD.encode(credentials.username.as_bytes()),
                    STANDARD.encode(credentials.password.as_bytes()),
                ]),
            },
        }
    }
}

impl FromStr for Mechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "LOGIN" => Ok(Self::Login),
            _ => Err(Error::UnsupportedMechanism(s.to_string())),
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The client side of one SASL exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct Exchange {
    command: Command,
    answers: VecDeque<String>,
}

impl Exchange {
    /// Returns the AUTHENTICATE command that opens the exchange.
    #[must_use]
    pub const fn command(&self) -> &Command {
        &self.command
    }

    /// Returns the base64 answer to the next server challenge.
    ///
    /// `None` means the mechanism has nothing left to say and the exchange
    /// must be aborted.
    pub fn next_answer(&mut self) -> Option<String> {
        self.answers.pop_front()
    }

    /// Returns the number of answers not yet sent.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("command", &self.command.verb())
            .field("remaining", &self.answers.len())
            .finish()
    }
}

/// Generates PLAIN initial response (RFC 4616).
///
/// Format: `\0<username>\0<password>` (base64 encoded). The empty first
/// field means the authorization identity equals the authentication one.
#[must_use]
pub fn plain_response(username: &str, password: &str) -> String {
    let auth_string = format!("\0{username}\0{password}");
    STANDARD.encode(auth_string.as_bytes())
}

/// Decodes a base64 server challenge, lossily as UTF-8.
///
/// Returns `None` if the challenge is not valid base64.
#[must_use]
pub fn decode_challenge(challenge: &str) -> Option<String> {
    STANDARD
        .decode(challenge.trim())
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}
