//! ManageSieve command builder.

mod serialize;

pub use serialize::{quoted, validate_script_name, write_literal_marker, write_quoted};

/// ManageSieve command.
///
/// A command is one line plus, for PUTSCRIPT and CHECKSCRIPT, a literal
/// payload that follows the line's CRLF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY - Request the capability listing
    Capability,
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTHENTICATE - Begin a SASL exchange
    Authenticate {
        /// Mechanism name
        mechanism: String,
        /// Base64 initial response
        initial_response: Option<String>,
    },
    /// HAVESPACE - Check whether a script would fit
    HaveSpace {
        /// Script name
        name: String,
        /// Script size in bytes
        size: u64,
    },
    /// PUTSCRIPT - Upload a script
    PutScript {
        /// Script name
        name: String,
        /// Script body
        script: Vec<u8>,
    },
    /// LISTSCRIPTS - List scripts
    ListScripts,
    /// SETACTIVE - Activate a script (empty name deactivates)
    SetActive {
        /// Script name
        name: String,
    },
    /// GETSCRIPT - Download a script
    GetScript {
        /// Script name
        name: String,
    },
    /// DELETESCRIPT - Delete a script
    DeleteScript {
        /// Script name
        name: String,
    },
    /// RENAMESCRIPT - Rename a script
    RenameScript {
        /// Current name
        from: String,
        /// New name
        to: String,
    },
    /// CHECKSCRIPT - Validate a script without storing it
    CheckScript {
        /// Script body
        script: Vec<u8>,
    },
    /// NOOP - No operation
    Noop,
    /// LOGOUT - Close the session
    Logout,
}

impl Command {
    /// Returns the command verb.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::StartTls => "STARTTLS",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::HaveSpace { .. } => "HAVESPACE",
            Self::PutScript { .. } => "PUTSCRIPT",
            Self::ListScripts => "LISTSCRIPTS",
            Self::SetActive { .. } => "SETACTIVE",
            Self::GetScript { .. } => "GETSCRIPT",
            Self::DeleteScript { .. } => "DELETESCRIPT",
            Self::RenameScript { .. } => "RENAMESCRIPT",
            Self::CheckScript { .. } => "CHECKSCRIPT",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
        }
    }

    /// Returns the command line without its CRLF.
    #[must_use]
    pub fn line(&self) -> String {
        let mut buf = String::from(self.verb());

        match self {
            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                buf.push(' ');
                write_quoted(&mut buf, mechanism);
                if let Some(resp) = initial_response {
                    buf.push(' ');
                    write_quoted(&mut buf, resp);
                }
            }
            Self::HaveSpace { name, size } => {
                buf.push(' ');
                write_quoted(&mut buf, name);
                buf.push(' ');
                buf.push_str(&size.to_string());
            }
            Self::PutScript { name, script } => {
                buf.push(' ');
                write_quoted(&mut buf, name);
                buf.push(' ');
                write_literal_marker(&mut buf, script.len());
            }
            Self::SetActive { name } | Self::GetScript { name } | Self::DeleteScript { name } => {
                buf.push(' ');
                write_quoted(&mut buf, name);
            }
            Self::RenameScript { from, to } => {
                buf.push(' ');
                write_quoted(&mut buf, from);
                buf.push(' ');
                write_quoted(&mut buf, to);
            }
            Self::CheckScript { script } => {
                buf.push(' ');
                write_literal_marker(&mut buf, script.len());
            }
            Self::Capability
            | Self::StartTls
            | Self::ListScripts
            | Self::Noop
            | Self::Logout => {}
        }

        buf
    }

    /// Returns the literal payload that follows the command line, if any.
    #[must_use]
    pub fn literal(&self) -> Option<&[u8]> {
        match self {
            Self::PutScript { script, .. } | Self::CheckScript { script } => Some(script.as_slice()),
            _ => None,
        }
    }

    /// Returns true if the command line carries credentials.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::Authenticate { .. })
    }

    /// Serializes the full command to bytes, literal included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = self.line().into_bytes();
        buf.extend_from_slice(b"\r\n");
        if let Some(literal) = self.literal() {
            buf.extend_from_slice(literal);
            buf.extend_from_slice(b"\r\n");
        }
        buf
    }
}
