//! # sieveledger-managesieve
//!
//! An async ManageSieve client library implementing RFC 5804, for managing
//! Sieve mail-filtering scripts stored on a mail server.
//!
//! ## Features
//!
//! - **Mandatory STARTTLS**: the session never authenticates in cleartext
//! - **SASL PLAIN and LOGIN** authentication
//! - **Full command set**: LISTSCRIPTS, GETSCRIPT, PUTSCRIPT, SETACTIVE,
//!   DELETESCRIPT, RENAMESCRIPT, CHECKSCRIPT, HAVESPACE, CAPABILITY, NOOP
//! - **Literal support**: binary-safe script upload and download
//! - **TLS via rustls**: Secure connections without OpenSSL dependency
//! - **Sans-I/O parser**: Protocol parsing separated from network I/O
//!
//! ## Quick Start
//!
//! ```ignore
//! use sieveledger_managesieve::{Config, Credentials, Session};
//!
//! #[tokio::main]
//! async fn main() -> sieveledger_managesieve::Result<()> {
//!     let config = Config::new("sieve.example.com");
//!     let credentials = Credentials::new("alice", "secret");
//!
//!     let mut session = Session::connect(&config, &credentials, "PLAIN").await?;
//!
//!     let listing = session.list_scripts().await?;
//!     for (name, active) in listing.iter() {
//!         println!("{name}{}", if active { " (active)" } else { "" });
//!     }
//!
//!     session.put_script("vacation", b"require \"vacation\";\nvacation \"Away\";\n").await?;
//!     session.set_active("vacation").await?;
//!
//!     session.logout().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! AwaitingBanner ─→ NegotiatingTls ─→ AwaitingPostTlsBanner ─→ Authenticating ─→ Ready
//!                                                                                  │
//!                                   Failed ←── BYE / I/O error / timeout ──────────┤
//!                                                                                  ▼
//!                                                                   LoggingOut ─→ Closed
//! ```
//!
//! ## Modules
//!
//! - [`command`]: ManageSieve command builders
//! - [`connection`]: Streams, framing and the session state machine
//! - [`parser`]: Sans-I/O response parser
//! - [`sasl`]: SASL mechanisms and credentials
//! - [`types`]: Responses, statuses, response codes, capabilities

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod sasl;
pub mod types;

pub use command::Command;
pub use connection::{
    AuthStep, Config, ConfigBuilder, DEFAULT_PORT, FramedStream, Session, SessionState,
    SieveStream, Transport,
};
pub use error::{Error, Result};
pub use sasl::{Credentials, Mechanism};
pub use types::{
    Capabilities, QuotaKind, Response, ResponseCode, ScriptListing, Status, StatusKind,
};

/// ManageSieve protocol version supported.
pub const MANAGESIEVE_VERSION: &str = "1.0";
