//! ManageSieve connection management.
//!
//! This module provides connection handling for ManageSieve servers, including:
//! - Configuration (host, port, timeouts)
//! - TLS/plaintext stream abstraction with in-place STARTTLS upgrade
//! - Framed I/O for ManageSieve responses and literals
//! - The session state machine and its typed commands

mod commands;
mod config;
mod framed;
mod session;
mod stream;

pub use config::{Config, ConfigBuilder, DEFAULT_PORT};
pub use framed::{AuthStep, FramedStream};
pub use session::{Session, SessionState};
pub use stream::{SieveStream, Transport, connect_plain, create_tls_connector};
