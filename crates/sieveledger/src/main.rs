//! `SieveLedger` - command-line ManageSieve client
//!
//! Lists, downloads, uploads and activates the Sieve filter scripts stored on
//! a mail server, over a STARTTLS-protected ManageSieve session.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sieveledger_managesieve::{Capabilities, Config, Credentials, DEFAULT_PORT, Session};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Manage Sieve mail filters on a ManageSieve server.
///
/// The password is read from `SIEVE_PASSWORD`.
#[derive(Parser)]
#[command(version, max_term_width = 80)]
struct Cli {
    /// Server host name.
    host: String,

    /// Login name.
    user: String,

    #[command(subcommand)]
    command: Action,

    /// Server port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// SASL mechanism (PLAIN or LOGIN).
    #[arg(short, long, default_value = "PLAIN")]
    mechanism: String,

    /// Login password.
    #[arg(long, env = "SIEVE_PASSWORD", hide_env_values = true)]
    password: String,

    /// Seconds to wait for the TCP connection.
    #[arg(long, default_value_t = 30)]
    connect_timeout: u64,

    /// Seconds to wait for each server response.
    #[arg(long, default_value_t = 60)]
    timeout: u64,
}

#[derive(Subcommand)]
enum Action {
    /// List scripts, marking the active one.
    List,
    /// Download a script to standard output or a file.
    Get {
        name: String,
        /// Write to this file instead of standard output.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload a script from a file, or standard input if omitted or `-`.
    Put { name: String, file: Option<PathBuf> },
    /// Make a script the active one.
    Activate { name: String },
    /// Deactivate the active script.
    Deactivate,
    /// Delete a script. The active script cannot be deleted.
    Delete { name: String },
    /// Rename a script.
    Rename { from: String, to: String },
    /// Validate a script without storing it.
    Check { file: Option<PathBuf> },
    /// Ask whether a script of the given size would fit.
    Havespace { name: String, size: u64 },
    /// Show server capabilities.
    Capability,
}

impl Action {
    const fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get { .. } => "get",
            Self::Put { .. } => "put",
            Self::Activate { .. } => "activate",
            Self::Deactivate => "deactivate",
            Self::Delete { .. } => "delete",
            Self::Rename { .. } => "rename",
            Self::Check { .. } => "check",
            Self::Havespace { .. } => "havespace",
            Self::Capability => "capability",
        }
    }
}

/// What a command prints once the session is closed.
#[derive(Debug, PartialEq, Eq)]
enum Output {
    Nothing,
    Text(String),
    Script(Vec<u8>),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sieveledger=info,sieveledger_managesieve=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let script = match &cli.command {
        Action::Put { file, .. } | Action::Check { file } => Some(read_script(file.as_deref())?),
        _ => None,
    };

    let config = Config::builder(&cli.host)
        .port(cli.port)
        .connect_timeout(Duration::from_secs(cli.connect_timeout))
        .io_timeout(Duration::from_secs(cli.timeout))
        .build();
    let credentials = Credentials::new(cli.user, cli.password);

    info!(address = %config.address(), user = %credentials.username, "Connecting");

    let output = Session::with_session(&config, &credentials, &cli.mechanism, async |session| {
        execute(session, &cli.command, script.as_deref()).await
    })
    .await
    .with_context(|| format!("{} on {} failed", cli.command.name(), config.address()))?;

    write_output(output, &cli.command)
}

async fn execute(
    session: &mut Session,
    action: &Action,
    script: Option<&[u8]>,
) -> sieveledger_managesieve::Result<Output> {
    let script = script.unwrap_or_default();

    let output = match action {
        Action::List => {
            let listing = session.list_scripts().await?;
            let lines: Vec<String> = listing
                .iter()
                .map(|(name, active)| {
                    if active {
                        format!("{name} (active)")
                    } else {
                        name.to_string()
                    }
                })
                .collect();
            Output::Text(lines.join("\n"))
        }
        Action::Get { name, .. } => Output::Script(session.get_script(name).await?),
        Action::Put { name, .. } => {
            session.put_script(name, script).await?;
            info!(script = %name, size = script.len(), "Script uploaded");
            Output::Nothing
        }
        Action::Activate { name } => {
            session.set_active(name).await?;
            Output::Nothing
        }
        Action::Deactivate => {
            session.deactivate().await?;
            Output::Nothing
        }
        Action::Delete { name } => {
            session.delete_script(name).await?;
            Output::Nothing
        }
        Action::Rename { from, to } => {
            session.rename_script(from, to).await?;
            Output::Nothing
        }
        Action::Check { .. } => match session.check_script(script).await? {
            Some(warnings) => Output::Text(format!("valid, with warnings: {warnings}")),
            None => Output::Text("valid".to_string()),
        },
        Action::Havespace { name, size } => {
            session.have_space(name, *size).await?;
            Output::Text(format!("{size} bytes fit"))
        }
        Action::Capability => Output::Text(describe(&session.capability().await?)),
    };

    Ok(output)
}

fn read_script(path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))
        }
        _ => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("reading standard input")?;
            Ok(buf)
        }
    }
}

fn write_output(output: Output, action: &Action) -> anyhow::Result<()> {
    match output {
        Output::Nothing => {}
        Output::Text(text) => println!("{text}"),
        Output::Script(bytes) => {
            if let Action::Get {
                output: Some(path), ..
            } = action
            {
                std::fs::write(path, &bytes)
                    .with_context(|| format!("writing {}", path.display()))?;
            } else {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&bytes)?;
                stdout.flush()?;
            }
        }
    }
    Ok(())
}

fn describe(caps: &Capabilities) -> String {
    let mut lines = Vec::new();
    if let Some(implementation) = &caps.implementation {
        lines.push(format!("Implementation: {implementation}"));
    }
    if let Some(version) = &caps.version {
        lines.push(format!("Version: {version}"));
    }
    lines.push(format!("SASL: {}", caps.sasl.join(" ")));
    lines.push(format!("Sieve: {}", caps.sieve.join(" ")));
    if !caps.notify.is_empty() {
        lines.push(format!("Notify: {}", caps.notify.join(" ")));
    }
    if let Some(max) = caps.max_redirects {
        lines.push(format!("Max redirects: {max}"));
    }
    if let Some(owner) = &caps.owner {
        lines.push(format!("Owner: {owner}"));
    }
    if let Some(language) = &caps.language {
        lines.push(format!("Language: {language}"));
    }
    let mut other: Vec<_> = caps.other.iter().collect();
    other.sort();
    for (name, value) in other {
        match value {
            Some(value) => lines.push(format!("{name}: {value}")),
            None => lines.push(name.clone()),
        }
    }
    lines.join("\n")
}
