//! ManageSieve session state machine.
//!
//! A `Session` owns the transport and walks it through the bootstrap
//! sequence, then gates commands one at a time:
//!
//! ```text
//! AwaitingBanner ─ read_greeting() ─→ NegotiatingTls ─ start_tls() ─→ AwaitingPostTlsBanner
//!        ─→ Authenticating ─ authenticate() ─→ Ready ─ logout() ─→ LoggingOut ─→ Closed
//! ```
//!
//! Any BYE, transport error or timeout moves the session to `Failed` and
//! drops the transport. A NO leaves it where it was.
//!
//! ## Example
//!
//! ```ignore
//! use sieveledger_managesieve::{Config, Credentials, Session};
//!
//! let config = Config::new("sieve.example.com");
//! let credentials = Credentials::new("alice", "secret");
//!
//! let listing = Session::with_session(&config, &credentials, "PLAIN", async |session| {
//!     session.list_scripts().await
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::framed::{AuthStep, FramedStream};
use super::{Config, SieveStream, Transport, connect_plain};
use crate::command::{Command, quoted};
use crate::sasl::{Credentials, Mechanism};
use crate::types::{Capabilities, Response, Status, StatusKind};
use crate::{Error, Result};

/// Where a session is in its lifecycle.
///
/// Before the bootstrap finishes, the state names the phase that runs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport yet.
    Disconnected,
    /// TCP connection in progress.
    Connecting,
    /// Waiting for the server greeting.
    AwaitingBanner,
    /// Greeting read; STARTTLS is next.
    NegotiatingTls,
    /// TLS is up; the re-issued capability banner is next.
    AwaitingPostTlsBanner,
    /// Ready for AUTHENTICATE.
    Authenticating,
    /// Authenticated and accepting commands.
    Ready,
    /// LOGOUT in progress.
    LoggingOut,
    /// Closed cleanly.
    Closed,
    /// Closed after a fatal error.
    Failed,
}

impl SessionState {
    /// Returns true if no further I/O is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// A live ManageSieve session over one transport.
///
/// Exactly one command is in flight at a time; every method that talks to
/// the server takes `&mut self` and returns only after the full response,
/// literals included, has been consumed.
pub struct Session<S = SieveStream> {
    stream: Option<FramedStream<S>>,
    host: String,
    state: SessionState,
    io_timeout: Duration,
    tls_active: bool,
    capabilities: Capabilities,
    last_response: Option<Response>,
}

// Manual Debug implementation since FramedStream doesn't implement Debug
impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("state", &self.state)
            .field("tls_active", &self.tls_active)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Session<SieveStream> {
    /// Connects, upgrades to TLS and authenticates.
    ///
    /// The mechanism name is checked before any network I/O.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedMechanism`, `ConnectionFailed`, `TlsNotSupported`,
    /// `TlsNegotiationFailed`, `AuthenticationFailed`, or any transport error
    /// hit during the bootstrap. The transport is closed on every error.
    pub async fn connect(config: &Config, credentials: &Credentials, mechanism: &str) -> Result<Self> {
        let mechanism: Mechanism = mechanism.parse()?;

        debug!(
            host = %config.host,
            port = config.port,
            state = ?SessionState::Connecting,
            "Opening ManageSieve connection"
        );
        let stream = connect_plain(&config.host, config.port, config.connect_timeout).await?;
        Self::bootstrap(stream, config, credentials, mechanism).await
    }

    /// Runs `f` on a fresh session and logs out afterwards.
    ///
    /// Logout happens whether `f` succeeds or not; `f`'s result is returned.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Session::connect`] or from `f`.
    pub async fn with_session<T, F>(
        config: &Config,
        credentials: &Credentials,
        mechanism: &str,
        f: F,
    ) -> Result<T>
    where
        F: AsyncFnOnce(&mut Self) -> Result<T>,
    {
        Self::connect(config, credentials, mechanism)
            .await?
            .scope(f)
            .await
    }
}

impl<S: Transport> Session<S> {
    /// Wraps a freshly connected transport. Nothing is read yet.
    pub fn new(stream: S, host: impl Into<String>, io_timeout: Duration) -> Self {
        Self {
            stream: Some(FramedStream::new(stream)),
            host: host.into(),
            state: SessionState::AwaitingBanner,
            io_timeout,
            tls_active: false,
            capabilities: Capabilities::default(),
            last_response: None,
        }
    }

    /// Runs the full bootstrap on a connected transport.
    ///
    /// # Errors
    ///
    /// Same as [`Session::connect`], minus `ConnectionFailed`.
    pub async fn establish(
        stream: S,
        config: &Config,
        credentials: &Credentials,
        mechanism: &str,
    ) -> Result<Self> {
        let mechanism: Mechanism = mechanism.parse()?;
        Self::bootstrap(stream, config, credentials, mechanism).await
    }

    async fn bootstrap(
        stream: S,
        config: &Config,
        credentials: &Credentials,
        mechanism: Mechanism,
    ) -> Result<Self> {
        let mut session = Self::new(stream, config.host.clone(), config.io_timeout);

        let result = async {
            session.read_greeting().await?;
            session.start_tls().await?;
            session.authenticate(mechanism.as_str(), credentials).await
        }
        .await;

        match result {
            Ok(()) => Ok(session),
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }

    /// Reads the server greeting and records its capabilities.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` outside `AwaitingBanner`, or any read error.
    pub async fn read_greeting(&mut self) -> Result<&Capabilities> {
        self.expect_state(SessionState::AwaitingBanner)?;

        let greeting = self.receive().await?;
        if greeting.is_error() {
            warn!(message = %greeting.status.message, "Server greeting ended with NO");
        }
        self.capabilities = Capabilities::parse(&greeting.lines);
        self.transition(SessionState::NegotiatingTls);

        Ok(&self.capabilities)
    }

    /// Sends STARTTLS, upgrades the transport and reads the new banner.
    ///
    /// # Errors
    ///
    /// Returns `TlsNotSupported` if the server answers NO,
    /// `TlsNegotiationFailed` if the handshake fails, `Timeout` if it does
    /// not finish within the I/O timeout, and `ProtocolViolation` if
    /// cleartext bytes arrived after the server's OK.
    pub async fn start_tls(&mut self) -> Result<()> {
        self.expect_state(SessionState::NegotiatingTls)?;

        if !self.capabilities.starttls {
            debug!("Server did not advertise STARTTLS; trying anyway");
        }

        let response = self.exchange(&Command::StartTls).await?;
        if response.is_error() {
            let err = Error::TlsNotSupported(response.status.text());
            self.abort(&err);
            return Err(err);
        }

        let Some(framed) = self.stream.take() else {
            return Err(Error::InvalidState("transport already closed".into()));
        };
        if framed.has_buffered_data() {
            let err = Error::ProtocolViolation("cleartext data received after STARTTLS".into());
            self.abort(&err);
            return Err(err);
        }

        let upgrade = framed.into_inner().upgrade_to_tls(&self.host);
        match with_timeout(self.io_timeout, upgrade).await {
            Ok(stream) => {
                self.stream = Some(FramedStream::new(stream));
                self.tls_active = true;
            }
            Err(e) => {
                let err = match e {
                    Error::TlsNegotiationFailed(_) | Error::Timeout(_) => e,
                    other => Error::TlsNegotiationFailed(other.to_string()),
                };
                self.abort(&err);
                return Err(err);
            }
        }
        self.transition(SessionState::AwaitingPostTlsBanner);

        let banner = self.receive().await?;
        self.capabilities = Capabilities::parse(&banner.lines);
        self.transition(SessionState::Authenticating);

        Ok(())
    }

    /// Authenticates with the named SASL mechanism.
    ///
    /// An unknown mechanism fails before anything is sent and leaves the
    /// session untouched.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedMechanism`, `AuthenticationFailed` (fatal: the
    /// transport is closed), or any transport error.
    pub async fn authenticate(&mut self, mechanism: &str, credentials: &Credentials) -> Result<()> {
        let mechanism: Mechanism = mechanism.parse()?;
        self.expect_state(SessionState::Authenticating)?;

        if !self.capabilities.sasl.is_empty() && !self.capabilities.supports_sasl(mechanism.as_str())
        {
            debug!(%mechanism, "Mechanism not advertised by server; trying anyway");
        }
        debug!(%mechanism, user = %credentials.username, "Authenticating");

        let mut exchange = mechanism.exchange(credentials);
        self.send(&exchange.command().line(), None).await?;

        let mut aborted = false;
        let response = loop {
            match self.read_auth_step().await? {
                AuthStep::Done(response) => break response,
                AuthStep::Challenge(_) if aborted => {
                    let err = Error::ProtocolViolation("challenge after SASL abort".into());
                    self.abort(&err);
                    return Err(err);
                }
                AuthStep::Challenge(challenge) => {
                    if let Some(answer) = exchange.next_answer() {
                        self.send(&quoted(&answer), None).await?;
                    } else {
                        debug!(challenge = %challenge, "Unexpected SASL challenge; aborting");
                        self.send(&quoted("*"), None).await?;
                        aborted = true;
                    }
                }
            }
        };

        self.last_response = Some(response.clone());

        if response.is_ok() && !aborted {
            self.transition(SessionState::Ready);
            debug!("Authenticated");
            return Ok(());
        }

        let message = if aborted {
            format!("{mechanism} exchange aborted: {}", response.status.text())
        } else {
            response.status.text()
        };
        let err = Error::AuthenticationFailed(message);
        self.abort(&err);
        Err(err)
    }

    /// Sends a command line (and literal payload) and reads its response.
    ///
    /// A NO is returned as a response with `is_error()` set; the session
    /// stays ready.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the session is ready,
    /// `ServerClosedConnection` on BYE, or a transport error. All but the
    /// first are fatal.
    pub async fn execute(&mut self, line: &str, literal: Option<&[u8]>) -> Result<Response> {
        self.ensure_ready()?;
        debug!(command = line.split_whitespace().next().unwrap_or(""), "C:");
        self.send(line, literal).await?;
        self.receive().await
    }

    /// Executes a built command.
    ///
    /// # Errors
    ///
    /// Same as [`Session::execute`].
    pub async fn run(&mut self, command: &Command) -> Result<Response> {
        self.execute(&command.line(), command.literal()).await
    }

    /// Runs `f` on this session and logs out afterwards.
    ///
    /// # Errors
    ///
    /// Returns `f`'s error, if any.
    pub async fn scope<T, F>(mut self, f: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Self) -> Result<T>,
    {
        let result = f(&mut self).await;
        self.logout().await;
        result
    }

    /// Sends LOGOUT and closes the transport.
    ///
    /// The LOGOUT status is returned when one was received. Errors during
    /// logout are logged, never returned; the transport is closed regardless.
    /// On a session that is not ready, only the transport is closed.
    pub async fn logout(mut self) -> Option<Status> {
        if self.state != SessionState::Ready {
            self.close().await;
            return None;
        }

        self.transition(SessionState::LoggingOut);
        let status = match self.exchange(&Command::Logout).await {
            Ok(response) => {
                if response.is_error() {
                    warn!(message = %response.status.message, "LOGOUT answered with NO");
                }
                Some(response.status)
            }
            Err(e) => {
                warn!(error = %e, "LOGOUT failed");
                None
            }
        };

        self.close().await;
        status
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the server host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns true once STARTTLS has completed.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.tls_active
    }

    /// Returns true once authentication has succeeded.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Ready | SessionState::LoggingOut)
    }

    /// Returns the most recent capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub(super) fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    /// Returns the last complete response.
    #[must_use]
    pub const fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    /// Returns the status token of the last response.
    #[must_use]
    pub fn last_status(&self) -> Option<StatusKind> {
        self.last_response.as_ref().map(|r| r.status.kind)
    }

    /// Returns the verbose message of the last response.
    #[must_use]
    pub fn last_message(&self) -> Option<&str> {
        self.last_response
            .as_ref()
            .map(|r| r.status.message.as_str())
    }

    /// Returns true if the last response was a NO.
    #[must_use]
    pub fn last_error(&self) -> bool {
        self.last_response.as_ref().is_some_and(Response::is_error)
    }

    /// Sends a command without the ready check. Used during bootstrap.
    async fn exchange(&mut self, command: &Command) -> Result<Response> {
        debug!(command = command.verb(), "C:");
        self.send(&command.line(), command.literal()).await?;
        self.receive().await
    }

    async fn send(&mut self, line: &str, literal: Option<&[u8]>) -> Result<()> {
        let timeout = self.io_timeout;
        let framed = self.framed()?;
        let result = with_timeout(timeout, framed.write_command(line, literal)).await;
        self.check_fatal(result)
    }

    async fn receive(&mut self) -> Result<Response> {
        let timeout = self.io_timeout;
        let framed = self.framed()?;
        let result = with_timeout(timeout, framed.read_response()).await;
        let response = self.check_fatal(result)?;
        self.last_response = Some(response.clone());
        Ok(response)
    }

    async fn read_auth_step(&mut self) -> Result<AuthStep> {
        let timeout = self.io_timeout;
        let framed = self.framed()?;
        let result = with_timeout(timeout, framed.read_auth_step()).await;
        self.check_fatal(result)
    }

    fn framed(&mut self) -> Result<&mut FramedStream<S>> {
        let state = self.state;
        self.stream
            .as_mut()
            .ok_or_else(|| Error::InvalidState(format!("session is {state:?}")))
    }

    fn check_fatal<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                self.abort(e);
            }
        }
        result
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "session is {:?}, not Ready",
                self.state
            )))
        }
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "session is {:?}, expected {expected:?}",
                self.state
            )))
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }

    /// Drops the transport after a fatal error.
    fn abort(&mut self, reason: &Error) {
        if self.state != SessionState::Failed {
            warn!(error = %reason, state = ?self.state, "Session failed");
        }
        self.stream = None;
        self.state = SessionState::Failed;
    }

    /// Shuts the transport down and marks the session closed.
    async fn close(&mut self) {
        if let Some(mut framed) = self.stream.take() {
            if let Err(e) = with_timeout(self.io_timeout, framed.shutdown()).await {
                debug!(error = %e, "Transport shutdown failed");
            }
        }
        if self.state != SessionState::Failed {
            self.transition(SessionState::Closed);
        }
    }
}

async fn with_timeout<T>(timeout: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| Error::Timeout(timeout))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use super::*;
    use tokio_test::io::{Builder, Mock};

    impl Transport for Mock {
        async fn upgrade_to_tls(self, _host: &str) -> Result<Self> {
            Ok(self)
        }
    }

    const GREETING: &[u8] = b"\"IMPLEMENTATION\" \"Test Sieve\"\r\n\"SASL\" \"\"\r\n\"SIEVE\" \"fileinto vacation\"\r\n\"STARTTLS\"\r\n\"VERSION\" \"1.0\"\r\nOK \"Ready.\"\r\n";
    const TLS_BANNER: &[u8] = b"\"IMPLEMENTATION\" \"Test Sieve\"\r\n\"SASL\" \"PLAIN LOGIN\"\r\n\"SIEVE\" \"fileinto vacation\"\r\n\"VERSION\" \"1.0\"\r\nOK \"TLS negotiation successful.\"\r\n";
    const PLAIN_AUTH: &[u8] = b"AUTHENTICATE \"PLAIN\" \"AGFsaWNlAHNlY3JldA==\"\r\n";

    fn config() -> Config {
        Config::builder("sieve.example.com")
            .io_timeout(Duration::from_secs(5))
            .build()
    }

    fn credentials() -> Credentials {
        Credentials::new("alice", "secret")
    }

    fn bootstrap_script() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(GREETING)
            .write(b"STARTTLS\r\n")
            .read(b"OK \"Begin TLS negotiation now.\"\r\n")
            .read(TLS_BANNER)
            .write(PLAIN_AUTH)
            .read(b"OK \"Logged in.\"\r\n");
        builder
    }

    #[tokio::test]
    async fn test_bootstrap_reaches_ready() {
        let mock = bootstrap_script().build();
        let session = Session::establish(mock, &config(), &credentials(), "PLAIN")
            .await
            .unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.is_tls());
        assert!(session.is_authenticated());
        assert!(session.capabilities().supports_sasl("LOGIN"));
        assert!(!session.capabilities().starttls);
        assert_eq!(session.last_status(), Some(StatusKind::Ok));
        assert_eq!(session.last_message(), Some("\"Logged in.\""));
        assert!(!session.last_error());
    }

    #[tokio::test]
    async fn test_greeting_capabilities_recorded() {
        let mock = Builder::new().read(GREETING).build();
        let mut session = Session::new(mock, "sieve.example.com", Duration::from_secs(5));

        let caps = session.read_greeting().await.unwrap();
        assert!(caps.starttls);
        assert_eq!(caps.implementation.as_deref(), Some("Test Sieve"));
        assert_eq!(session.state(), SessionState::NegotiatingTls);
        assert_eq!(session.last_message(), Some("\"Ready.\""));
    }

    #[tokio::test]
    async fn test_unsupported_mechanism_sends_nothing() {
        // No scripted actions: any write would fail with BrokenPipe.
        let mock = Builder::new().build();
        let err = Session::establish(mock, &config(), &credentials(), "CRAM-MD5")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMechanism(m) if m == "CRAM-MD5"));
    }

    #[tokio::test]
    async fn test_starttls_refused() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"STARTTLS\r\n")
            .read(b"NO \"TLS not available\"\r\n")
            .build();
        let err = Session::establish(mock, &config(), &credentials(), "PLAIN")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TlsNotSupported(m) if m == "TLS not available"));
    }

    #[tokio::test]
    async fn test_cleartext_after_starttls_rejected() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"STARTTLS\r\n")
            .read(b"OK \"Begin TLS negotiation now.\"\r\ninjected\r\n")
            .build();
        let err = Session::establish(mock, &config(), &credentials(), "PLAIN")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }

    /// A transport whose TLS handshake never finishes.
    struct StalledHandshake(Mock);

    impl tokio::io::AsyncRead for StalledHandshake {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_read(cx, buf)
        }
    }

    impl tokio::io::AsyncWrite for StalledHandshake {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Pin::new(&mut self.0).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_shutdown(cx)
        }
    }

    impl Transport for StalledHandshake {
        async fn upgrade_to_tls(self, _host: &str) -> Result<Self> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tls_handshake_timeout_is_fatal() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"STARTTLS\r\n")
            .read(b"OK \"Begin TLS negotiation now.\"\r\n")
            .build();
        let mut session = Session::new(
            StalledHandshake(mock),
            "sieve.example.com",
            Duration::from_secs(5),
        );

        session.read_greeting().await.unwrap();
        let err = session.start_tls().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(5)));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(!session.is_tls());
    }

    #[tokio::test]
    async fn test_plain_rejected() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"STARTTLS\r\n")
            .read(b"OK\r\n")
            .read(TLS_BANNER)
            .write(PLAIN_AUTH)
            .read(b"NO \"Authentication failed.\"\r\n")
            .build();
        let err = Session::establish(mock, &config(), &credentials(), "PLAIN")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed(m) if m == "Authentication failed."));
    }

    #[tokio::test]
    async fn test_login_mechanism() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"STARTTLS\r\n")
            .read(b"OK\r\n")
            .read(TLS_BANNER)
            .write(b"AUTHENTICATE \"LOGIN\"\r\n")
            .read(b"\"VXNlcm5hbWU6\"\r\n")
            .write(b"\"YWxpY2U=\"\r\n")
            .read(b"\"UGFzc3dvcmQ6\"\r\n")
            .write(b"\"c2VjcmV0\"\r\n")
            .read(b"OK \"Logged in.\"\r\n")
            .build();
        let session = Session::establish(mock, &config(), &credentials(), "login")
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_unexpected_challenge_aborts_exchange() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"STARTTLS\r\n")
            .read(b"OK\r\n")
            .read(TLS_BANNER)
            .write(PLAIN_AUTH)
            .read(b"\"\"\r\n")
            .write(b"\"*\"\r\n")
            .read(b"NO \"Authentication aborted\"\r\n")
            .build();
        let err = Session::establish(mock, &config(), &credentials(), "PLAIN")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed(m) if m.contains("aborted")));
    }

    #[tokio::test]
    async fn test_execute_before_ready_is_rejected() {
        let mock = Builder::new().build();
        let mut session = Session::new(mock, "sieve.example.com", Duration::from_secs(5));
        let err = session.execute("LISTSCRIPTS", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(session.state(), SessionState::AwaitingBanner);
    }

    #[tokio::test]
    async fn test_execute_no_keeps_session_ready() {
        let mock = bootstrap_script()
            .write(b"DELETESCRIPT \"missing\"\r\n")
            .read(b"NO (NONEXISTENT) \"No such script\"\r\n")
            .write(b"NOOP\r\n")
            .read(b"OK\r\n")
            .build();
        let mut session = Session::establish(mock, &config(), &credentials(), "PLAIN")
            .await
            .unwrap();

        let response = session
            .execute("DELETESCRIPT \"missing\"", None)
            .await
            .unwrap();
        assert!(response.is_error());
        assert!(session.last_error());
        assert_eq!(session.state(), SessionState::Ready);

        let response = session.run(&Command::Noop).await.unwrap();
        assert!(response.is_ok());
        assert!(!session.last_error());
    }

    #[tokio::test]
    async fn test_bye_is_fatal() {
        let mock = bootstrap_script()
            .write(b"LISTSCRIPTS\r\n")
            .read(b"BYE Server shutting down\r\n")
            .build();
        let mut session = Session::establish(mock, &config(), &credentials(), "PLAIN")
            .await
            .unwrap();

        let err = session.run(&Command::ListScripts).await.unwrap_err();
        assert!(matches!(err, Error::ServerClosedConnection(m) if m == "Server shutting down"));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.state().is_terminal());

        let err = session.run(&Command::Noop).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_eof_is_fatal() {
        let mock = bootstrap_script().write(b"NOOP\r\n").build();
        let mut session = Session::establish(mock, &config(), &credentials(), "PLAIN")
            .await
            .unwrap();

        let err = session.run(&Command::Noop).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_is_fatal() {
        let mock = bootstrap_script()
            .write(b"NOOP\r\n")
            .wait(Duration::from_secs(60))
            .build();
        let mut session = Session::establish(mock, &config(), &credentials(), "PLAIN")
            .await
            .unwrap();

        let err = session.run(&Command::Noop).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(5)));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_logout() {
        let mock = bootstrap_script()
            .write(b"LOGOUT\r\n")
            .read(b"OK \"Logout completed.\"\r\n")
            .build();
        let session = Session::establish(mock, &config(), &credentials(), "PLAIN")
            .await
            .unwrap();

        let status = session.logout().await.unwrap();
        assert!(status.is_ok());
        assert_eq!(status.text(), "Logout completed.");
    }

    #[tokio::test]
    async fn test_logout_error_is_not_fatal() {
        let mock = bootstrap_script()
            .write(b"LOGOUT\r\n")
            .read(b"BYE \"Bye\"\r\n")
            .build();
        let session = Session::establish(mock, &config(), &credentials(), "PLAIN")
            .await
            .unwrap();

        assert!(session.logout().await.is_none());
    }

    #[tokio::test]
    async fn test_scope_logs_out_after_error() {
        let mock = bootstrap_script()
            .write(b"GETSCRIPT \"missing\"\r\n")
            .read(b"NO (NONEXISTENT) \"No such script\"\r\n")
            .write(b"LOGOUT\r\n")
            .read(b"OK\r\n")
            .build();
        let session = Session::establish(mock, &config(), &credentials(), "PLAIN")
            .await
            .unwrap();

        let result = session
            .scope(async |s| s.run(&Command::GetScript { name: "missing".into() }).await?.into_result())
            .await;
        let err = result.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(err.response_code(), Some(&crate::types::ResponseCode::NonExistent));
    }
}
