//! Stream types for ManageSieve connections.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::{Error, Result};

/// A byte stream a session can run over.
///
/// The session upgrades it in place after a successful STARTTLS.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Sized {
    /// Performs the TLS handshake on this stream.
    ///
    /// # Errors
    ///
    /// Returns `TlsNegotiationFailed` if the handshake does not complete.
    fn upgrade_to_tls(self, host: &str) -> impl Future<Output = Result<Self>>;
}

/// A stream that can be either plaintext or TLS.
pub enum SieveStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl std::fmt::Debug for SieveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("SieveStream::Plain"),
            Self::Tls(_) => f.write_str("SieveStream::Tls"),
        }
    }
}

impl Transport for SieveStream {
    async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => {
                let connector = create_tls_connector();
                let server_name = ServerName::try_from(host.to_string()).map_err(|e| {
                    Error::TlsNegotiationFailed(format!("invalid server name {host}: {e}"))
                })?;
                let tls = connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(|e| Error::TlsNegotiationFailed(e.to_string()))?;
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(Error::InvalidState("Stream is already TLS".to_string())),
        }
    }
}

impl SieveStream {
    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for SieveStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SieveStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector with the webpki root certificates.
///
/// rustls offers TLS 1.3 and 1.2 and picks the highest both sides support.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Opens a plaintext TCP connection, ready for STARTTLS.
///
/// # Errors
///
/// Returns `ConnectionFailed` if the socket cannot be opened within
/// `timeout`. A deadline miss carries an `io::ErrorKind::TimedOut` source.
pub async fn connect_plain(host: &str, port: u16, timeout: Duration) -> Result<SieveStream> {
    let address = format!("{host}:{port}");
    let tcp = connect_within(address.clone(), timeout, TcpStream::connect(&address)).await?;
    Ok(SieveStream::Plain(tcp))
}

async fn connect_within<T>(
    address: String,
    timeout: Duration,
    connect: impl Future<Output = io::Result<T>>,
) -> Result<T> {
    let source = match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(stream)) => return Ok(stream),
        Ok(Err(e)) => e,
        Err(_) => io::Error::from(io::ErrorKind::TimedOut),
    };
    Err(Error::ConnectionFailed { address, source })
}
