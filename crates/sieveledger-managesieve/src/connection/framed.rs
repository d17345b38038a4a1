//! Framed I/O for the ManageSieve protocol.
//!
//! ManageSieve uses CRLF-terminated lines with support for literals.
//! This module provides buffered reading and writing with proper
//! handling of that framing.

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::parser::{self, literal_marker};
use crate::types::Response;
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum literal size to prevent memory exhaustion.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// One step of a SASL exchange as seen from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStep {
    /// The server sent a challenge (still base64, quotes removed).
    Challenge(String),
    /// The server finished the exchange.
    Done(Response),
}

/// Framed connection for the ManageSieve protocol.
///
/// Handles line-based reading with literal support and buffered writing.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Reads one line with its CRLF stripped.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` on EOF before the line terminator.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::ConnectionClosed);
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..pos]);
                self.reader.consume(pos + 1);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::ProtocolViolation("line too long".to_string()));
            }
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }
        let line = String::from_utf8_lossy(&line).into_owned();
        tracing::trace!(line = %line, "S:");
        Ok(line)
    }

    /// Reads exactly `len` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` if the stream ends first.
    pub async fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.reader
            .read_exact(&mut data)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
                _ => Error::Io(e),
            })?;
        Ok(data)
    }

    /// Resolves literals at the end of a line.
    ///
    /// Each marker is replaced by the literal's text and the rest of the line
    /// that follows it on the wire. Raw payloads are returned in order.
    async fn complete_line(&mut self, mut line: String) -> Result<(String, Vec<Vec<u8>>)> {
        let mut literals = Vec::new();

        while let Some(marker) = literal_marker(&line)? {
            if marker.length > MAX_LITERAL_SIZE {
                return Err(Error::ProtocolViolation(format!(
                    "literal too large: {} bytes (max {MAX_LITERAL_SIZE})",
                    marker.length
                )));
            }
            let data = self.read_raw(marker.length).await?;
            let rest = self.read_line().await?;

            line.truncate(marker.offset);
            line.push_str(&String::from_utf8_lossy(&data));
            line.push_str(&rest);
            literals.push(data);

            if literal_marker(&rest)?.is_none() {
                break;
            }
        }

        Ok((line, literals))
    }

    /// Reads one complete response.
    ///
    /// Body lines accumulate until a line starting with `OK`, `NO` or `BYE`.
    /// SASL placeholder lines are dropped wherever they appear; other lines,
    /// empty ones included, are kept in order.
    ///
    /// # Errors
    ///
    /// Returns `ServerClosedConnection` for `BYE`, `ProtocolViolation` for an
    /// unrecognized status token, and `ConnectionClosed` on EOF.
    pub async fn read_response(&mut self) -> Result<Response> {
        let mut lines = Vec::new();
        let mut literals = Vec::new();

        loop {
            let line = self.read_line().await?;

            if parser::is_sasl_placeholder(&line) {
                continue;
            }

            if parser::is_status_line(&line) {
                let (kind, message) = parser::parse_status_line(&line)?;
                let (message, _) = self.complete_line(message).await?;
                let status = parser::classify(kind, message)?;
                return Ok(Response {
                    lines,
                    literals,
                    status,
                });
            }

            let (line, mut line_literals) = self.complete_line(line).await?;
            lines.push(line);
            literals.append(&mut line_literals);
        }
    }

    /// Reads the server's next move during AUTHENTICATE.
    ///
    /// Unlike [`Self::read_response`], a non-status line here is a challenge
    /// and ends the read.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read_response`].
    pub async fn read_auth_step(&mut self) -> Result<AuthStep> {
        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                continue;
            }

            if parser::is_status_line(&line) {
                let (kind, message) = parser::parse_status_line(&line)?;
                let (message, _) = self.complete_line(message).await?;
                let status = parser::classify(kind, message)?;
                return Ok(AuthStep::Done(Response::new(Vec::new(), status)));
            }

            let (challenge, _) = self.complete_line(line).await?;
            return Ok(AuthStep::Challenge(parser::unquote(&challenge)));
        }
    }

    /// Writes a command line followed by CRLF and an optional literal.
    ///
    /// The literal is followed by the CRLF that ends the command.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the write or flush fails.
    pub async fn write_command(&mut self, line: &str, literal: Option<&[u8]>) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(line.as_bytes());
        self.write_buffer.extend_from_slice(b"\r\n");
        if let Some(literal) = literal {
            self.write_buffer.extend_from_slice(literal);
            self.write_buffer.extend_from_slice(b"\r\n");
        }

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Shuts down the write side of the stream.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the shutdown fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Returns true if bytes are buffered but not yet consumed.
    pub fn has_buffered_data(&self) -> bool {
        !self.reader.buffer().is_empty()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Note: Any buffered data will be lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::StatusKind;
    use proptest::prelude::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_line_strips_crlf() {
        let mock = Builder::new().read(b"\"SASL\" \"PLAIN\"\r\n").build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_line().await.unwrap(), "\"SASL\" \"PLAIN\"");
    }

    #[tokio::test]
    async fn test_read_line_split_across_reads() {
        let mock = Builder::new().read(b"OK \"done\"\r").read(b"\n").build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_line().await.unwrap(), "OK \"done\"");
    }

    #[tokio::test]
    async fn test_read_line_eof_mid_line() {
        let mock = Builder::new().read(b"OK \"trunc").build();
        let mut framed = FramedStream::new(mock);
        let err = framed.read_line().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_read_raw_then_line_resumes_after_payload() {
        let mock = Builder::new().read(b"hello\r\nnext\r\n").build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_raw(5).await.unwrap(), b"hello");
        assert_eq!(framed.read_line().await.unwrap(), "");
        assert_eq!(framed.read_line().await.unwrap(), "next");
    }

    #[tokio::test]
    async fn test_read_raw_eof() {
        let mock = Builder::new().read(b"abc").build();
        let mut framed = FramedStream::new(mock);
        let err = framed.read_raw(5).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_response_body_and_ok() {
        let mock = Builder::new()
            .read(b"\"summer\"\r\n\"vacation\" ACTIVE\r\nOK \"Listscripts completed.\"\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response.lines, vec!["\"summer\"", "\"vacation\" ACTIVE"]);
        assert_eq!(response.status.kind, StatusKind::Ok);
        assert!(!response.is_error());
        assert_eq!(response.status.text(), "Listscripts completed.");
    }

    #[tokio::test]
    async fn test_response_no_message() {
        let mock = Builder::new().read(b"NO Some message\r\n").build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert!(response.is_error());
        assert_eq!(response.status.message, "Some message");
        assert!(response.lines.is_empty());
    }

    #[tokio::test]
    async fn test_response_bye() {
        let mock = Builder::new().read(b"BYE Server shutting down\r\n").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(matches!(err, Error::ServerClosedConnection(m) if m == "Server shutting down"));
    }

    #[tokio::test]
    async fn test_response_unknown_status_token() {
        let mock = Builder::new().read(b"OKAY fine\r\n").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn test_status_literal_positions_cursor_after_payload() {
        let mock = Builder::new()
            .read(b"NO {5+}\r\nhello\r\nOK\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert!(response.is_error());
        assert_eq!(response.status.message, "hello");
        assert!(response.literals.is_empty());

        // The next response starts right after the literal's CRLF.
        let next = framed.read_response().await.unwrap();
        assert!(next.is_ok());
        assert!(next.lines.is_empty());
    }

    #[tokio::test]
    async fn test_status_literal_keeps_response_code() {
        let mock = Builder::new()
            .read(b"OK (WARNINGS) {21}\r\nline 3: unused import\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response.status.code(), Some(crate::types::ResponseCode::Warnings));
        assert_eq!(response.status.text(), "line 3: unused import");
    }

    #[tokio::test]
    async fn test_body_literal_is_binary_safe() {
        let script = b"require \"fileinto\";\r\nOK this is not a status\r\n";
        let mut wire = format!("{{{}}}\r\n", script.len()).into_bytes();
        wire.extend_from_slice(script);
        wire.extend_from_slice(b"\r\nOK \"Getscript completed.\"\r\n");

        let mock = Builder::new().read(&wire).build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert!(response.is_ok());
        assert_eq!(response.literal(), Some(&script[..]));
        assert_eq!(response.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_literal_script_name_with_active_marker() {
        let mock = Builder::new()
            .read(b"{6}\r\nweird\" ACTIVE\r\n\"plain\"\r\nOK\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response.lines, vec!["weird\" ACTIVE", "\"plain\""]);
        assert_eq!(response.literals, vec![b"weird\"".to_vec()]);
    }

    #[tokio::test]
    async fn test_placeholders_dropped_but_empty_lines_kept() {
        let mock = Builder::new()
            .read(b"\"a\"\r\n\r\n\"VXNlcm5hbWU6\"\r\n\"\"\r\n\"b\"\r\n\"UGFzc3dvcmQ6\"\r\nOK\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response.lines, vec!["\"a\"", "", "\"b\""]);
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        let literal_size = MAX_LITERAL_SIZE + 1;
        let header = format!("NO {{{literal_size}}}\r\n");

        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn test_literal_count_overflow_is_rejected() {
        let mock = Builder::new()
            .read(b"{184467440737095516160}\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(m) if m.contains("out of range")));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_line().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn test_auth_step_challenge_and_done() {
        let mock = Builder::new()
            .read(b"\"VXNlcm5hbWU6\"\r\nOK \"Logged in.\"\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(
            framed.read_auth_step().await.unwrap(),
            AuthStep::Challenge("VXNlcm5hbWU6".to_string())
        );
        match framed.read_auth_step().await.unwrap() {
            AuthStep::Done(response) => assert_eq!(response.status.text(), "Logged in."),
            AuthStep::Challenge(c) => panic!("unexpected challenge {c}"),
        }
    }

    #[tokio::test]
    async fn test_auth_step_bye() {
        let mock = Builder::new().read(b"BYE \"Too many failures\"\r\n").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_auth_step().await.unwrap_err();
        assert!(matches!(err, Error::ServerClosedConnection(m) if m == "Too many failures"));
    }

    #[tokio::test]
    async fn test_write_command_with_literal() {
        let mock = Builder::new()
            .write(b"PUTSCRIPT \"a\" {5+}\r\nstop;\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        framed
            .write_command("PUTSCRIPT \"a\" {5+}", Some(b"stop;"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_write_command_plain() {
        let mock = Builder::new().write(b"LISTSCRIPTS\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_command("LISTSCRIPTS", None).await.unwrap();
    }

    fn body_line() -> impl Strategy<Value = String> {
        // Printable lines that are neither status lines nor placeholders.
        "[a-z\" ][a-zA-Z0-9 \"._-]{0,40}"
            .prop_filter("not a marker", |l| matches!(literal_marker(l), Ok(None)))
            .prop_filter("not a placeholder", |l| !parser::is_sasl_placeholder(l))
    }

    proptest! {
        #[test]
        fn body_of_k_lines_is_preserved(lines in prop::collection::vec(body_line(), 0..20)) {
            let mut wire = String::new();
            for line in &lines {
                wire.push_str(line);
                wire.push_str("\r\n");
            }
            wire.push_str("OK \"done\"\r\n");

            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let response = rt.block_on(async {
                let mut framed = FramedStream::new(std::io::Cursor::new(wire.into_bytes()));
                framed.read_response().await
            }).unwrap();

            prop_assert_eq!(&response.lines, &lines);
            prop_assert!(response.is_ok());
        }
    }
}
