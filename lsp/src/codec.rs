//! Content-Length framing for JSON-RPC over stdio.
//!
//! Each message is `Content-Length: N\r\n\r\n` followed by exactly `N` bytes of
//! UTF-8 JSON. Other headers (e.g. `Content-Type`) are accepted and ignored.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on a single message body (4 MiB).
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

const CONTENT_LENGTH: &str = "Content-Length";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        source: io::Error,
    },
    #[error("stream ended inside a message header")]
    TruncatedHeader,
    #[error("message header has no Content-Length")]
    MissingContentLength,
    #[error("invalid Content-Length value {0:?}")]
    InvalidContentLength(String),
    #[error("Content-Length {len} exceeds maximum {max}", max = MAX_MESSAGE_BYTES)]
    TooLarge { len: usize },
    #[error("message body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_err(context: &'static str) -> impl FnOnce(io::Error) -> CodecError {
    move |source| CodecError::Io { context, source }
}

/// Split a header line into name and value. Lines without a colon yield `None`.
fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    Some((name.trim(), value.trim()))
}

/// Reads framed messages from the server's stdout.
pub struct MessageReader<R> {
    inner: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            line: String::new(),
        }
    }

    /// Next message, or `Ok(None)` when the stream ends cleanly between messages.
    pub async fn read_message(&mut self) -> Result<Option<serde_json::Value>, CodecError> {
        let Some(len) = self.read_header().await? else {
            return Ok(None);
        };
        if len > MAX_MESSAGE_BYTES {
            return Err(CodecError::TooLarge { len });
        }

        let mut body = vec![0u8; len];
        self.inner
            .read_exact(&mut body)
            .await
            .map_err(io_err("reading message body"))?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    async fn read_header(&mut self) -> Result<Option<usize>, CodecError> {
        let mut content_length = None;
        let mut started = false;

        loop {
            self.line.clear();
            let n = self
                .inner
                .read_line(&mut self.line)
                .await
                .map_err(io_err("reading message header"))?;
            if n == 0 {
                return if started {
                    Err(CodecError::TruncatedHeader)
                } else {
                    Ok(None)
                };
            }
            started = true;

            let line = self.line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = parse_header_line(line)
                && name.eq_ignore_ascii_case(CONTENT_LENGTH)
            {
                let len = value
                    .parse::<usize>()
                    .map_err(|_| CodecError::InvalidContentLength(value.to_string()))?;
                content_length = Some(len);
            }
        }

        content_length
            .map(Some)
            .ok_or(CodecError::MissingContentLength)
    }
}

/// Writes framed messages to the server's stdin.
pub struct MessageWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { inner: writer }
    }

    pub async fn write_message(&mut self, message: &serde_json::Value) -> Result<(), CodecError> {
        let body = serde_json::to_vec(message)?;
        let mut frame = format!("{CONTENT_LENGTH}: {}\r\n\r\n", body.len()).into_bytes();
        frame.extend_from_slice(&body);

        self.inner
            .write_all(&frame)
            .await
            .map_err(io_err("writing message"))?;
        self.inner
            .flush()
            .await
            .map_err(io_err("flushing message"))
    }

    /// Flush and close the underlying stream, signalling EOF to the server.
    pub async fn close(&mut self) -> Result<(), CodecError> {
        self.inner
            .shutdown()
            .await
            .map_err(io_err("closing stdin"))
    }
}
