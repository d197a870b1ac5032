//! Base-protocol framing for the CLI's stdio JSON-RPC server.
//!
//! Every message is `Content-Length: N\r\n\r\n` followed by exactly `N`
//! bytes of UTF-8 JSON, with no trailing newline. Other headers (such as
//! `Content-Type`) are accepted and ignored.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{CopilotAgentError, Result};

/// Upper bound on a single incoming message body.
const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

const CONTENT_LENGTH: &str = "content-length";

// ─── Writing ──────────────────────────────────────────────────────────────

/// Serialize `msg` and prefix it with its `Content-Length` header.
pub(crate) fn encode(msg: &impl serde::Serialize) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(msg).map_err(|e| {
        CopilotAgentError::Process(format!("failed to serialize stdin message: {e}"))
    })?;
    let mut buf = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Write one framed message and flush.
pub(crate) async fn write_message<W>(writer: &mut W, msg: &impl serde::Serialize) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode(msg)?;
    writer.write_all(&buf).await.map_err(CopilotAgentError::Io)?;
    writer.flush().await.map_err(CopilotAgentError::Io)?;
    Ok(())
}

// ─── Reading ──────────────────────────────────────────────────────────────

/// Splits a byte stream back into message bodies.
pub(crate) struct MessageReader<R> {
    inner: R,
    header: String,
}

impl<R: AsyncBufRead + Unpin> MessageReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            header: String::new(),
        }
    }

    /// Read the next message body.
    ///
    /// Returns `Ok(None)` on EOF between messages; EOF inside a message is
    /// an `UnexpectedEof` error.
    pub(crate) async fn next_message(&mut self) -> io::Result<Option<String>> {
        let mut content_length = None;
        let mut in_headers = false;
        loop {
            self.header.clear();
            if self.inner.read_line(&mut self.header).await? == 0 {
                if in_headers {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream ended inside message headers",
                    ));
                }
                return Ok(None);
            }
            let line = self.header.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                if in_headers {
                    break;
                }
                // Stray separator between messages.
                continue;
            }
            in_headers = true;
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                    content_length = Some(parse_length(value.trim())?);
                }
            }
        }

        let len = content_length.ok_or_else(|| invalid("message without Content-Length header"))?;
        let mut body = vec![0u8; len];
        self.inner.read_exact(&mut body).await?;
        String::from_utf8(body)
            .map(Some)
            .map_err(|e| invalid(format!("message body is not UTF-8: {e}")))
    }
}

fn parse_length(raw: &str) -> io::Result<usize> {
    let len: usize = raw
        .parse()
        .map_err(|_| invalid(format!("bad Content-Length: {raw}")))?;
    if len > MAX_MESSAGE_BYTES {
        return Err(invalid(format!("message of {len} bytes exceeds limit")));
    }
    Ok(len)
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}
