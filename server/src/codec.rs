//! Content-Length framing for JSON-RPC over a byte stream.
//!
//! Each message is `Content-Length: <n>\r\n\r\n` followed by exactly `n`
//! bytes of UTF-8 JSON. Header names are case-insensitive and unknown
//! headers are skipped, per the LSP base protocol.

use anyhow::{Context, bail};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on a single frame body; larger announcements are treated as
/// a corrupt stream.
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
        }
    }

    /// Reads one framed message, returning the raw body bytes.
    ///
    /// Returns `Ok(None)` on a clean end of stream, meaning EOF before the
    /// first header byte. EOF anywhere else is an error: the peer hung up
    /// in the middle of a message.
    pub async fn read_frame(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(length) = self.read_headers().await? else {
            return Ok(None);
        };
        if length > MAX_FRAME_BYTES {
            bail!("frame of {length} bytes exceeds the {MAX_FRAME_BYTES}-byte limit");
        }

        let mut body = vec![0u8; length];
        self.reader
            .read_exact(&mut body)
            .await
            .context("transport closed mid-body")?;
        Ok(Some(body))
    }

    /// Consumes one header block and returns the announced body length.
    async fn read_headers(&mut self) -> anyhow::Result<Option<usize>> {
        let mut content_length = None;
        let mut in_headers = false;
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .context("failed to read header line")?;
            if read == 0 {
                if in_headers {
                    bail!("transport closed mid-headers");
                }
                return Ok(None);
            }
            in_headers = true;

            let line = line.trim_end();
            if line.is_empty() {
                let Some(length) = content_length else {
                    bail!("header block without a Content-Length header");
                };
                return Ok(Some(length));
            }
            if let Some((name, value)) = line.split_once(':')
                && name.trim().eq_ignore_ascii_case("Content-Length")
            {
                let value = value.trim();
                content_length = Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid Content-Length value {value:?}"))?,
                );
            }
        }
    }
}

pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { writer: inner }
    }

    /// Serializes `message` and writes it as one framed message.
    pub async fn write_frame(&mut self, message: &Value) -> anyhow::Result<()> {
        let body = serde_json::to_vec(message).context("failed to encode message body")?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        self.writer
            .write_all(header.as_bytes())
            .await
            .context("failed to write frame header")?;
        self.writer
            .write_all(&body)
            .await
            .context("failed to write frame body")?;
        self.writer.flush().await.context("failed to flush frame")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameReader, FrameWriter, MAX_FRAME_BYTES};
    use serde_json::json;

    fn frame(body: &str) -> Vec<u8> {
        let mut bytes = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        bytes.extend_from_slice(body.as_bytes());
        bytes
    }

    // ── Reading ──

    #[tokio::test]
    async fn test_read_single_frame() {
        let input = frame(r#"{"jsonrpc":"2.0"}"#);
        let mut reader = FrameReader::new(input.as_slice());
        let body = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(body, br#"{"jsonrpc":"2.0"}"#);
    }

    #[tokio::test]
    async fn test_read_consecutive_frames() {
        let mut input = frame(r#"{"a":1}"#);
        input.extend(frame(r#"{"b":2}"#));
        let mut reader = FrameReader::new(input.as_slice());
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), br#"{"a":1}"#);
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), br#"{"b":2}"#);
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clean_eof_returns_none() {
        let mut reader = FrameReader::new(&[][..]);
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_header_name_is_case_insensitive() {
        let input = b"content-length: 2\r\n\r\n{}".to_vec();
        let mut reader = FrameReader::new(input.as_slice());
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_unknown_headers_are_skipped() {
        let input =
            b"Content-Type: application/vscode-jsonrpc\r\nContent-Length: 2\r\n\r\n{}".to_vec();
        let mut reader = FrameReader::new(input.as_slice());
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_missing_content_length_is_an_error() {
        let input = b"Content-Type: application/json\r\n\r\n{}".to_vec();
        let mut reader = FrameReader::new(input.as_slice());
        assert!(reader.read_frame().await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_content_length_is_an_error() {
        let input = b"Content-Length: many\r\n\r\n{}".to_vec();
        let mut reader = FrameReader::new(input.as_slice());
        assert!(reader.read_frame().await.is_err());
    }

    #[tokio::test]
    async fn test_eof_mid_headers_is_an_error() {
        let input = b"Content-Length: 2\r\n".to_vec();
        let mut reader = FrameReader::new(input.as_slice());
        assert!(reader.read_frame().await.is_err());
    }

    #[tokio::test]
    async fn test_eof_mid_body_is_an_error() {
        let input = b"Content-Length: 10\r\n\r\n{}".to_vec();
        let mut reader = FrameReader::new(input.as_slice());
        assert!(reader.read_frame().await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let input = format!("Content-Length: {}\r\n\r\n", MAX_FRAME_BYTES + 1).into_bytes();
        let mut reader = FrameReader::new(input.as_slice());
        assert!(reader.read_frame().await.is_err());
    }

    // ── Writing ──

    #[tokio::test]
    async fn test_write_frame_counts_utf8_bytes() {
        let mut out = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut out);
            writer.write_frame(&json!({"msg": "héllo"})).await.unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        let (header, body) = text.split_once("\r\n\r\n").unwrap();
        let length: usize = header
            .strip_prefix("Content-Length: ")
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(length, body.len());
        assert!(body.contains("héllo"));
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let message = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"});
        let mut out = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut out);
            writer.write_frame(&message).await.unwrap();
        }
        let mut reader = FrameReader::new(out.as_slice());
        let body = reader.read_frame().await.unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, message);
    }
}
