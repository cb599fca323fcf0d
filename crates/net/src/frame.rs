//! Line framing
//!
//! Wire format: `<line>\n\r`, a line feed *followed* by a carriage return.
//! Maximum line length: 1MB (sanity limit)

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Line terminator used in both directions
pub const LINE_TERMINATOR: &[u8] = b"\n\r";

/// Number of greeting lines sent by the server on connect
pub const BANNER_LINES: usize = 2;

/// Maximum allowed line length (1MB)
const MAX_LINE_LENGTH: u64 = 1024 * 1024;

/// Read one line, without its terminator.
///
/// Returns `None` at end of stream. The `\r` half of the terminator shows up
/// at the start of the following read and is stripped there, so a read never
/// waits on it.
pub async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(MAX_LINE_LENGTH)
        .read_until(b'\n', &mut buf)
        .await?;

    if read == 0 {
        return Ok(None);
    }

    let complete = buf.last() == Some(&b'\n');
    if complete {
        buf.pop();
    } else if buf.len() as u64 >= MAX_LINE_LENGTH {
        return Err(Error::Protocol(format!(
            "Line too long (max {} bytes)",
            MAX_LINE_LENGTH
        )));
    }

    let mut line: &[u8] = &buf;
    if let Some(rest) = line.strip_prefix(b"\r") {
        line = rest;
    }
    if let Some(rest) = line.strip_suffix(b"\r") {
        line = rest;
    }

    // Unterminated leftover at end of stream (usually the final `\r`)
    if !complete && line.is_empty() {
        return Ok(None);
    }

    Ok(Some(String::from_utf8_lossy(line).into_owned()))
}

/// Write one line followed by the terminator, then flush
pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    if line.contains('\n') {
        return Err(Error::Protocol("Line contains a line feed".into()));
    }

    writer.write_all(line.as_bytes()).await?;
    writer.write_all(LINE_TERMINATOR).await?;

    // Flush to ensure delivery
    writer.flush().await?;

    Ok(())
}

/// Read and discard the greeting sent on connect
pub async fn skip_banner<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<()> {
    for _ in 0..BANNER_LINES {
        if read_line(reader).await?.is_none() {
            return Err(Error::ConnectionClosed);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn read_all(bytes: &[u8]) -> Vec<String> {
        let mut cursor = Cursor::new(bytes.to_vec());
        let mut lines = Vec::new();
        while let Some(line) = read_line(&mut cursor).await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_line_roundtrip() {
        let mut buf = Vec::new();
        write_line(&mut buf, "clientlist -uid").await.unwrap();
        write_line(&mut buf, "whoami").await.unwrap();
        assert_eq!(buf, b"clientlist -uid\n\rwhoami\n\r");

        assert_eq!(read_all(&buf).await, vec!["clientlist -uid", "whoami"]);
    }

    #[tokio::test]
    async fn test_terminator_is_consumed() {
        let lines = read_all(b"TS3\n\rWelcome\n\rerror id=0 msg=ok\n\r").await;
        assert_eq!(lines, vec!["TS3", "Welcome", "error id=0 msg=ok"]);
    }

    #[tokio::test]
    async fn test_empty_line_preserved() {
        let lines = read_all(b"a\n\r\n\rb\n\r").await;
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[tokio::test]
    async fn test_unterminated_tail_returned() {
        let lines = read_all(b"a\n\rpartial").await;
        assert_eq!(lines, vec!["a", "partial"]);
    }

    #[tokio::test]
    async fn test_eof() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(read_line(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_rejects_line_feed() {
        let mut buf = Vec::new();
        assert!(write_line(&mut buf, "a\nb").await.is_err());
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_skip_banner() {
        let mut cursor = Cursor::new(b"TS3\n\rWelcome to the query\n\rerror id=0 msg=ok\n\r".to_vec());
        skip_banner(&mut cursor).await.unwrap();
        assert_eq!(
            read_line(&mut cursor).await.unwrap().as_deref(),
            Some("error id=0 msg=ok")
        );
    }

    #[tokio::test]
    async fn test_skip_banner_on_closed_stream() {
        let mut cursor = Cursor::new(b"TS3\n\r".to_vec());
        let result = skip_banner(&mut cursor).await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_oversized_line_rejected() {
        let bytes = vec![b'a'; MAX_LINE_LENGTH as usize + 10];
        let mut cursor = Cursor::new(bytes);
        let result = read_line(&mut cursor).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }
}
