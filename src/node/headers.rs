//! Reading HTTP/1.x request header blocks off a stream.

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 1024;

/// The head of a request, split into its request line and header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    /// e.g. `GET / HTTP/1.1`
    pub request_line: String,
    /// Raw header field lines, CRLF-separated, without the blank terminator line.
    pub fields: Vec<u8>,
}

#[derive(Debug)]
pub enum HeaderError {
    /// The head exceeded the configured limit.
    TooLarge { limit: usize },
    /// The head could not be parsed.
    Malformed(&'static str),
    /// The peer closed before sending anything.
    Closed,
    Io(std::io::Error),
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderError::TooLarge { limit } => write!(f, "header block exceeds {} bytes", limit),
            HeaderError::Malformed(why) => write!(f, "malformed header block: {}", why),
            HeaderError::Closed => write!(f, "connection closed before a request"),
            HeaderError::Io(e) => write!(f, "read failed: {}", e),
        }
    }
}

impl std::error::Error for HeaderError {}

/// Read until the blank line ending the head, at most `limit` bytes of head.
///
/// Anything after the terminator (a request body) is left unread.
pub async fn read_header_block<R>(reader: &mut R, limit: usize) -> Result<HeaderBlock, HeaderError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await.map_err(HeaderError::Io)?;
        if n == 0 {
            return Err(if buf.is_empty() {
                HeaderError::Closed
            } else {
                HeaderError::Malformed("truncated header block")
            });
        }

        // Resume the terminator search just before the new bytes.
        let search_from = buf.len().saturating_sub(3);
        buf.extend_from_slice(&chunk[..n]);

        if let Some(head_len) = find_terminator(&buf[search_from..]).map(|end| search_from + end) {
            if head_len > limit {
                return Err(HeaderError::TooLarge { limit });
            }
            return split_head(&buf[..head_len]);
        }
        if buf.len() > limit {
            return Err(HeaderError::TooLarge { limit });
        }
    }
}

/// Length of the head before the first `\r\n\r\n` or `\n\n`.
fn find_terminator(buf: &[u8]) -> Option<usize> {
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n");
    let lf = buf.windows(2).position(|w| w == b"\n\n");
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn split_head(head: &[u8]) -> Result<HeaderBlock, HeaderError> {
    let (line, fields) = match head.iter().position(|b| *b == b'\n') {
        Some(i) => (&head[..i], &head[i + 1..]),
        None => (head, &head[head.len()..]),
    };
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let line = std::str::from_utf8(line)
        .map_err(|_| HeaderError::Malformed("request line is not UTF-8"))?;

    let mut parts = line.split(' ').filter(|p| !p.is_empty());
    let (Some(_method), Some(_target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(HeaderError::Malformed("request line must be `METHOD TARGET VERSION`"));
    };
    if !version.starts_with("HTTP/") {
        return Err(HeaderError::Malformed("unsupported protocol version"));
    }

    // `\n\n` terminators leave a trailing `\r` when mixed with CRLF lines.
    let fields = fields.strip_suffix(b"\r").unwrap_or(fields);

    Ok(HeaderBlock {
        request_line: line.to_string(),
        fields: fields.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read(input: &[u8], limit: usize) -> Result<HeaderBlock, HeaderError> {
        let mut input = input;
        read_header_block(&mut input, limit).await
    }

    #[tokio::test]
    async fn splits_request_line_and_fields() {
        let block = read(b"GET / HTTP/1.1\r\nX-Test: 1\r\n\r\nbody", 1024).await.unwrap();
        assert_eq!(block.request_line, "GET / HTTP/1.1");
        assert_eq!(block.fields, b"X-Test: 1");
    }

    #[tokio::test]
    async fn keeps_multiple_fields_verbatim() {
        let block = read(b"POST /x HTTP/1.0\r\nHost: a\r\nContent-Type: text/plain\r\n\r\n", 1024)
            .await
            .unwrap();
        assert_eq!(block.fields, b"Host: a\r\nContent-Type: text/plain");
    }

    #[tokio::test]
    async fn accepts_bare_lf() {
        let block = read(b"GET / HTTP/1.1\nHost: a\n\n", 1024).await.unwrap();
        assert_eq!(block.fields, b"Host: a");
    }

    #[tokio::test]
    async fn request_without_fields() {
        let block = read(b"GET / HTTP/1.1\r\n\r\n", 1024).await.unwrap();
        assert!(block.fields.is_empty());
    }

    #[tokio::test]
    async fn oversized_head_rejected() {
        let mut input = b"GET / HTTP/1.1\r\n".to_vec();
        input.extend(std::iter::repeat(b'a').take(200));
        input.extend_from_slice(b": b\r\n\r\n");

        let err = read(&input, 64).await.unwrap_err();
        assert!(matches!(err, HeaderError::TooLarge { limit: 64 }));
    }

    #[tokio::test]
    async fn garbage_request_line_rejected() {
        let err = read(b"hello\r\n\r\n", 1024).await.unwrap_err();
        assert!(matches!(err, HeaderError::Malformed(_)));
    }

    #[tokio::test]
    async fn empty_and_truncated_streams() {
        assert!(matches!(read(b"", 1024).await, Err(HeaderError::Closed)));
        assert!(matches!(
            read(b"GET / HTTP/1.1\r\nHost", 1024).await,
            Err(HeaderError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn terminator_split_across_reads() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            client.write_all(b"GET / HTTP/1.1\r\nA: 1\r").await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            client.write_all(b"\n\r\n").await.unwrap();
            client
        });

        let block = read_header_block(&mut server, 1024).await.unwrap();
        assert_eq!(block.fields, b"A: 1");
        drop(writer.await.unwrap());
    }
}
