use bytes::{Buf, Bytes, BytesMut};

use crate::{error::ReplyParseError, reply::ReplyLine, MAX_REPLY_LINE_LEN};

/// Consumes server bytes and yields complete CRLF-terminated reply lines, bounded by
/// `max_line_len`.
///
/// Holds no socket of its own: callers `feed()` it bytes as they arrive and drain
/// complete lines with `next_line()`.
pub struct ReplyReader {
    buf: BytesMut,
    max_line_len: usize,
}

impl ReplyReader {
    pub fn new() -> Self {
        Self::with_max_line_len(MAX_REPLY_LINE_LEN)
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        ReplyReader {
            buf: BytesMut::new(),
            max_line_len,
        }
    }

    /// Append bytes read from the transport.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pull the next complete line out of the buffer, if any.
    ///
    /// Returns `Ok(None)` when the buffer holds only a partial line so far (call again
    /// after the next `feed`). Returns `Err` once a line would exceed `max_line_len` with
    /// no CRLF found yet; this is treated as a protocol error.
    pub fn next_line(&mut self) -> Result<Option<ReplyLine>, ReplyParseError> {
        match find_crlf(&self.buf) {
            Some(pos) => {
                let line = self.buf.split_to(pos).freeze();
                self.buf.advance(2); // the CRLF itself
                if line.len() + 2 > self.max_line_len {
                    return Err(ReplyParseError::TooLong(line));
                }
                Ok(Some(ReplyLine::parse(line)?))
            }
            None => {
                if self.buf.len() + 2 > self.max_line_len {
                    Err(ReplyParseError::TooLong(Bytes::copy_from_slice(&self.buf)))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

impl Default for ReplyReader {
    fn default() -> Self {
        Self::new()
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_nothing_on_partial_line() {
        let mut r = ReplyReader::new();
        r.feed(b"250 ok");
        assert_eq!(r.next_line().unwrap(), None);
    }

    #[test]
    fn yields_line_once_crlf_seen() {
        let mut r = ReplyReader::new();
        r.feed(b"250 ok\r\n");
        let line = r.next_line().unwrap().unwrap();
        assert_eq!(line.code(), 250);
        assert_eq!(r.next_line().unwrap(), None);
    }

    #[test]
    fn yields_multiple_lines_fed_across_calls() {
        let mut r = ReplyReader::new();
        r.feed(b"250-a\r\n25");
        assert_eq!(r.next_line().unwrap().unwrap().kind(), crate::LineKind::Continuation);
        assert_eq!(r.next_line().unwrap(), None);
        r.feed(b"0 b\r\n");
        let line = r.next_line().unwrap().unwrap();
        assert_eq!(line.kind(), crate::LineKind::Final);
    }

    #[test]
    fn splits_lines_fed_in_one_buffer() {
        let mut r = ReplyReader::new();
        r.feed(b"250-one\r\n250 two\r\n");
        assert!(r.next_line().unwrap().unwrap().kind() == crate::LineKind::Continuation);
        assert!(r.next_line().unwrap().unwrap().kind() == crate::LineKind::Final);
        assert_eq!(r.next_line().unwrap(), None);
    }

    #[test]
    fn oversize_line_without_crlf_is_an_error() {
        let mut r = ReplyReader::with_max_line_len(16);
        r.feed(b"250 way too long for this buffer");
        assert!(r.next_line().is_err());
    }

    #[test]
    fn oversize_line_with_crlf_is_still_an_error() {
        let mut r = ReplyReader::with_max_line_len(10);
        r.feed(b"250 abcdefgh\r\n");
        assert!(r.next_line().is_err());
    }
}
