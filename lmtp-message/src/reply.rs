use bytes::Bytes;

use crate::error::ReplyParseError;

/// Whether a reply line is a continuation of a multiline reply or its final line, per
/// RFC 5321 §4.2.1: the fourth byte of the line is `-` for a continuation, ` ` for final.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineKind {
    Continuation,
    Final,
}

/// One parsed reply line, without its trailing CRLF.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReplyLine {
    code: u16,
    kind: LineKind,
    text: Bytes,
}

impl ReplyLine {
    /// Parse a single line, as handed over by `ReplyReader` (CRLF already stripped).
    ///
    /// Mirrors `lmtp_input_get_reply_code` in `lmtp-client.c`: the first three bytes must
    /// be ASCII digits, and the fourth must be a space (final) or a dash (continuation),
    /// per RFC 5321 §4.2. Anything else is a malformed reply.
    pub fn parse(line: Bytes) -> Result<ReplyLine, ReplyParseError> {
        if line.len() < 4 {
            return Err(ReplyParseError::Malformed(line));
        }
        let digits = &line[0..3];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(ReplyParseError::Malformed(line));
        }
        let code = (digits[0] - b'0') as u16 * 100
            + (digits[1] - b'0') as u16 * 10
            + (digits[2] - b'0') as u16;
        let kind = match line[3] {
            b' ' => LineKind::Final,
            b'-' => LineKind::Continuation,
            _ => return Err(ReplyParseError::Malformed(line)),
        };
        Ok(ReplyLine { code, kind, text: line })
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn kind(&self) -> LineKind {
        self.kind
    }

    /// `true` for a final line whose code starts with `2`, per RFC 5321 §4.2.1's
    /// reply-code severity classes (2yz success, 4yz/5yz failure).
    pub fn is_success(&self) -> bool {
        self.code / 100 == 2
    }

    /// The full line text (code, separator, and free text), exactly as received. This is
    /// what gets handed, verbatim, to recipient callbacks.
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// `text()` decoded lossily, for logging and for callback consumers that want a
    /// `&str`.
    pub fn text_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }
}
