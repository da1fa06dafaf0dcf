use bytes::Bytes;
use thiserror::Error;

/// A reply line that did not conform to the RFC 5321 §4.2 reply grammar: three ASCII
/// digits, then `-` or ` `, then free text, CRLF-terminated.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ReplyParseError {
    #[error("malformed reply line: {0:?}")]
    Malformed(Bytes),

    #[error("reply line exceeds the 1024 byte limit: {0:?}")]
    TooLong(Bytes),
}

impl ReplyParseError {
    /// The offending line itself, verbatim and without the error's own wrapping text.
    /// Callers that need to hand the server's line to a recipient callback (rather than
    /// log the error) should use this instead of `Display`.
    pub fn line(&self) -> &[u8] {
        match self {
            ReplyParseError::Malformed(line) | ReplyParseError::TooLong(line) => line,
        }
    }
}
