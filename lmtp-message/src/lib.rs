//! Wire-level vocabulary for LMTP/SMTP submission clients.
//!
//! This crate knows nothing about sessions, recipients, or sockets: it only turns bytes
//! into reply lines and commands into bytes. The session/recipient/state-machine side
//! lives in `lmtp-client`.

mod command;
mod error;
mod reader;
mod reply;

pub use command::{write_data, write_greeting, write_mail_from, write_rcpt_to, Protocol};
pub use error::ReplyParseError;
pub use reader::ReplyReader;
pub use reply::{LineKind, ReplyLine};

/// Maximum length of a single reply line, CRLF included. An oversize line is a protocol
/// error.
pub const MAX_REPLY_LINE_LEN: usize = 1024;
