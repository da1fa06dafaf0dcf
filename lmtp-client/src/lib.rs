//! Nonblocking, pipelined LMTP/SMTP submission client core: delivers one message to many
//! recipients over a single connection, reporting per-recipient acceptance and final
//! delivery status through callbacks.
//!
//! The wire vocabulary (reply parsing, command serialization) lives in `lmtp-message`;
//! this crate is the session, its state machine, the DATA writer, and the transport glue.

mod body;
mod config;
mod dialer;
mod error;
mod io;
mod recipient;
mod session;
mod state;
mod writer;

pub use body::{BodyPoll, BodySource, PushBody, SliceBody};
pub use config::ClientConfig;
pub use dialer::Dialer;
pub use error::ConnectError;
pub use lmtp_message::Protocol;
pub use recipient::Callback;
pub use session::Session;
