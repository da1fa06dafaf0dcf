use std::{io, net::AddrParseError};

use thiserror::Error;

/// The synchronous error path out of `Dialer::connect`: a malformed address or a socket
/// that could not be created. Everything else is asynchronous, reported through a
/// recipient or data callback as a synthesized failure line rather than returned as a
/// value.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("{host:?} is not a valid IP address")]
    InvalidAddress {
        host: String,
        #[source]
        source: AddrParseError,
    },

    #[error("failed to create a nonblocking socket")]
    SocketCreation(#[source] io::Error),
}

/// Canned lines for connection-level failures, in the enhanced-status-code shape RFC
/// 3463 defines for `4.4.0` (other or undefined network/routing failure). The
/// `(connect)` suffix matches `lmtp-client.c`'s own wording; `DISCONNECTED` and
/// `DISCONNECTED_IN_OUTPUT` follow the same shape for its other two failure sites:
/// losing the connection while reading, and while flushing output.
pub mod canned {
    pub const CONNECT_FAILED: &str = "451 4.4.0 Remote server not answering (connect)";
    pub const DISCONNECTED: &str = "451 4.4.0 Remote server not answering (disconnected)";
    pub const DISCONNECTED_IN_OUTPUT: &str =
        "451 4.4.0 Remote server not answering (disconnected in output)";
}
