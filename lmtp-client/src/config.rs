use lmtp_message::Protocol;

use crate::writer::DEFAULT_HIGH_WATER_MARK;

/// Bundles the parameters `create`/`connect` already take (sender, hostname, protocol,
/// host, port) plus the two fixed-but-overridable limits this client ships defaults for:
/// the reply-line length cap and the DATA high-water mark.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub sender: String,
    pub my_hostname: String,
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub max_reply_line_len: usize,
    pub high_water_mark: usize,
}

impl ClientConfig {
    /// `sender` must already include its own angle brackets; `my_hostname` must be
    /// nonempty. `host` is a dotted/colonned IP literal; name resolution is the caller's
    /// job.
    pub fn new(
        sender: impl Into<String>,
        my_hostname: impl Into<String>,
        protocol: Protocol,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        ClientConfig {
            sender: sender.into(),
            my_hostname: my_hostname.into(),
            protocol,
            host: host.into(),
            port,
            max_reply_line_len: lmtp_message::MAX_REPLY_LINE_LEN,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }

    /// Override the maximum reply-line length (default: 1024 bytes).
    pub fn with_max_reply_line_len(mut self, len: usize) -> Self {
        self.max_reply_line_len = len;
        self
    }

    /// Override the DATA writer's output high-water mark (default: 4096 bytes).
    pub fn with_high_water_mark(mut self, mark: usize) -> Self {
        self.high_water_mark = mark;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_1024_and_4096() {
        let config = ClientConfig::new("<a@b>", "h", Protocol::Lmtp, "127.0.0.1", 24);
        assert_eq!(config.max_reply_line_len, 1024);
        assert_eq!(config.high_water_mark, 4096);
    }

    #[test]
    fn overrides_stick() {
        let config = ClientConfig::new("<a@b>", "h", Protocol::Smtp, "127.0.0.1", 25)
            .with_max_reply_line_len(256)
            .with_high_water_mark(64);
        assert_eq!(config.max_reply_line_len, 256);
        assert_eq!(config.high_water_mark, 64);
    }
}
