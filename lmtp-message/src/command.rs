/// Which greeting verb and DATA-reply demultiplexing rule applies to this connection.
///
/// Spec.md DESIGN NOTES: "the LMTP/SMTP distinction is a small enum carried in the
/// session; only the data-reply demux differs."
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Protocol {
    Lmtp,
    Smtp,
}

impl Protocol {
    fn greeting_verb(self) -> &'static str {
        match self {
            Protocol::Lmtp => "LHLO",
            Protocol::Smtp => "EHLO",
        }
    }
}

/// `LHLO <hostname>\r\n` or `EHLO <hostname>\r\n`.
pub fn write_greeting(out: &mut Vec<u8>, protocol: Protocol, my_hostname: &str) {
    out.extend_from_slice(protocol.greeting_verb().as_bytes());
    out.push(b' ');
    out.extend_from_slice(my_hostname.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// `MAIL FROM:<sender-literal>\r\n` per RFC 5321 §4.1.1.2. `sender` is passed through
/// verbatim, already including its own angle brackets.
pub fn write_mail_from(out: &mut Vec<u8>, sender: &str) {
    out.extend_from_slice(b"MAIL FROM:");
    out.extend_from_slice(sender.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// `RCPT TO:<address>\r\n` per RFC 5321 §4.1.1.3. `address` does *not* include angle
/// brackets; this function adds them.
pub fn write_rcpt_to(out: &mut Vec<u8>, address: &str) {
    out.extend_from_slice(b"RCPT TO:<");
    out.extend_from_slice(address.as_bytes());
    out.extend_from_slice(b">\r\n");
}

/// `DATA\r\n`.
pub fn write_data(out: &mut Vec<u8>) {
    out.extend_from_slice(b"DATA\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_picks_verb_by_protocol() {
        let mut out = Vec::new();
        write_greeting(&mut out, Protocol::Lmtp, "mx.example.com");
        assert_eq!(out, b"LHLO mx.example.com\r\n");

        out.clear();
        write_greeting(&mut out, Protocol::Smtp, "mx.example.com");
        assert_eq!(out, b"EHLO mx.example.com\r\n");
    }

    #[test]
    fn mail_from_passes_sender_through_verbatim() {
        let mut out = Vec::new();
        write_mail_from(&mut out, "<a@b.example>");
        assert_eq!(out, b"MAIL FROM:<a@b.example>\r\n");
    }

    #[test]
    fn rcpt_to_adds_brackets() {
        let mut out = Vec::new();
        write_rcpt_to(&mut out, "user@example.com");
        assert_eq!(out, b"RCPT TO:<user@example.com>\r\n");
    }

    #[test]
    fn data_is_bare() {
        let mut out = Vec::new();
        write_data(&mut out);
        assert_eq!(out, b"DATA\r\n");
    }
}
