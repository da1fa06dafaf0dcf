use lmtp_message::{
    write_data, write_greeting, write_mail_from, write_rcpt_to, LineKind, Protocol, ReplyLine,
    ReplyReader,
};

use crate::{
    body::BodySource,
    recipient::{Callback, Recipient},
    writer::BodyWriter,
};

/// Protocol state, following the LHLO/EHLO → MAIL → RCPT → DATA command sequence of
/// RFC 5321 §3.3 (LMTP substitutes LHLO per RFC 2033 §4). `Done` and `Failed` are the
/// two terminal states; a successful completion is just as terminal as a failure and
/// deserves its own name rather than being inferred from cursor position.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Greet,
    Lhlo,
    MailFrom,
    RcptTo,
    DataCont,
    Data,
    Done,
    Failed,
}

impl State {
    /// Whether RCPT TO commands for already-known recipients have been flushed, i.e.
    /// whether a newly added recipient should be pipelined immediately.
    fn rcpt_phase_begun(self) -> bool {
        matches!(self, State::RcptTo | State::DataCont | State::Data | State::Done)
    }
}

/// A callback that still needs to fire, collected while `Inner` is mutably borrowed and
/// invoked only after that borrow is released. A callback may itself call back into the
/// session (e.g. `add_recipient`); deferring the actual invocation this way means the
/// driver never calls back out while still holding its own reference to mutable state.
pub(crate) struct PendingCallback {
    pub(crate) cb: Callback,
    pub(crate) ok: bool,
    pub(crate) line: String,
}

impl PendingCallback {
    fn fire(mut self) {
        (self.cb)(self.ok, &self.line);
    }
}

/// Fire every collected callback. Split out so call sites read as one line instead of an
/// inline loop at every call site.
pub(crate) fn fire_all(pending: Vec<PendingCallback>) {
    for p in pending {
        p.fire();
    }
}

/// The pure state-machine core: everything except the socket itself. Fed with `feed()`
/// (bytes off the wire) and driven by `pump_body()`/`notify_body_more()`; produces bytes
/// to send in `output` and callbacks to fire in the `Vec<PendingCallback>` every mutating
/// method returns.
pub(crate) struct Inner {
    sender: String,
    my_hostname: String,
    protocol: Protocol,
    state: State,
    recipients: Vec<Recipient>,
    send_idx: usize,
    receive_idx: usize,
    data_idx: usize,
    body: Option<Box<dyn BodySource>>,
    body_writer: BodyWriter,
    global_failure: Option<String>,
    reader: ReplyReader,
    output: Vec<u8>,
    closed: bool,
}

impl Inner {
    pub(crate) fn new(sender: String, my_hostname: String, protocol: Protocol) -> Self {
        Self::with_limits(
            sender,
            my_hostname,
            protocol,
            lmtp_message::MAX_REPLY_LINE_LEN,
            crate::writer::DEFAULT_HIGH_WATER_MARK,
        )
    }

    /// As `new`, but with the two overridable limits a `ClientConfig` may carry: the
    /// reply-line length cap and the DATA high-water mark.
    pub(crate) fn with_limits(
        sender: String,
        my_hostname: String,
        protocol: Protocol,
        max_reply_line_len: usize,
        high_water_mark: usize,
    ) -> Self {
        Inner {
            sender,
            my_hostname,
            protocol,
            state: State::Greet,
            recipients: Vec::new(),
            send_idx: 0,
            receive_idx: 0,
            data_idx: 0,
            body: None,
            body_writer: BodyWriter::with_high_water_mark(high_water_mark),
            global_failure: None,
            reader: ReplyReader::with_max_line_len(max_reply_line_len),
            output: Vec::new(),
            closed: false,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn output_mut(&mut self) -> &mut Vec<u8> {
        &mut self.output
    }

    pub(crate) fn add_recipient(
        &mut self,
        address: String,
        rcpt_cb: Callback,
        data_cb: Callback,
    ) -> Vec<PendingCallback> {
        let mut pending = Vec::new();

        if let Some(line) = self.global_failure.clone() {
            let mut recipient = Recipient::new(address, rcpt_cb, data_cb);
            recipient.failed = true;
            self.recipients.push(recipient);
            // This recipient was never going to be sent, received, or data-acked: bump
            // every cursor past it immediately so send_idx >= receive_idx >= data_idx
            // keeps holding at the new roster length.
            let idx = self.recipients.len() - 1;
            if let Some(cb) = self.recipients[idx].take_rcpt_to() {
                pending.push(PendingCallback { cb, ok: false, line });
            }
            self.send_idx = self.recipients.len();
            self.receive_idx = self.recipients.len();
            self.data_idx = self.recipients.len();
            return pending;
        }

        self.recipients.push(Recipient::new(address, rcpt_cb, data_cb));

        if self.state.rcpt_phase_begun() {
            let idx = self.recipients.len() - 1;
            write_rcpt_to(&mut self.output, &self.recipients[idx].address);
            self.send_idx = self.recipients.len();
        }

        pending
    }

    pub(crate) fn set_body(&mut self, body: Box<dyn BodySource>) -> Vec<PendingCallback> {
        self.body = Some(body);

        if let Some(line) = self.global_failure.clone() {
            return self.drain_unfired_data_callbacks(&line);
        }

        if self.state == State::RcptTo && self.receive_idx == self.recipients.len() {
            self.begin_data();
        }

        Vec::new()
    }

    pub(crate) fn notify_body_more(&mut self) -> Vec<PendingCallback> {
        if self.state == State::Data {
            self.pump_body();
        }
        Vec::new()
    }

    /// Bytes arriving from the transport. Parses as many complete reply lines as are
    /// available and dispatches each; stops (without erroring) on a partial trailing line.
    pub(crate) fn feed(&mut self, data: &[u8]) -> Vec<PendingCallback> {
        if self.state == State::Failed || self.state == State::Done {
            return Vec::new();
        }
        self.reader.feed(data);
        let mut pending = Vec::new();
        loop {
            match self.reader.next_line() {
                Ok(Some(line)) => {
                    if line.kind() == LineKind::Continuation {
                        continue; // RFC 5321 §4.2.1: multiline replies are just more text, not new state.
                    }
                    pending.extend(self.handle_reply(line));
                    if self.state == State::Failed || self.state == State::Done {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let line = String::from_utf8_lossy(e.line()).into_owned();
                    pending.extend(self.fail(line));
                    break;
                }
            }
        }
        pending
    }

    /// An I/O-level error observed by the caller (connect failure, read/write error):
    /// treated as an immediate global failure, using one of the canned lines.
    pub(crate) fn fail_io(&mut self, line: &str) -> Vec<PendingCallback> {
        self.fail(line.to_string())
    }

    fn handle_reply(&mut self, line: ReplyLine) -> Vec<PendingCallback> {
        match self.state {
            State::Greet => {
                if line.code() == 220 {
                    write_greeting(&mut self.output, self.protocol, &self.my_hostname);
                    write_mail_from(&mut self.output, &self.sender);
                    self.state = State::Lhlo;
                    Vec::new()
                } else {
                    self.fail(line.text_lossy().into_owned())
                }
            }
            State::Lhlo => {
                if line.code() == 250 {
                    self.state = State::MailFrom;
                    Vec::new()
                } else {
                    self.fail(line.text_lossy().into_owned())
                }
            }
            State::MailFrom => {
                if line.code() == 250 {
                    self.state = State::RcptTo;
                    for idx in self.send_idx..self.recipients.len() {
                        write_rcpt_to(&mut self.output, &self.recipients[idx].address);
                    }
                    self.send_idx = self.recipients.len();
                    if self.receive_idx == self.recipients.len() && self.body.is_some() {
                        self.begin_data();
                    }
                    Vec::new()
                } else {
                    self.fail(line.text_lossy().into_owned())
                }
            }
            State::RcptTo => {
                let ok = line.is_success();
                let text = line.text_lossy().into_owned();
                let mut pending = Vec::new();
                if self.receive_idx < self.recipients.len() {
                    let idx = self.receive_idx;
                    self.recipients[idx].failed = !ok;
                    if let Some(cb) = self.recipients[idx].take_rcpt_to() {
                        pending.push(PendingCallback {
                            cb,
                            ok,
                            line: text,
                        });
                    }
                    self.receive_idx += 1;
                }
                if self.receive_idx == self.recipients.len() && self.body.is_some() {
                    self.begin_data();
                }
                pending
            }
            State::DataCont => {
                if line.code() == 354 {
                    self.state = State::Data;
                    self.pump_body();
                    Vec::new()
                } else {
                    self.fail(line.text_lossy().into_owned())
                }
            }
            State::Data => self.handle_data_reply(line),
            State::Done | State::Failed => Vec::new(),
        }
    }

    fn begin_data(&mut self) {
        write_data(&mut self.output);
        self.state = State::DataCont;
    }

    fn handle_data_reply(&mut self, line: ReplyLine) -> Vec<PendingCallback> {
        let ok = line.is_success();
        let text = line.text_lossy().into_owned();
        let mut pending = Vec::new();

        match self.protocol {
            Protocol::Lmtp => {
                // Recipients whose RCPT TO already failed never got a DATA reply from the
                // server; skip them before binding this reply.
                while self.data_idx < self.recipients.len() && self.recipients[self.data_idx].failed {
                    self.data_idx += 1;
                }
                if self.data_idx < self.recipients.len() {
                    let idx = self.data_idx;
                    if let Some(cb) = self.recipients[idx].take_data() {
                        pending.push(PendingCallback {
                            cb,
                            ok,
                            line: text,
                        });
                    }
                    self.data_idx += 1;
                }
                while self.data_idx < self.recipients.len() && self.recipients[self.data_idx].failed {
                    self.data_idx += 1;
                }
                if self.data_idx == self.recipients.len() {
                    self.state = State::Done;
                    self.closed = true;
                }
            }
            Protocol::Smtp => {
                for idx in self.data_idx..self.recipients.len() {
                    if !self.recipients[idx].failed {
                        if let Some(cb) = self.recipients[idx].take_data() {
                            pending.push(PendingCallback {
                                cb,
                                ok,
                                line: text.clone(),
                            });
                        }
                    }
                }
                self.data_idx = self.recipients.len();
                self.state = State::Done;
                self.closed = true;
            }
        }

        pending
    }

    fn pump_body(&mut self) {
        if let Some(mut body) = self.body.take() {
            let _ = self.body_writer.pump(body.as_mut(), &mut self.output);
            self.body = Some(body);
        }
    }

    fn drain_unfired_data_callbacks(&mut self, line: &str) -> Vec<PendingCallback> {
        let mut pending = Vec::new();
        while self.data_idx < self.recipients.len() {
            let idx = self.data_idx;
            if !self.recipients[idx].failed {
                if let Some(cb) = self.recipients[idx].take_data() {
                    pending.push(PendingCallback {
                        cb,
                        ok: false,
                        line: line.to_string(),
                    });
                }
            }
            self.data_idx += 1;
        }
        pending
    }

    /// The global failure fan-out. Idempotent: a failure latched once never re-fires.
    fn fail(&mut self, line: String) -> Vec<PendingCallback> {
        if self.global_failure.is_some() {
            return Vec::new();
        }
        self.global_failure = Some(line.clone());
        let mut pending = Vec::new();

        for idx in self.receive_idx..self.recipients.len() {
            self.recipients[idx].failed = true;
            if let Some(cb) = self.recipients[idx].take_rcpt_to() {
                pending.push(PendingCallback {
                    cb,
                    ok: false,
                    line: line.clone(),
                });
            }
        }
        self.receive_idx = self.recipients.len();

        for idx in self.data_idx..self.recipients.len() {
            if self.recipients[idx].failed {
                continue;
            }
            if let Some(cb) = self.recipients[idx].take_data() {
                pending.push(PendingCallback {
                    cb,
                    ok: false,
                    line: line.clone(),
                });
            }
        }
        self.data_idx = self.recipients.len();
        self.send_idx = self.recipients.len();

        self.state = State::Failed;
        self.closed = true;
        self.body = None;

        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::SliceBody;
    use std::{cell::RefCell, rc::Rc};

    fn recorder() -> (Callback, Rc<RefCell<Vec<(bool, String)>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log2 = log.clone();
        let cb: Callback = Box::new(move |ok, line| log2.borrow_mut().push((ok, line.to_string())));
        (cb, log)
    }

    #[test]
    fn lmtp_happy_path_two_recipients() {
        let mut inner = Inner::new("<a@b>".into(), "h".into(), Protocol::Lmtp);
        let (r1_rcpt, r1_rcpt_log) = recorder();
        let (r1_data, r1_data_log) = recorder();
        let (r2_rcpt, r2_rcpt_log) = recorder();
        let (r2_data, r2_data_log) = recorder();
        fire_all(inner.add_recipient("r1".into(), r1_rcpt, r1_data));
        fire_all(inner.add_recipient("r2".into(), r2_rcpt, r2_data));
        fire_all(inner.set_body(Box::new(SliceBody::new(&b"hi\r\n"[..]))));

        fire_all(inner.feed(b"220 ok\r\n"));
        assert_eq!(inner.output, b"LHLO h\r\nMAIL FROM:<a@b>\r\n");
        inner.output.clear();

        fire_all(inner.feed(b"250 hi\r\n"));
        assert!(inner.output.is_empty());

        fire_all(inner.feed(b"250 sender ok\r\n"));
        assert_eq!(inner.output, b"RCPT TO:<r1>\r\nRCPT TO:<r2>\r\n");
        inner.output.clear();

        fire_all(inner.feed(b"250 r1 ok\r\n"));
        assert_eq!(r1_rcpt_log.borrow().as_slice(), &[(true, "250 r1 ok".to_string())]);
        fire_all(inner.feed(b"250 r2 ok\r\n"));
        assert_eq!(r2_rcpt_log.borrow().as_slice(), &[(true, "250 r2 ok".to_string())]);
        assert_eq!(inner.output, b"DATA\r\n");
        inner.output.clear();

        fire_all(inner.feed(b"354 go\r\n"));
        assert_eq!(inner.output, b"hi\r\n.\r\n");
        inner.output.clear();

        fire_all(inner.feed(b"250 r1 saved\r\n"));
        fire_all(inner.feed(b"250 r2 saved\r\n"));
        assert_eq!(r1_data_log.borrow().as_slice(), &[(true, "250 r1 saved".to_string())]);
        assert_eq!(r2_data_log.borrow().as_slice(), &[(true, "250 r2 saved".to_string())]);
        assert_eq!(inner.state, State::Done);
    }

    #[test]
    fn lmtp_recipient_rejected_at_rcpt_skips_data_reply() {
        let mut inner = Inner::new("<a@b>".into(), "h".into(), Protocol::Lmtp);
        let (r1_rcpt, r1_rcpt_log) = recorder();
        let (r1_data, r1_data_log) = recorder();
        let (r2_rcpt, r2_rcpt_log) = recorder();
        let (r2_data, r2_data_log) = recorder();
        fire_all(inner.add_recipient("r1".into(), r1_rcpt, r1_data));
        fire_all(inner.add_recipient("r2".into(), r2_rcpt, r2_data));
        fire_all(inner.set_body(Box::new(SliceBody::new(&b"hi\r\n"[..]))));

        fire_all(inner.feed(b"220 ok\r\n250 hi\r\n250 sender ok\r\n"));
        inner.output.clear();
        fire_all(inner.feed(b"250 r1 ok\r\n550 r2 bad\r\n"));
        assert_eq!(r1_rcpt_log.borrow().as_slice(), &[(true, "250 r1 ok".to_string())]);
        assert_eq!(r2_rcpt_log.borrow().as_slice(), &[(false, "550 r2 bad".to_string())]);
        assert_eq!(inner.output, b"DATA\r\n");
        inner.output.clear();

        fire_all(inner.feed(b"354 go\r\n"));
        inner.output.clear();
        fire_all(inner.feed(b"250 r1 saved\r\n"));
        assert_eq!(r1_data_log.borrow().as_slice(), &[(true, "250 r1 saved".to_string())]);
        assert!(r2_data_log.borrow().is_empty());
        assert_eq!(inner.state, State::Done);
    }

    #[test]
    fn smtp_single_aggregate_reply_broadcasts_to_all() {
        let mut inner = Inner::new("<a@b>".into(), "h".into(), Protocol::Smtp);
        let (r1_rcpt, _) = recorder();
        let (r1_data, r1_data_log) = recorder();
        let (r2_rcpt, _) = recorder();
        let (r2_data, r2_data_log) = recorder();
        fire_all(inner.add_recipient("r1".into(), r1_rcpt, r1_data));
        fire_all(inner.add_recipient("r2".into(), r2_rcpt, r2_data));
        fire_all(inner.set_body(Box::new(SliceBody::new(&b"hi\r\n"[..]))));

        fire_all(inner.feed(b"220 ok\r\n250 hi\r\n250 sender ok\r\n250 r1 ok\r\n250 r2 ok\r\n"));
        inner.output.clear();
        fire_all(inner.feed(b"354 go\r\n"));
        inner.output.clear();
        fire_all(inner.feed(b"250 accepted\r\n"));

        assert_eq!(r1_data_log.borrow().as_slice(), &[(true, "250 accepted".to_string())]);
        assert_eq!(r2_data_log.borrow().as_slice(), &[(true, "250 accepted".to_string())]);
        assert_eq!(inner.state, State::Done);
    }

    #[test]
    fn global_failure_at_mail_from_resolves_both_recipients_without_data_phase() {
        let mut inner = Inner::new("<a@b>".into(), "h".into(), Protocol::Lmtp);
        let (r1_rcpt, r1_rcpt_log) = recorder();
        let (r1_data, r1_data_log) = recorder();
        let (r2_rcpt, r2_rcpt_log) = recorder();
        let (r2_data, r2_data_log) = recorder();
        fire_all(inner.add_recipient("r1".into(), r1_rcpt, r1_data));
        fire_all(inner.add_recipient("r2".into(), r2_rcpt, r2_data));

        fire_all(inner.feed(b"220 ok\r\n250 hi\r\n421 busy\r\n"));

        assert_eq!(r1_rcpt_log.borrow().as_slice(), &[(false, "421 busy".to_string())]);
        assert_eq!(r2_rcpt_log.borrow().as_slice(), &[(false, "421 busy".to_string())]);
        assert!(r1_data_log.borrow().is_empty());
        assert!(r2_data_log.borrow().is_empty());
        assert_eq!(inner.state, State::Failed);
        assert!(inner.is_closed());
    }

    #[test]
    fn late_added_recipient_after_rcpt_phase_begun_is_pipelined_immediately() {
        let mut inner = Inner::new("<a@b>".into(), "h".into(), Protocol::Lmtp);
        let (r1_rcpt, _) = recorder();
        let (r1_data, _) = recorder();
        fire_all(inner.add_recipient("r1".into(), r1_rcpt, r1_data));
        fire_all(inner.feed(b"220 ok\r\n250 hi\r\n250 sender ok\r\n"));
        assert_eq!(inner.output, b"RCPT TO:<r1>\r\n");
        inner.output.clear();

        let (r2_rcpt, _) = recorder();
        let (r2_data, _) = recorder();
        fire_all(inner.add_recipient("r2".into(), r2_rcpt, r2_data));
        assert_eq!(inner.output, b"RCPT TO:<r2>\r\n");
    }

    #[test]
    fn add_recipient_after_global_failure_fires_immediately() {
        let mut inner = Inner::new("<a@b>".into(), "h".into(), Protocol::Lmtp);
        fire_all(inner.feed(b"421 not ready\r\n"));
        assert_eq!(inner.state, State::Failed);

        let (rcpt, rcpt_log) = recorder();
        let (data, _) = recorder();
        fire_all(inner.add_recipient("late".into(), rcpt, data));
        assert_eq!(
            rcpt_log.borrow().as_slice(),
            &[(false, "421 not ready".to_string())]
        );
    }
}
