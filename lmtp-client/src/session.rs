use std::{cell::RefCell, io, rc::Rc};

use lmtp_message::Protocol;
use tracing::{trace, warn};

use crate::{
    body::BodySource,
    config::ClientConfig,
    error::canned,
    io::NonBlockingIo,
    recipient::Callback,
    state::{fire_all, Inner},
};

/// The public handle. Cheaply cloneable and reference-counted so that a callback which
/// drops the caller's last clone does not pull the session out from under the dispatch
/// loop still iterating over freshly-arrived reply lines.
#[derive(Clone)]
pub struct Session {
    inner: Rc<RefCell<Inner>>,
    transport: Rc<RefCell<Option<Box<dyn NonBlockingIo>>>>,
}

impl Session {
    /// `sender` must already include its own angle brackets; `my_hostname` must be
    /// nonempty. Returns an empty session, not yet connected.
    pub fn create(sender: impl Into<String>, my_hostname: impl Into<String>, protocol: Protocol) -> Self {
        let sender = sender.into();
        let my_hostname = my_hostname.into();
        debug_assert!(sender.starts_with('<'), "sender must include angle brackets");
        debug_assert!(!my_hostname.is_empty(), "my_hostname must be nonempty");
        Session {
            inner: Rc::new(RefCell::new(Inner::new(sender, my_hostname, protocol))),
            transport: Rc::new(RefCell::new(None)),
        }
    }

    /// As `create`, but taking a `ClientConfig` so its overridable reply-line-length and
    /// DATA high-water-mark limits reach the session instead of the built-in defaults.
    /// `config.host`/`config.port` are not used here; they are
    /// `Dialer::connect_with_config`'s job.
    pub fn create_with_config(config: &ClientConfig) -> Self {
        debug_assert!(config.sender.starts_with('<'), "sender must include angle brackets");
        debug_assert!(!config.my_hostname.is_empty(), "my_hostname must be nonempty");
        Session {
            inner: Rc::new(RefCell::new(Inner::with_limits(
                config.sender.clone(),
                config.my_hostname.clone(),
                config.protocol,
                config.max_reply_line_len,
                config.high_water_mark,
            ))),
            transport: Rc::new(RefCell::new(None)),
        }
    }

    /// Hands the session a transport that is already connected and nonblocking. Real
    /// callers reach this through `Dialer::connect`; tests construct it directly with a
    /// mock transport.
    pub(crate) fn attach_transport(&self, transport: Box<dyn NonBlockingIo>) {
        *self.transport.borrow_mut() = Some(transport);
        self.flush_output();
    }

    /// A clone of the transport cell, for `Dialer` to await readiness on without routing
    /// every poll through `Session` itself.
    pub(crate) fn transport_cell(&self) -> Rc<RefCell<Option<Box<dyn NonBlockingIo>>>> {
        self.transport.clone()
    }

    /// Whether the session has reached a terminal state (delivered or failed); no
    /// further I/O will occur past this point.
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().is_closed()
    }

    pub fn add_recipient(&self, address: impl Into<String>, rcpt_cb: Callback, data_cb: Callback) {
        let pending = self.inner.borrow_mut().add_recipient(address.into(), rcpt_cb, data_cb);
        fire_all(pending);
        self.flush_output();
    }

    /// Supplies the message content. May transition straight to the DATA phase if every
    /// RCPT reply has already arrived.
    pub fn set_body(&self, body: Box<dyn BodySource>) {
        let pending = self.inner.borrow_mut().set_body(body);
        fire_all(pending);
        self.flush_output();
    }

    /// Hint that a `Pending`-returning `BodySource` may have bytes now.
    pub fn notify_body_more(&self) {
        let pending = self.inner.borrow_mut().notify_body_more();
        fire_all(pending);
        self.flush_output();
    }

    /// Call when the transport reports read-readiness. Reads what is available, feeds it
    /// to the state machine, and flushes whatever that produced.
    pub fn readable(&self) {
        let mut buf = [0u8; 4096];
        loop {
            let read = {
                let mut transport = self.transport.borrow_mut();
                match transport.as_mut() {
                    Some(t) => t.try_read(&mut buf),
                    None => return,
                }
            };
            match read {
                Ok(0) => {
                    self.fail_io(canned::DISCONNECTED);
                    return;
                }
                Ok(n) => {
                    trace!(bytes = n, "read from transport");
                    let pending = self.inner.borrow_mut().feed(&buf[..n]);
                    fire_all(pending);
                    self.flush_output();
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    warn!(error = %e, "read error");
                    self.fail_io(canned::DISCONNECTED);
                    return;
                }
            }
        }
    }

    /// Call when the transport reports write-readiness. Drains the queued output and, if
    /// the DATA writer previously yielded on backpressure, resumes pumping the body now
    /// that room has opened up.
    pub fn writable(&self) {
        self.flush_output();
        let pending = self.inner.borrow_mut().notify_body_more();
        fire_all(pending);
        self.flush_output();
    }

    /// Tears down handles. Outstanding callbacks are not synthesized here; the caller is
    /// expected to have driven the session to completion, or to accept silent loss only
    /// on an explicit, deliberate destroy.
    pub fn destroy(self) {
        *self.transport.borrow_mut() = None;
    }

    /// An I/O-level failure observed outside of `readable`/`writable` (e.g. a failed
    /// connect attempt in `Dialer`), routed through the same global-failure path as any
    /// other connection error.
    pub(crate) fn fail_io(&self, line: &str) {
        let pending = self.inner.borrow_mut().fail_io(line);
        fire_all(pending);
        *self.transport.borrow_mut() = None;
    }

    /// Writes as much of the queued output as the transport will currently accept,
    /// leaving the rest queued for the next `writable()`. A write error is an immediate
    /// global failure rather than waiting for a subsequent read to surface the
    /// disconnect.
    fn flush_output(&self) {
        loop {
            let to_write = {
                let mut inner = self.inner.borrow_mut();
                if inner.output_mut().is_empty() {
                    return;
                }
                inner.output_mut().clone()
            };

            let written = {
                let mut transport = self.transport.borrow_mut();
                match transport.as_mut() {
                    Some(t) => t.try_write(&to_write),
                    None => return,
                }
            };

            match written {
                Ok(0) => return,
                Ok(n) => {
                    self.inner.borrow_mut().output_mut().drain(..n);
                    if n < to_write.len() {
                        return; // transport took a partial write; wait for writable() again.
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    warn!(error = %e, "write error");
                    self.fail_io(canned::DISCONNECTED_IN_OUTPUT);
                    return;
                }
            }
        }
    }
}
