/// A callback invoked with `(success, reply_line)`.
///
/// `lmtp-client.c` threads an opaque `void *context` pointer through to the callback;
/// Rust closures capture their own environment instead, so there is no separate context
/// parameter here. Whatever a caller would have stuffed into `context` belongs in the
/// closure's capture list.
pub type Callback = Box<dyn FnMut(bool, &str)>;

/// One recipient of the message, with its two callbacks and the bookkeeping needed to
/// track them.
///
/// Each callback is stored as `Option` so it can be taken out and invoked exactly once
/// without ever holding it across a live mutable borrow of the session; see
/// `crate::session` for why that matters.
pub(crate) struct Recipient {
    pub(crate) address: String,
    pub(crate) rcpt_to_callback: Option<Callback>,
    pub(crate) data_callback: Option<Callback>,
    pub(crate) failed: bool,
}

impl Recipient {
    pub(crate) fn new(address: String, rcpt_to_callback: Callback, data_callback: Callback) -> Self {
        Recipient {
            address,
            rcpt_to_callback: Some(rcpt_to_callback),
            data_callback: Some(data_callback),
            failed: false,
        }
    }

    /// Take the rcpt-to callback, if it hasn't fired yet.
    pub(crate) fn take_rcpt_to(&mut self) -> Option<Callback> {
        self.rcpt_to_callback.take()
    }

    /// Take the data callback, if it hasn't fired yet.
    pub(crate) fn take_data(&mut self) -> Option<Callback> {
        self.data_callback.take()
    }
}
