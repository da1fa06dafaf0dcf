use std::io;

use bytes::Bytes;

use crate::body::{BodyPoll, BodySource};

/// Output-buffer high-water mark: a ~4KB backlog is the signal to yield and await
/// write-readiness rather than keep buffering unboundedly.
pub(crate) const DEFAULT_HIGH_WATER_MARK: usize = 4096;

/// Streams the message body out with CR insertion and leading-dot escaping per RFC 5321
/// §4.5.2's transparency rule, writing into the session's output buffer rather than a
/// socket directly. The socket write happens when that buffer is flushed.
///
/// `output_last` is carried across pump cycles and across chunk boundaries so the
/// transformation is exact even when a trigger byte falls right at the edge of what a
/// `BodySource` handed back.
pub(crate) struct BodyWriter {
    output_last: u8,
    finished: bool,
    /// Bytes already pulled from the body source but not yet fully consumed, because a
    /// previous pump cycle stopped at a high-water mark or right after inserting a byte.
    pending: Option<Bytes>,
    high_water_mark: usize,
}

impl BodyWriter {
    pub(crate) fn new() -> Self {
        Self::with_high_water_mark(DEFAULT_HIGH_WATER_MARK)
    }

    pub(crate) fn with_high_water_mark(high_water_mark: usize) -> Self {
        BodyWriter {
    // The last byte actually written to the wire before DATA started streaming
            // was the trailing '\n' of "DATA\r\n", so a leading dot on the very first
            // body byte is still inside a logical "start of line" and must be escaped.
            output_last: b'\n',
            finished: false,
            pending: None,
            high_water_mark,
        }
    }

    pub(crate) fn finished(&self) -> bool {
        self.finished
    }

    /// Pull bytes out of `body` and append the dot-stuffed, CR-repaired form to `out`
    /// until either the source yields no more right now, the high-water mark is hit, or
    /// end of stream is reached (in which case the CRLF.CRLF terminator is appended and
    /// the writer latches `finished`).
    pub(crate) fn pump(&mut self, body: &mut dyn BodySource, out: &mut Vec<u8>) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        loop {
            if out.len() >= self.high_water_mark {
                return Ok(());
            }

            let chunk = match self.pending.take() {
                Some(c) => c,
                None => match body.poll_chunk()? {
                    BodyPoll::Ready(c) => c,
                    BodyPoll::Pending => return Ok(()),
                    BodyPoll::Eof => {
                        self.emit_terminator(out);
                        return Ok(());
                    }
                },
            };
            if chunk.is_empty() {
                continue;
            }

            // Scan for the first byte that needs an insertion ahead of it.
            let mut i = 0;
            let mut insert = None;
            while i < chunk.len() {
                let b = chunk[i];
                let prev = if i == 0 { self.output_last } else { chunk[i - 1] };
                if b == b'\n' && prev != b'\r' {
                    insert = Some(b'\r');
                    break;
                }
                if b == b'.' && prev == b'\n' {
                    insert = Some(b'.');
                    break;
                }
                i += 1;
            }

            if i > 0 {
                out.extend_from_slice(&chunk[..i]);
                self.output_last = chunk[i - 1];
            }

            if out.len() >= self.high_water_mark {
                // Yield with the trigger byte (if any) still unconsumed, to be
                // reprocessed next cycle against the now-updated `output_last`.
                self.pending = Some(chunk.slice(i..));
                return Ok(());
            }

            match insert {
                Some(add) => {
                    out.push(add);
                    self.output_last = add;
                    // Note: `chunk[i]` itself (the '\n' or '.') is *not* skipped here;
                    // it is re-examined on the next cycle, by which point
                    // `output_last` no longer matches the trigger condition.
                    self.pending = Some(chunk.slice(i..));
                }
                None => {
                    // Whole chunk consumed with no trigger found; loop around for more.
                }
            }
        }
    }

    fn emit_terminator(&mut self, out: &mut Vec<u8>) {
        if self.output_last != b'\n' {
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b".\r\n");
        self.finished = true;
    }
}
