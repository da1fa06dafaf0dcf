use std::{collections::VecDeque, io};

use bytes::Bytes;

/// One poll of a `BodySource`: either a chunk of bytes, a hint that none are available
/// right now but more may come (non-fatal; the writer just yields), or end of stream.
pub enum BodyPoll {
    Ready(Bytes),
    Pending,
    Eof,
}

/// The message content supplied to `Session::set_body`.
///
/// The Rust-side equivalent of `lmtp-client.c`'s `struct istream *data_input`: the
/// session pulls from it strictly in order and never rewinds. `notify_body_more` is the
/// hint that a `Pending` source may now have bytes.
pub trait BodySource {
    fn poll_chunk(&mut self) -> io::Result<BodyPoll>;
}

/// A body that is handed over already fully in memory. Useful for tests and for callers
/// who already have the whole message buffered.
pub struct SliceBody(Option<Bytes>);

impl SliceBody {
    pub fn new(data: impl Into<Bytes>) -> Self {
        SliceBody(Some(data.into()))
    }
}

impl BodySource for SliceBody {
    fn poll_chunk(&mut self) -> io::Result<BodyPoll> {
        match self.0.take() {
            Some(b) if !b.is_empty() => Ok(BodyPoll::Ready(b)),
            _ => Ok(BodyPoll::Eof),
        }
    }
}

/// A body fed incrementally by whatever owns the real I/O (e.g. `Dialer`, or a caller
/// reading from a pipe on its own schedule). `push` queues a chunk; `finish` marks end of
/// stream. Call `Session::notify_body_more` after a `push` that happened while the
/// session was waiting on `Pending`.
#[derive(Default)]
pub struct PushBody {
    queue: VecDeque<Bytes>,
    eof: bool,
}

impl PushBody {
    pub fn new() -> Self {
        PushBody::default()
    }

    pub fn push(&mut self, chunk: impl Into<Bytes>) {
        let chunk = chunk.into();
        if !chunk.is_empty() {
            self.queue.push_back(chunk);
        }
    }

    pub fn finish(&mut self) {
        self.eof = true;
    }
}

impl BodySource for PushBody {
    fn poll_chunk(&mut self) -> io::Result<BodyPoll> {
        if let Some(chunk) = self.queue.pop_front() {
            Ok(BodyPoll::Ready(chunk))
        } else if self.eof {
            Ok(BodyPoll::Eof)
        } else {
            Ok(BodyPoll::Pending)
        }
    }
}
