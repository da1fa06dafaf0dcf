use std::{
    future::Future,
    io::{self, Read, Write},
    pin::Pin,
};

/// The transport seam the session core drives. `Session` never touches a socket
/// directly; it calls through this trait, which lets the state machine be exercised
/// against an in-memory mock instead of a real `TcpStream` in tests.
///
/// A `WouldBlock` `io::Error` from either method means "no progress possible right now,
/// wait for readiness"; callers map that to "stop pumping, return to the event loop"
/// rather than treating it as a failure.
pub trait NonBlockingIo {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Resolves once the transport is readable. The default resolves immediately, which
    /// is correct for transports that are driven manually (the mock, in tests) rather
    /// than through a reactor; `Dialer` only ever awaits this on a real socket, where it
    /// is overridden to actually wait.
    fn readable(&self) -> Pin<Box<dyn Future<Output = io::Result<()>> + '_>> {
        Box::pin(std::future::ready(Ok(())))
    }

    /// Resolves once the transport is writable. See `readable`.
    fn writable(&self) -> Pin<Box<dyn Future<Output = io::Result<()>> + '_>> {
        Box::pin(std::future::ready(Ok(())))
    }
}

impl NonBlockingIo for smol::Async<std::net::TcpStream> {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.get_mut().read(buf)
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.get_mut().write(buf)
    }

    fn readable(&self) -> Pin<Box<dyn Future<Output = io::Result<()>> + '_>> {
        Box::pin(smol::Async::readable(self))
    }

    fn writable(&self) -> Pin<Box<dyn Future<Output = io::Result<()>> + '_>> {
        Box::pin(smol::Async::writable(self))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::{cell::RefCell, collections::VecDeque, rc::Rc};

    /// A scripted transport for exercising the session core without a real socket.
    /// `inbound` is fed to `try_read` a chunk at a time; everything written via
    /// `try_write` accumulates in `written`. Used to replay scripted protocol traces.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        inbound: VecDeque<u8>,
        pub(crate) written: Vec<u8>,
        pub(crate) write_blocked: bool,
        pub(crate) read_blocked: bool,
        pub(crate) write_error: bool,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Queue bytes as if the peer had sent them; a later `try_read` will return them.
        pub(crate) fn feed(&mut self, bytes: &[u8]) {
            self.inbound.extend(bytes);
        }

        pub(crate) fn take_written(&mut self) -> Vec<u8> {
            std::mem::take(&mut self.written)
        }
    }

    impl NonBlockingIo for MockTransport {
        fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.read_blocked || self.inbound.is_empty() {
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }
            let mut n = 0;
            while n < buf.len() {
                match self.inbound.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }

        fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.write_error {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            if self.write_blocked {
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    /// Lets a test keep its own handle to the mock (to `feed`/`take_written`) while a
    /// second clone is handed to `Session::attach_transport` as the type-erased
    /// transport.
    impl NonBlockingIo for Rc<RefCell<MockTransport>> {
        fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.borrow_mut().try_read(buf)
        }

        fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.borrow_mut().try_write(buf)
        }
    }
}
