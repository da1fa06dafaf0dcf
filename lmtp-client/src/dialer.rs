use std::{cell::RefCell, net::IpAddr, net::SocketAddr, net::TcpStream};

use futures::future::{self, Either};
use smol::Async;
use tracing::{debug, warn};

use crate::{
    config::ClientConfig, error::canned, error::ConnectError, io::NonBlockingIo, session::Session,
};

/// Opens the nonblocking TCP connection and drives the session's readiness loop.
///
/// Name resolution is out of scope; `host` must already be a dotted/colonned IP literal.
/// This only opens the socket and wires it up to `async-io`'s readiness primitives, the
/// `smol` stack's idiomatic replacement for hand-rolled epoll callbacks. `Session` owns
/// the transport once attached; `Dialer` only awaits OS-level readiness and then calls
/// back into the synchronous `Session::readable`/`writable` entry points.
pub struct Dialer;

impl Dialer {
    /// Validates `host` as an IP literal (name resolution is the caller's job) and
    /// returns a future that connects and drives `session` to completion.
    ///
    /// This is the crate's one synchronous error path: a malformed literal is rejected
    /// here, before any socket exists, with no callbacks fired. `ConnectError::SocketCreation`
    /// is kept for callers distinguishing the two failure kinds but is not raised by this
    /// path; `smol`'s connect folds socket creation and the connect attempt into one
    /// asynchronous operation, so a failure there surfaces through the normal async
    /// failure path below instead.
    pub fn connect(
        session: Session,
        host: &str,
        port: u16,
    ) -> Result<impl std::future::Future<Output = ()>, ConnectError> {
        let ip: IpAddr = host.parse().map_err(|source| ConnectError::InvalidAddress {
            host: host.to_string(),
            source,
        })?;
        let addr = SocketAddr::new(ip, port);
        Ok(async move { Dialer::connect_addr(session, addr).await })
    }

    /// As `connect`, but taking a `Session` built from a `ClientConfig` and reading the
    /// host/port to dial from that same config, so a caller need not repeat them.
    pub fn connect_with_config(
        session: Session,
        config: &ClientConfig,
    ) -> Result<impl std::future::Future<Output = ()>, ConnectError> {
        Dialer::connect(session, &config.host, config.port)
    }

    async fn connect_addr(session: Session, addr: SocketAddr) {
        let stream = match Async::<TcpStream>::connect(addr).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, %addr, "connect failed");
                session.fail_io(canned::CONNECT_FAILED);
                return;
            }
        };
        debug!(%addr, "connected");
        session.attach_transport(Box::new(stream));
        Dialer::drive(session).await;
    }

    async fn drive(session: Session) {
        let transport = session.transport_cell();
        while !session.is_closed() {
            let read_ready = wait_ready(&transport, Direction::Read);
            let write_ready = wait_ready(&transport, Direction::Write);
            match future::select(Box::pin(read_ready), Box::pin(write_ready)).await {
                Either::Left(_) => session.readable(),
                Either::Right(_) => session.writable(),
            }
        }
    }
}

enum Direction {
    Read,
    Write,
}

/// Waits for one readiness direction on whatever transport is currently attached.
/// Resolves immediately if nothing is attached (the caller's next loop check on
/// `is_closed` will then spin, which only happens in the brief window before
/// `attach_transport` runs).
async fn wait_ready(transport: &RefCell<Option<Box<dyn NonBlockingIo>>>, dir: Direction) {
    let guard = transport.borrow();
    let io = match guard.as_ref() {
        Some(io) => io,
        None => return,
    };
    let _ = match dir {
        Direction::Read => io.readable().await,
        Direction::Write => io.writable().await,
    };
}
