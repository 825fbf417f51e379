use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::time::Duration;

use anyhow::Context;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::info;

use crate::config::Config;
use crate::http::connection::{Connection, Handler};

const LISTEN_BACKLOG: i32 = 5;
/// Pause after an accept error that is not tied to a single client, such as
/// running out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts and serves one connection at a time.
pub struct Server<H> {
    listener: TcpListener,
    local_addr: SocketAddr,
    nonblocking: bool,
    handler: H,
}

impl<H: Handler> Server<H> {
    /// Binds `addr` with `SO_REUSEADDR` and starts listening.
    pub fn bind(addr: &str, handler: H) -> anyhow::Result<Self> {
        let addr = addr
            .to_socket_addrs()
            .with_context(|| format!("invalid listen address {addr}"))?
            .next()
            .with_context(|| format!("listen address {addr} resolved to nothing"))?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .context("failed to create listening socket")?;
        socket
            .set_reuse_address(true)
            .context("failed to set SO_REUSEADDR")?;
        socket
            .bind(&addr.into())
            .with_context(|| format!("failed to bind {addr}"))?;
        socket
            .listen(LISTEN_BACKLOG)
            .with_context(|| format!("failed to listen on {addr}"))?;

        let listener: TcpListener = socket.into();
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            nonblocking: false,
            handler,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Accepts at most one client and serves it to completion.
    ///
    /// With `blocking` false the call returns `Ok(false)` straight away when
    /// no client is waiting, so callers can poll from their own loop.
    /// Returns `Ok(true)` once a client has been served. A failed accept also
    /// returns `Ok(false)`, after a short pause when the failure is likely to
    /// repeat.
    pub fn process(&mut self, blocking: bool) -> anyhow::Result<bool> {
        if self.nonblocking == blocking {
            self.listener.set_nonblocking(!blocking)?;
            self.nonblocking = !blocking;
        }

        let (stream, peer) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(e) => {
                let backoff = accept_backoff(e.kind());
                tracing::warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "accept failed");
                std::thread::sleep(backoff);
                return Ok(false);
            }
        };

        // accepted sockets inherit O_NONBLOCK on some platforms
        stream.set_nonblocking(false)?;
        tracing::debug!(%peer, "accepted connection");

        let mut conn = Connection::new(stream);
        if let Err(e) = conn.run(&mut self.handler) {
            tracing::error!("Connection error from {}: {}", peer, e);
        }

        Ok(true)
    }

    /// Serves clients forever in blocking mode.
    pub fn run(&mut self) -> anyhow::Result<()> {
        loop {
            self.process(true)?;
        }
    }
}

/// Binds the configured address and serves until an unrecoverable error.
pub fn run<H: Handler>(cfg: &Config, handler: H) -> anyhow::Result<()> {
    let mut server = Server::bind(&cfg.listen_addr, handler)?;
    info!("Listening on {}", server.local_addr());

    if cfg.blocking {
        return server.run();
    }

    let idle = Duration::from_millis(cfg.poll_interval_ms);
    loop {
        if !server.process(false)? {
            std::thread::sleep(idle);
        }
    }
}

/// How long to wait before accepting again after `kind`.
///
/// Errors caused by one peer going away are retried at once; anything else
/// waits [`ACCEPT_BACKOFF`].
fn accept_backoff(kind: io::ErrorKind) -> Duration {
    match kind {
        io::ErrorKind::Interrupted
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset => Duration::ZERO,
        _ => ACCEPT_BACKOFF,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_errors_retry_immediately() {
        assert_eq!(accept_backoff(io::ErrorKind::Interrupted), Duration::ZERO);
        assert_eq!(accept_backoff(io::ErrorKind::ConnectionAborted), Duration::ZERO);
        assert_eq!(accept_backoff(io::ErrorKind::ConnectionReset), Duration::ZERO);
    }

    #[test]
    fn persistent_errors_back_off() {
        assert_eq!(accept_backoff(io::ErrorKind::OutOfMemory), ACCEPT_BACKOFF);
        assert_eq!(accept_backoff(io::ErrorKind::Other), ACCEPT_BACKOFF);
        assert!(ACCEPT_BACKOFF > Duration::ZERO);
    }
}
