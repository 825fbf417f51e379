//! Outbound HTTP requests over one fixed-size buffer.
//!
//! The buffer first holds the host name and the request text. Once the
//! request has been sent the same storage receives the response, so a
//! request can be issued without any allocation beyond the initial one.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use memchr::memmem;
use socket2::{Domain, Protocol, Socket, Type};

/// Width of the `Content-Length` field that is patched before sending.
pub const CONTENT_LENGTH_WIDTH: usize = 8;

const CONTENT_LENGTH_PREFIX: &[u8] = b"Content-Length: ";
const CONTENT_LENGTH_PLACEHOLDER: &[u8] = b"Content-Length: 00000000\r\n";
const MAX_BODY_LENGTH: usize = 99_999_999;
const HEADERS_END: &[u8] = b"\r\n\r\n";
const STATUS_PREFIX_LEN: usize = "HTTP/1.1".len();

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("request does not fit in {capacity} bytes")]
    BufferExceeded { capacity: usize },
    #[error("request header block is not terminated")]
    UnterminatedHeaders,
    #[error("request was already executed")]
    AlreadyExecuted,
    #[error("failed to resolve {host}")]
    ResolutionFailed {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to create socket")]
    SocketCreateFailed(#[source] io::Error),
    #[error("failed to connect to {addr}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("sent {sent} of {expected} request bytes")]
    SendIncomplete { sent: usize, expected: usize },
    #[error("failed to receive response")]
    ReceiveFailed(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Building,
    Received,
}

/// `fmt::Write` adapter that refuses to grow a buffer past `limit`.
struct Bounded<'a> {
    buf: &'a mut Vec<u8>,
    limit: usize,
}

impl fmt::Write for Bounded<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.buf.len() + s.len() > self.limit {
            return Err(fmt::Error);
        }
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

/// A single outbound request and, after [`execute`](Self::execute), its
/// response.
///
/// ```no_run
/// # use picohttpd::client::OutboundRequest;
/// let mut req = OutboundRequest::build("localhost", 80, "/foo/bar/filename.zip", "GET", 256 * 1024)?;
/// req.execute()?;
/// if let (Some(content), Some(len)) = (req.content(), req.content_length()) {
///     println!("got {} of {} bytes", content.len(), len);
/// }
/// # Ok::<(), picohttpd::client::TransportError>(())
/// ```
#[derive(Debug)]
pub struct OutboundRequest {
    buf: Vec<u8>,
    capacity: usize,
    host_len: usize,
    port: u16,
    /// Offset of the `Content-Length` header line.
    placeholder: usize,
    phase: Phase,
}

impl OutboundRequest {
    /// Writes the request line and the fixed headers into a new buffer of
    /// `capacity` bytes.
    pub fn build(
        host: &str,
        port: u16,
        location: &str,
        method: &str,
        capacity: usize,
    ) -> Result<Self, TransportError> {
        let mut req = Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            host_len: host.len(),
            port,
            placeholder: 0,
            phase: Phase::Building,
        };

        req.push(host.as_bytes())?;
        req.push_fmt(format_args!("{method} {location} HTTP/1.1\r\n"))?;
        if port == 80 {
            req.push_fmt(format_args!("Host: {host}\r\n"))?;
        } else {
            req.push_fmt(format_args!("Host: {host}:{port}\r\n"))?;
        }
        req.push(b"Connection: close\r\n")?;
        req.placeholder = req.buf.len();
        req.push(CONTENT_LENGTH_PLACEHOLDER)?;

        Ok(req)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently in the buffer.
    pub fn used(&self) -> usize {
        self.buf.len()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The target host, until the buffer is overwritten by the response.
    pub fn host(&self) -> Option<&str> {
        match self.phase {
            Phase::Building => std::str::from_utf8(&self.buf[..self.host_len]).ok(),
            Phase::Received => None,
        }
    }

    /// The request text as it stands, without the host anchor.
    pub fn request_bytes(&self) -> Option<&[u8]> {
        match self.phase {
            Phase::Building => Some(&self.buf[self.host_len..]),
            Phase::Received => None,
        }
    }

    /// Appends raw text, cutting it off at the buffer capacity.
    ///
    /// Returns how many bytes were appended.
    pub fn append_text(&mut self, text: &str) -> Result<usize, TransportError> {
        self.ensure_building()?;

        let room = self.capacity - self.buf.len();
        let n = text.len().min(room);
        self.buf.extend_from_slice(&text.as_bytes()[..n]);

        if n < text.len() {
            tracing::warn!(
                requested = text.len(),
                appended = n,
                capacity = self.capacity,
                "outbound request truncated"
            );
        }
        Ok(n)
    }

    /// Appends formatted text. Fails without appending anything if the
    /// result does not fit.
    pub fn append_formatted(&mut self, args: fmt::Arguments<'_>) -> Result<usize, TransportError> {
        self.ensure_building()?;
        self.push_fmt(args)
    }

    /// Ends the header block with a blank line, unless it already has one.
    ///
    /// Body text appended afterwards is counted into `Content-Length`.
    pub fn finish_headers(&mut self) -> Result<(), TransportError> {
        self.ensure_building()?;
        if self.headers_end().is_none() {
            self.push(b"\r\n")?;
        }
        Ok(())
    }

    /// Drops everything appended after the fixed headers.
    pub fn reset_body(&mut self) -> Result<(), TransportError> {
        self.ensure_building()?;
        self.buf.truncate(self.placeholder);
        self.push(CONTENT_LENGTH_PLACEHOLDER)
    }

    /// Terminates the headers and patches `Content-Length` with the body
    /// size, right-aligned in its fixed field.
    ///
    /// Returns the exact bytes [`execute`](Self::execute) will send.
    pub fn prepare(&mut self) -> Result<&[u8], TransportError> {
        self.finish_headers()?;

        let body_start = self
            .headers_end()
            .ok_or(TransportError::UnterminatedHeaders)?
            + HEADERS_END.len();
        let body_len = self.buf.len() - body_start;
        if body_len > MAX_BODY_LENGTH {
            return Err(TransportError::BufferExceeded {
                capacity: MAX_BODY_LENGTH,
            });
        }

        let start = self.placeholder + CONTENT_LENGTH_PREFIX.len();
        let mut field = &mut self.buf[start..start + CONTENT_LENGTH_WIDTH];
        write!(field, "{body_len:>8}").map_err(|_| TransportError::BufferExceeded {
            capacity: CONTENT_LENGTH_WIDTH,
        })?;

        Ok(&self.buf[self.host_len..])
    }

    /// Sends the request and receives the response into the same buffer.
    ///
    /// Performs one receive, then peeks once to decide whether a second
    /// receive is worth doing. The connection is closed on every path out.
    pub fn execute(&mut self) -> Result<(), TransportError> {
        let expected = self.prepare()?.len();
        let stream_addr = self.resolve()?;
        let mut stream = connect(&stream_addr)?;

        let sent = match stream.write(&self.buf[self.host_len..]) {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "send failed");
                0
            }
        };
        if sent != expected {
            return Err(TransportError::SendIncomplete { sent, expected });
        }
        tracing::trace!(bytes = sent, "outbound request sent");

        // the request text is gone from here on
        self.phase = Phase::Received;
        self.buf.clear();
        self.buf.resize(self.capacity, 0);

        let mut received = match stream.read(&mut self.buf) {
            Ok(n) => n,
            Err(e) => {
                self.buf.clear();
                return Err(TransportError::ReceiveFailed(e));
            }
        };

        if received > 0 && received < self.capacity {
            let mut probe = [0u8; 1];
            let more = match stream.peek(&mut probe) {
                Ok(n) => n > 0,
                Err(e) => matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ),
            };
            if more {
                match stream.read(&mut self.buf[received..]) {
                    Ok(n) => received += n,
                    Err(e) => tracing::debug!(error = %e, "second receive failed"),
                }
            }
        }

        self.buf.truncate(received);
        tracing::debug!(bytes = received, "outbound response received");
        Ok(())
    }

    /// The raw response, once received.
    pub fn response(&self) -> Option<&[u8]> {
        match self.phase {
            Phase::Received => Some(&self.buf),
            Phase::Building => None,
        }
    }

    /// Numeric status parsed from the status line.
    pub fn status_code(&self) -> Option<u16> {
        let rest = self.response()?.get(STATUS_PREFIX_LEN..)?;
        let rest = trim_start(rest);
        let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
        std::str::from_utf8(&rest[..digits]).ok()?.parse().ok()
    }

    /// Value of the first response header called `name` (ASCII
    /// case-insensitive), searched line by line.
    pub fn header(&self, name: &str) -> Option<&str> {
        let response = self.response()?;
        let head = match memmem::find(response, HEADERS_END) {
            Some(end) => &response[..end],
            None => response,
        };

        head.split(|&b| b == b'\n').skip(1).find_map(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let after = line.get(name.len()..)?;
            if !line[..name.len()].eq_ignore_ascii_case(name.as_bytes()) {
                return None;
            }
            let value = after.strip_prefix(b":")?;
            std::str::from_utf8(trim_start(value)).ok().map(str::trim_end)
        })
    }

    /// Response bytes after the header block.
    pub fn content(&self) -> Option<&[u8]> {
        let response = self.response()?;
        memmem::find(response, HEADERS_END).map(|end| &response[end + HEADERS_END.len()..])
    }

    /// The response's `Content-Length` header, parsed.
    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length")?.parse().ok()
    }

    fn ensure_building(&self) -> Result<(), TransportError> {
        match self.phase {
            Phase::Building => Ok(()),
            Phase::Received => Err(TransportError::AlreadyExecuted),
        }
    }

    /// Offset of the `\r\n\r\n` in the request text.
    fn headers_end(&self) -> Option<usize> {
        memmem::find(&self.buf[self.host_len..], HEADERS_END).map(|i| i + self.host_len)
    }

    fn push(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.buf.len() + bytes.len() > self.capacity {
            return Err(TransportError::BufferExceeded {
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn push_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<usize, TransportError> {
        let start = self.buf.len();
        let mut out = Bounded {
            buf: &mut self.buf,
            limit: self.capacity,
        };
        if fmt::write(&mut out, args).is_err() {
            self.buf.truncate(start);
            return Err(TransportError::BufferExceeded {
                capacity: self.capacity,
            });
        }
        Ok(self.buf.len() - start)
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>, TransportError> {
        let host = String::from_utf8_lossy(&self.buf[..self.host_len]);
        let addrs: Vec<SocketAddr> = (host.as_ref(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::ResolutionFailed {
                host: host.to_string(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::ResolutionFailed {
                host: host.into_owned(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            });
        }
        Ok(addrs)
    }
}

/// Connects to the first address that accepts.
fn connect(addrs: &[SocketAddr]) -> Result<TcpStream, TransportError> {
    let mut last = None;

    for &addr in addrs {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(TransportError::SocketCreateFailed)?;
        match socket.connect(&addr.into()) {
            Ok(()) => return Ok(socket.into()),
            Err(source) => {
                tracing::debug!(%addr, error = %source, "connect failed");
                last = Some(TransportError::ConnectFailed { addr, source });
            }
        }
    }

    Err(last.unwrap_or_else(|| {
        TransportError::SocketCreateFailed(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "no address to connect to",
        ))
    }))
}

fn trim_start(mut bytes: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = bytes {
        bytes = rest;
    }
    bytes
}
