use std::fmt;
use std::io::{self, Write};

use crate::http::response::StatusCode;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Value of the `Server` header.
pub const SERVER_NAME: &str = "picohttpd";

/// Capacity of the buffer that formatted text is rendered into. Headers and
/// chunk text must be shorter than this.
pub const FORMAT_BUFFER_SIZE: usize = 4096;

const DEFAULT_EXTRA_HEADERS: &str = "Content-Type: text/html\r\n";

#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error("formatted text does not fit in {capacity} bytes")]
    BufferExceeded { capacity: usize },
    #[error("content length {declared} exceeds the {available} body bytes supplied")]
    LengthMismatch { declared: usize, available: usize },
    #[error("write_chunk called outside a chunked response")]
    NotChunked,
    #[error("a response has already been started on this connection")]
    AlreadyResponded,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Where a writer is in its single response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Nothing sent yet.
    Ready,
    /// Between `begin_chunked` and `end_chunked`.
    Chunked,
    /// A complete response has been sent.
    Complete,
}

/// Fixed-size scratch space for `fmt::Arguments`.
struct FormatBuffer {
    bytes: [u8; FORMAT_BUFFER_SIZE],
    len: usize,
}

impl FormatBuffer {
    fn new() -> Self {
        Self {
            bytes: [0; FORMAT_BUFFER_SIZE],
            len: 0,
        }
    }

    fn render(&mut self, args: fmt::Arguments<'_>) -> Result<&[u8], WriteError> {
        self.len = 0;
        fmt::write(self, args).map_err(|_| WriteError::BufferExceeded {
            capacity: FORMAT_BUFFER_SIZE,
        })?;
        Ok(&self.bytes[..self.len])
    }
}

impl fmt::Write for FormatBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end >= FORMAT_BUFFER_SIZE {
            return Err(fmt::Error);
        }
        self.bytes[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

/// Writes one response straight to the connection.
///
/// Either [`respond_fixed`](Self::respond_fixed) is called once, or
/// [`begin_chunked`](Self::begin_chunked), any number of chunk writes, and
/// [`end_chunked`](Self::end_chunked). Nothing is buffered between calls;
/// each chunk write is one chunk on the wire.
pub struct ResponseWriter<'s> {
    stream: &'s mut dyn Write,
    state: WriterState,
    scratch: FormatBuffer,
}

impl<'s> ResponseWriter<'s> {
    pub fn new(stream: &'s mut dyn Write) -> Self {
        Self {
            stream,
            state: WriterState::Ready,
            scratch: FormatBuffer::new(),
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn is_chunked(&self) -> bool {
        self.state == WriterState::Chunked
    }

    /// Sends a complete response with a `Content-Length` header.
    ///
    /// `content_length` defaults to the length of `body`, or 0 without a body.
    /// A shorter `content_length` sends only that prefix of `body`; a longer
    /// one is rejected. `extra_headers` must be complete `Name: value\r\n`
    /// lines and defaults to `Content-Type: text/html`.
    pub fn respond_fixed(
        &mut self,
        status: impl Into<StatusCode>,
        body: Option<&[u8]>,
        content_length: Option<usize>,
        extra_headers: Option<&str>,
    ) -> Result<(), WriteError> {
        self.ensure_ready()?;
        let status = status.into();

        let length = match (body, content_length) {
            (Some(body), Some(len)) if len > body.len() => {
                return Err(WriteError::LengthMismatch {
                    declared: len,
                    available: body.len(),
                });
            }
            (_, Some(len)) => len,
            (Some(body), None) => body.len(),
            (None, None) => 0,
        };

        let head = self.scratch.render(format_args!(
            "{HTTP_VERSION} {status}\r\n\
             Server: {SERVER_NAME}\r\n\
             Cache-Control: no-cache\r\n\
             Content-Length: {length}\r\n\
             {}\r\n",
            extra_headers.unwrap_or(DEFAULT_EXTRA_HEADERS),
        ))?;

        self.state = WriterState::Complete;
        self.stream.write_all(head)?;
        if let Some(body) = body {
            self.stream.write_all(&body[..length])?;
        }
        self.stream.flush()?;

        tracing::trace!(status = status.as_u16(), length, "fixed response sent");
        Ok(())
    }

    /// Sends the status line and headers of a chunked response.
    pub fn begin_chunked(
        &mut self,
        status: impl Into<StatusCode>,
        extra_headers: Option<&str>,
    ) -> Result<(), WriteError> {
        self.ensure_ready()?;
        let status = status.into();

        let head = self.scratch.render(format_args!(
            "{HTTP_VERSION} {status}\r\n\
             Server: {SERVER_NAME}\r\n\
             Cache-Control: no-cache\r\n\
             Transfer-Encoding: chunked\r\n\
             {}\r\n",
            extra_headers.unwrap_or(DEFAULT_EXTRA_HEADERS),
        ))?;

        self.state = WriterState::Chunked;
        self.stream.write_all(head)?;
        Ok(())
    }

    /// Formats `args` and sends the result as one chunk.
    ///
    /// Returns the number of payload bytes. Text of [`FORMAT_BUFFER_SIZE`]
    /// bytes or more fails with [`WriteError::BufferExceeded`] and nothing is
    /// sent.
    pub fn write_chunk(&mut self, args: fmt::Arguments<'_>) -> Result<usize, WriteError> {
        if self.state != WriterState::Chunked {
            return Err(WriteError::NotChunked);
        }
        let text = self.scratch.render(args)?;
        write_framed(&mut *self.stream, text)
    }

    /// Sends already formatted bytes as one chunk.
    pub fn write_chunk_bytes(&mut self, bytes: &[u8]) -> Result<usize, WriteError> {
        if self.state != WriterState::Chunked {
            return Err(WriteError::NotChunked);
        }
        write_framed(&mut *self.stream, bytes)
    }

    /// Sends the terminating zero-length chunk.
    pub fn end_chunked(&mut self) -> Result<(), WriteError> {
        if self.state != WriterState::Chunked {
            return Err(WriteError::NotChunked);
        }
        self.state = WriterState::Complete;
        self.stream.write_all(b"0\r\n\r\n")?;
        self.stream.flush()?;
        Ok(())
    }

    fn ensure_ready(&self) -> Result<(), WriteError> {
        match self.state {
            WriterState::Ready => Ok(()),
            _ => Err(WriteError::AlreadyResponded),
        }
    }
}

fn write_framed<W: Write + ?Sized>(stream: &mut W, payload: &[u8]) -> Result<usize, WriteError> {
    if payload.is_empty() {
        return Ok(0);
    }
    write!(stream, "{:x}\r\n", payload.len())?;
    stream.write_all(payload)?;
    stream.write_all(b"\r\n")?;
    Ok(payload.len())
}

/// Formats and sends one chunk, like `write!` for a [`ResponseWriter`].
///
/// ```ignore
/// chunk!(response, "<h1>{}</h1>", title)?;
/// ```
#[macro_export]
macro_rules! chunk {
    ($writer:expr, $($arg:tt)*) => {
        $writer.write_chunk(::std::format_args!($($arg)*))
    };
}
