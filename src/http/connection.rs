use std::io::{Read, Write};

use crate::http::parser::{ParseError, read_request};
use crate::http::request::ParsedRequest;
use crate::http::response::StatusCode;
use crate::http::writer::{ResponseWriter, WriterState};

/// Application callback, invoked once per parsed request.
///
/// The handler value doubles as the user context. It must drive exactly one
/// response on `response`: a single `respond_fixed`, or `begin_chunked`,
/// chunk writes and `end_chunked`.
pub trait Handler {
    fn handle(
        &mut self,
        request: &ParsedRequest,
        response: &mut ResponseWriter<'_>,
    ) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: FnMut(&ParsedRequest, &mut ResponseWriter<'_>) -> anyhow::Result<()>,
{
    fn handle(
        &mut self,
        request: &ParsedRequest,
        response: &mut ResponseWriter<'_>,
    ) -> anyhow::Result<()> {
        self(request, response)
    }
}

/// One accepted client, served exactly once.
pub struct Connection<S> {
    stream: S,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(ParsedRequest),
    Closed,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            state: ConnectionState::Reading,
        }
    }

    /// Reads the request, runs `handler`, and finishes the response.
    ///
    /// Parse failures are answered with `500` here. The stream is closed when
    /// the connection is dropped.
    pub fn run<H: Handler + ?Sized>(&mut self, handler: &mut H) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => match read_request(&mut self.stream) {
                    Ok(request) => {
                        tracing::debug!(
                            method = %request.method(),
                            location = %request.location(),
                            "request received"
                        );
                        self.state = ConnectionState::Processing(request);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "rejecting request");
                        self.reject(&e)?;
                    }
                },

                ConnectionState::Processing(request) => {
                    self.dispatch(handler, &request)?;
                }

                ConnectionState::Closed => break,
            }
        }

        Ok(())
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn reject(&mut self, error: &ParseError) -> anyhow::Result<()> {
        let body: Option<&[u8]> = match error {
            ParseError::UnsupportedMethod => Some(&b"unsupported method"[..]),
            _ => None,
        };

        let mut writer = ResponseWriter::new(&mut self.stream);
        match writer.respond_fixed(StatusCode::INTERNAL_SERVER_ERROR, body, None, None) {
            Ok(()) => Ok(()),
            // the peer is usually gone already
            Err(e) if matches!(error, ParseError::EmptyOrClosed) => {
                tracing::trace!(error = %e, "could not answer closed connection");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn dispatch<H: Handler + ?Sized>(
        &mut self,
        handler: &mut H,
        request: &ParsedRequest,
    ) -> anyhow::Result<()> {
        let mut writer = ResponseWriter::new(&mut self.stream);
        let result = handler.handle(request, &mut writer);

        if let Err(e) = &result {
            tracing::warn!(
                error = %e,
                location = %request.location(),
                "handler failed"
            );
        }

        match writer.state() {
            WriterState::Complete => {}
            WriterState::Chunked => {
                tracing::warn!(location = %request.location(), "handler left chunked response open");
                writer.end_chunked()?;
            }
            WriterState::Ready => {
                if result.is_ok() {
                    tracing::warn!(location = %request.location(), "handler sent no response");
                }
                writer.respond_fixed(StatusCode::INTERNAL_SERVER_ERROR, None, None, None)?;
            }
        }

        Ok(())
    }
}
