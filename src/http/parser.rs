use std::io::Read;
use std::ops::Range;

use memchr::{memchr, memchr_iter, memmem};

use crate::http::request::{Method, ParsedRequest};
use crate::http::table::{Arena, Entry, sort_entries};

/// Size of the receive buffer. A request must fit in it.
pub const RECEIVE_BUFFER_SIZE: usize = 8 * 1024;

const VERSION_SUFFIX: &[u8] = b" HTTP/1.1";
const CRLF: &[u8] = b"\r\n";
const HEADERS_END: &[u8] = b"\r\n\r\n";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("connection closed before any request data arrived")]
    EmptyOrClosed,
    #[error("malformed request: {0}")]
    Malformed(&'static str),
    #[error("unsupported method")]
    UnsupportedMethod,
}

struct RequestLine {
    method: Method,
    path: Range<usize>,
    query: Range<usize>,
    /// Offset of the CRLF that ends the request line.
    line_end: usize,
}

/// Reads one request from `reader` and parses it.
///
/// Performs one read of up to [`RECEIVE_BUFFER_SIZE`] bytes. If the blank
/// line that ends the headers has not arrived yet, exactly one more read is
/// appended to the same buffer before giving up.
pub fn read_request<R: Read + ?Sized>(reader: &mut R) -> Result<ParsedRequest, ParseError> {
    let mut buf = [0u8; RECEIVE_BUFFER_SIZE];

    let mut filled = match reader.read(&mut buf) {
        Ok(0) => return Err(ParseError::EmptyOrClosed),
        Ok(n) => n,
        Err(e) => {
            tracing::debug!(error = %e, "initial read failed");
            return Err(ParseError::EmptyOrClosed);
        }
    };

    let line = parse_request_line(&buf[..filled])?;

    let boundary = match find_headers_end(&buf[..filled], &line) {
        Some(b) => b,
        None => {
            // Some clients send the request line and the headers in separate writes
            match reader.read(&mut buf[filled..]) {
                Ok(n) => filled += n,
                Err(e) => tracing::debug!(error = %e, "follow-up read failed"),
            }
            find_headers_end(&buf[..filled], &line)
                .ok_or(ParseError::Malformed("missing header terminator"))?
        }
    };

    Ok(assemble(&buf[..filled], &line, boundary))
}

/// Parses a request that is already complete in `buf`.
pub fn parse_request(buf: &[u8]) -> Result<ParsedRequest, ParseError> {
    if buf.is_empty() {
        return Err(ParseError::EmptyOrClosed);
    }

    let line = parse_request_line(buf)?;
    let boundary =
        find_headers_end(buf, &line).ok_or(ParseError::Malformed("missing header terminator"))?;

    Ok(assemble(buf, &line, boundary))
}

fn parse_request_line(buf: &[u8]) -> Result<RequestLine, ParseError> {
    let line_end = memmem::find(buf, CRLF).ok_or(ParseError::Malformed("unterminated request line"))?;
    let line = &buf[..line_end];

    let method_end = memchr(b' ', line).ok_or(ParseError::Malformed("missing method"))?;

    if !line.ends_with(VERSION_SUFFIX) {
        return Err(ParseError::Malformed("missing HTTP/1.1 version"));
    }

    let target_start = method_end + 1;
    let target_end = line_end - VERSION_SUFFIX.len();
    if target_end <= target_start {
        return Err(ParseError::Malformed("missing location"));
    }

    let method = Method::from_bytes(&line[..method_end]).ok_or(ParseError::UnsupportedMethod)?;

    let (path, query) = match memchr(b'?', &line[target_start..target_end]) {
        Some(q) => (
            target_start..target_start + q,
            target_start + q + 1..target_end,
        ),
        None => (target_start..target_end, target_end..target_end),
    };

    Ok(RequestLine {
        method,
        path,
        query,
        line_end,
    })
}

/// Offset of the `\r\n\r\n` that ends the header block.
///
/// The search starts at the CRLF of the request line so that a request
/// without any headers is recognised too.
fn find_headers_end(buf: &[u8], line: &RequestLine) -> Option<usize> {
    memmem::find(&buf[line.line_end..], HEADERS_END).map(|i| i + line.line_end)
}

fn assemble(buf: &[u8], line: &RequestLine, boundary: usize) -> ParsedRequest {
    let header_start = line.line_end + CRLF.len();
    // keep the CRLF of the last header line so every line is terminated
    let header_end = boundary + CRLF.len();
    let header_text = buf.get(header_start..header_end).unwrap_or_default();

    let query = &buf[line.query.clone()];
    let body = match line.method {
        Method::POST => &buf[boundary + HEADERS_END.len()..],
        Method::GET => &[][..],
    };

    let header_count = memchr_iter(b'\r', header_text).count();
    let arg_count = memchr_iter(b'=', query).count() + memchr_iter(b'=', body).count();

    let path = &buf[line.path.clone()];
    let mut arena = Arena::with_capacity(arena_capacity(&[path, header_text, query, body]));

    let location = arena.push_decoded(path);

    let mut headers = Vec::with_capacity(header_count);
    for header_line in split_lines(header_text) {
        let (name, value) = match memchr(b':', header_line) {
            Some(colon) => (&header_line[..colon], trim_ows(&header_line[colon + 1..])),
            None => (header_line, &[][..]),
        };
        headers.push(Entry {
            name: arena.push_decoded(name),
            value: arena.push_decoded(value),
        });
    }

    let mut args = Vec::with_capacity(arg_count);
    push_pairs(&mut arena, query, &mut args);
    push_pairs(&mut arena, body, &mut args);

    debug_assert!(headers.len() <= header_count);
    debug_assert!(args.len() <= arg_count);

    let arena = arena.into_text();
    sort_entries(&arena, &mut headers);
    sort_entries(&arena, &mut args);

    tracing::trace!(
        method = %line.method,
        headers = headers.len(),
        args = args.len(),
        "request parsed"
    );

    ParsedRequest {
        method: line.method,
        arena,
        location,
        headers,
        args,
    }
}

/// Upper bound on the decoded size of `sections`.
///
/// Decoding never lengthens ASCII, and a `%XX` escape shrinks to one byte, so
/// only raw non-ASCII bytes can grow: each may become a 3-byte U+FFFD.
fn arena_capacity(sections: &[&[u8]]) -> usize {
    sections
        .iter()
        .map(|s| s.len() + 2 * s.iter().filter(|b| !b.is_ascii()).count())
        .sum()
}

/// Splits CRLF-terminated lines, skipping empty ones.
fn split_lines(text: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = text;
    std::iter::from_fn(move || {
        loop {
            if rest.is_empty() {
                return None;
            }
            let end = memmem::find(rest, CRLF).unwrap_or(rest.len());
            let line = &rest[..end];
            rest = rest.get(end + CRLF.len()..).unwrap_or_default();
            if !line.is_empty() {
                return Some(line);
            }
        }
    })
}

fn trim_ows(mut value: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = value {
        value = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = value {
        value = rest;
    }
    value
}

/// Splits `name=value&name=value` into entries. Pieces without `=` are
/// ignored.
fn push_pairs(arena: &mut Arena, text: &[u8], entries: &mut Vec<Entry>) {
    for piece in text.split(|&b| b == b'&') {
        if let Some(eq) = memchr(b'=', piece) {
            entries.push(Entry {
                name: arena.push_decoded(&piece[..eq]),
                value: arena.push_decoded(&piece[eq + 1..]),
            });
        }
    }
}
