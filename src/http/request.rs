use std::fmt;

use crate::http::table::{Entry, Span, Table};

/// HTTP request methods accepted by the parser.
///
/// Anything else is answered with `500` before a handler ever runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Submit form data
    POST,
}

impl Method {
    /// Parses a method token (case-sensitive).
    ///
    /// ```
    /// # use picohttpd::http::request::Method;
    /// assert_eq!(Method::from_bytes(b"GET"), Some(Method::GET));
    /// assert_eq!(Method::from_bytes(b"get"), None);
    /// assert_eq!(Method::from_bytes(b"PUT"), None);
    /// ```
    pub fn from_bytes(token: &[u8]) -> Option<Self> {
        match token {
            b"GET" => Some(Method::GET),
            b"POST" => Some(Method::POST),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request parsed from one connection.
///
/// All decoded text lives in a single owned arena; the location and both
/// tables are offsets into it. Header and argument tables are sorted by name.
#[derive(Debug)]
pub struct ParsedRequest {
    pub(crate) method: Method,
    pub(crate) arena: String,
    pub(crate) location: Span,
    pub(crate) headers: Vec<Entry>,
    pub(crate) args: Vec<Entry>,
}

impl ParsedRequest {
    pub fn method(&self) -> Method {
        self.method
    }

    /// The decoded path, without the query string.
    pub fn location(&self) -> &str {
        self.location.resolve(&self.arena)
    }

    /// Request headers, names and values URI-decoded.
    pub fn headers(&self) -> Table<'_> {
        Table::new(&self.arena, &self.headers)
    }

    /// Query arguments merged with form arguments from a POST body.
    pub fn args(&self) -> Table<'_> {
        Table::new(&self.arena, &self.args)
    }

    /// Looks up a header by exact (case-sensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name)
    }

    /// Looks up an argument by name, whether it came from the URL or the body.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args().get(name)
    }
}
