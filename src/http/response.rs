use std::fmt;

/// Reason phrase used for codes missing from the status table.
pub const UNKNOWN_REASON: &str = "???";

static STATUS_TABLE: &[(u16, &str)] = &[
    (100, "Continue"),
    (200, "OK"),
    (220, "OK"),
    (302, "Found"),
    (303, "See Other"),
    (400, "Bad Request"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (408, "Request Timeout"),
    (500, "Internal Server Error"),
    (505, "HTTP Version Not Supported"),
];

/// A numeric HTTP status code.
///
/// Any `u16` is accepted; codes outside the built-in table are still sent,
/// with the reason phrase [`UNKNOWN_REASON`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    /// 100 Continue
    pub const CONTINUE: StatusCode = StatusCode(100);
    /// 200 OK
    pub const OK: StatusCode = StatusCode(200);
    /// 302 Found
    pub const FOUND: StatusCode = StatusCode(302);
    /// 303 See Other
    pub const SEE_OTHER: StatusCode = StatusCode(303);
    /// 400 Bad Request
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    /// 403 Forbidden
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    /// 404 Not Found
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    /// 405 Method Not Allowed
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    /// 408 Request Timeout
    pub const REQUEST_TIMEOUT: StatusCode = StatusCode(408);
    /// 500 Internal Server Error
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    /// 505 HTTP Version Not Supported
    pub const HTTP_VERSION_NOT_SUPPORTED: StatusCode = StatusCode(505);

    pub const fn new(code: u16) -> Self {
        StatusCode(code)
    }

    /// Returns the numeric HTTP status code.
    ///
    /// ```
    /// # use picohttpd::http::response::StatusCode;
    /// assert_eq!(StatusCode::OK.as_u16(), 200);
    /// assert_eq!(StatusCode::new(220).as_u16(), 220);
    /// ```
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the reason phrase from the status table.
    ///
    /// ```
    /// # use picohttpd::http::response::StatusCode;
    /// assert_eq!(StatusCode::NOT_FOUND.reason_phrase(), "Not Found");
    /// assert_eq!(StatusCode::new(418).reason_phrase(), "???");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        STATUS_TABLE
            .iter()
            .find(|(code, _)| *code == self.0)
            .map_or(UNKNOWN_REASON, |&(_, reason)| reason)
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03} {}", self.0, self.reason_phrase())
    }
}
