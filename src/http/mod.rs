//! HTTP protocol implementation.
//!
//! A deliberately small HTTP/1.1 engine: one request per connection, no
//! keep-alive, only `GET` and `POST`.
//!
//! # Architecture
//!
//! - **`text`**: URI decoding and HTML escaping
//! - **`table`**: sorted name/value tables over a per-request arena
//! - **`parser`**: reads and parses a request from a byte stream
//! - **`request`**: the parsed request and its accessors
//! - **`response`**: status codes and reason phrases
//! - **`writer`**: fixed-length and chunked responses written straight to the socket
//! - **`connection`**: the per-connection cycle and the [`Handler`](connection::Handler) trait
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection cycle
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← One read, plus one more if the headers are split
//!        └──────┬──────┘
//!               │ Request parsed (parse error → 500)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Handler writes a fixed or chunked response
//!        └──────┬───────────┘
//!               │
//!               ▼
//!        ┌──────────────────┐
//!        │     Closed       │
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use picohttpd::http::connection::Connection;
//! use picohttpd::http::request::ParsedRequest;
//! use picohttpd::http::response::StatusCode;
//! use picohttpd::http::writer::ResponseWriter;
//! use std::net::TcpListener;
//!
//! fn hello(_req: &ParsedRequest, res: &mut ResponseWriter<'_>) -> anyhow::Result<()> {
//!     res.respond_fixed(StatusCode::OK, Some(b"Hello, world!".as_slice()), None, None)?;
//!     Ok(())
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080")?;
//!     let mut handler = hello;
//!
//!     for stream in listener.incoming() {
//!         let mut conn = Connection::new(stream?);
//!         if let Err(e) = conn.run(&mut handler) {
//!             eprintln!("Connection error: {}", e);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod table;
pub mod text;
pub mod writer;
