//! picohttpd - a small blocking HTTP/1.1 server and client
//!
//! Core library for request parsing, response writing and outbound requests.

pub mod client;
pub mod config;
pub mod http;
pub mod server;
pub mod site;
