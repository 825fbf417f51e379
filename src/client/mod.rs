//! Outbound HTTP client.
//!
//! Builds a single request into one pre-sized buffer, sends it over a
//! blocking TCP connection, and reads the response back into the same
//! buffer.

pub mod outbound;

pub use outbound::{OutboundRequest, TransportError};
