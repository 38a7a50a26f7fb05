//! Wire decoding for the response side of an exchange.
//!
//! # Components
//!
//! - [`framing`]: the pure framing decision — body delimiter and
//!   connection persistence from status, version and headers
//! - [`body`]: the streaming body reader for all three framing modes,
//!   including chunked transfer decoding
//! - `response_decoder`: status-line and header-block parsing
//!
//! The request side needs no codec: the connection writes request lines
//! and headers directly.

pub mod body;
pub mod framing;
pub(crate) mod response_decoder;

pub use body::BodyReader;
pub use framing::{Framing, FramingDecision};
