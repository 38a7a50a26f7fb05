//! A blocking micro HTTP/1.1 client transport
//!
//! This crate provides a lightweight, modular HTTP/1.1 client transport
//! built on blocking I/O. It focuses on faithful protocol mechanics —
//! connection state, response framing, persistence — while keeping the
//! API small and the error reporting explicit.
//!
//! # Features
//!
//! - Full HTTP/1.1 request/response exchange over persistent connections
//! - Strict per-connection state machine (no pipelining)
//! - All three response framing modes: `Content-Length`, chunked
//!   transfer decoding, and read-until-close
//! - Connection persistence decided per response, including the
//!   HTTP/1.0 keep-alive rules
//! - Transparent single retry when the server drops an idle persistent
//!   connection
//! - HTTP/0.9 simple-response fallback
//! - Pluggable transports behind a small trait, so TLS wrapping and
//!   in-memory testing stay outside the core
//!
//! # Example
//!
//! ```no_run
//! use http::{HeaderMap, Method};
//! use tracing::{info, Level};
//! use tracing_subscriber::FmtSubscriber;
//! use micro_http_client::connection::HttpConnection;
//! use micro_http_client::protocol::HttpError;
//!
//! fn main() -> Result<(), HttpError> {
//!     // Initialize logging
//!     let subscriber = FmtSubscriber::builder()
//!         .with_max_level(Level::INFO)
//!         .finish();
//!     tracing::subscriber::set_global_default(subscriber)
//!         .expect("setting default subscriber failed");
//!
//!     let mut conn = HttpConnection::new("example.com")?;
//!     conn.request(&Method::GET, "/", b"", &HeaderMap::new())?;
//!
//!     let mut response = conn.get_response()?;
//!     info!(status = response.status()?, "response head received");
//!
//!     let body = response.read(None)?;
//!     println!("{}", String::from_utf8_lossy(&body));
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`connection`]: The connection state machine and its configuration
//! - [`protocol`]: Response type, error taxonomy and URL splitting
//! - [`codec`]: Response head parsing, framing decision and body decoding
//! - [`transport`]: The blocking stream abstraction and the default TCP
//!   connector

pub mod codec;
pub mod connection;
pub mod protocol;
pub mod transport;
mod utils;
