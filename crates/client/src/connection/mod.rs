//! Connection management: the per-host state machine and its
//! configuration.

mod config;
mod http_connection;

pub use config::ClientConfig;
pub use http_connection::{HTTP_PORT, HttpConnection};
