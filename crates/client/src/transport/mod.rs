//! Transport abstraction for the client connection.
//!
//! The core treats the network as an opaque blocking byte stream with
//! `read`/`write`/`close`. [`Transport`] is that seam, [`Connector`] is
//! how a connection obtains one, and [`TransportCell`] is the shared
//! buffered handle the connection and its in-flight response both hold.
//!
//! TLS is deliberately not implemented here: an encrypted stream is just
//! another [`Transport`] supplied by an external wrapper. The built-in
//! [`TcpConnector`] only knows the plain mode and reports
//! [`HttpError::UnimplementedMode`] for anything else.

mod cell;

pub use cell::TransportCell;

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use tracing::{debug, trace};

use crate::protocol::HttpError;

/// A blocking byte stream the connection can write requests to and read
/// responses from.
///
/// Timeouts and cancellation are the implementor's responsibility (for a
/// TCP stream, a deadline set on the socket).
pub trait Transport: Read + Write {
    /// Close the stream. Further reads observe end-of-stream.
    fn close(&mut self) -> io::Result<()>;
}

#[cfg(test)]
impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Transport")
    }
}

impl Transport for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// The flavor of stream a connector is asked to open.
///
/// `Tls` is requested when the client configuration carries certificate
/// options; whether it is supported is up to the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Plain,
    Tls,
}

/// Opens transports for a connection.
///
/// Injected into `HttpConnection` so tests can substitute an in-memory
/// stream and so TLS wrapping can live outside the core.
#[cfg_attr(test, mockall::automock)]
pub trait Connector {
    fn open(&mut self, kind: TransportKind, host: &str, port: u16) -> Result<Box<dyn Transport>, HttpError>;
}

/// The default connector: plain TCP, no TLS.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    /// Resolves the host and attempts each address in order, returning
    /// the first stream that connects. Fails with the last connect error,
    /// or a generic "no addresses" error when resolution yields none.
    fn open(&mut self, kind: TransportKind, host: &str, port: u16) -> Result<Box<dyn Transport>, HttpError> {
        match kind {
            TransportKind::Plain => {
                let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();

                let mut last_error = None;
                for addr in addrs {
                    trace!(%addr, "attempting connect");
                    match TcpStream::connect(addr) {
                        Ok(stream) => {
                            debug!(%addr, "connected");
                            return Ok(Box::new(stream));
                        }
                        Err(e) => last_error = Some(e),
                    }
                }

                Err(HttpError::io(last_error.unwrap_or_else(|| {
                    io::Error::new(ErrorKind::NotFound, "address resolution returned no addresses")
                })))
            }
            TransportKind::Tls => Err(HttpError::unimplemented_mode("tls")),
        }
    }
}
