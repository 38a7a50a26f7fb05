//! The client connection state machine.
//!
//! A connection moves through three states per exchange: `Idle`,
//! `RequestStarted` (request line sent, headers may follow) and
//! `RequestSent` (header block terminated, a response may be fetched).
//! Responses are strictly sequential — there is no pipelining, and a
//! fetched response must be fully consumed or closed before the next
//! one can be read.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use http::{HeaderMap, Method, header};
use tracing::{debug, trace};

use super::config::ClientConfig;
use crate::protocol::url::UrlSplitter;
use crate::protocol::{HttpError, Response, StateError};
use crate::transport::{Connector, TcpConnector, TransportCell, TransportKind};
use crate::utils::ensure;

/// Default port when the host spec carries none.
pub const HTTP_PORT: u16 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Idle,
    RequestStarted,
    RequestSent,
}

/// A blocking HTTP/1.1 client connection to one host.
///
/// # Example
///
/// ```no_run
/// use http::{HeaderMap, Method};
/// use micro_http_client::connection::HttpConnection;
///
/// # fn main() -> Result<(), micro_http_client::protocol::HttpError> {
/// let mut conn = HttpConnection::new("example.com")?;
/// conn.request(&Method::GET, "/", b"", &HeaderMap::new())?;
/// let mut resp = conn.get_response()?;
/// println!("{} {}", resp.status()?, resp.reason()?);
/// let body = resp.read(None)?;
/// # let _ = body;
/// # Ok(())
/// # }
/// ```
pub struct HttpConnection {
    host: String,
    port: u16,
    config: ClientConfig,
    connector: Box<dyn Connector>,
    urls: UrlSplitter,
    transport: Option<TransportCell>,
    state: ConnectionState,
    /// Completion flag of the response currently being read, if any.
    pending: Option<Rc<Cell<bool>>>,
}

impl fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.state)
            .field("connected", &self.transport.is_some())
            .field("pending_response", &self.pending.is_some())
            .finish()
    }
}

impl HttpConnection {
    /// Creates a connection to `host` or `host:port` with the default
    /// configuration. No transport is opened until the first send.
    ///
    /// # Errors
    ///
    /// [`HttpError::InvalidUrl`] when the port part is not numeric.
    pub fn new(spec: &str) -> Result<Self, HttpError> {
        Self::with_config(spec, ClientConfig::default())
    }

    pub fn with_config(spec: &str, config: ClientConfig) -> Result<Self, HttpError> {
        Self::with_connector(spec, config, Box::new(TcpConnector))
    }

    /// Creates a connection with an explicit [`Connector`], the seam
    /// used for TLS wrappers and in-memory transports.
    pub fn with_connector(
        spec: &str,
        config: ClientConfig,
        connector: Box<dyn Connector>,
    ) -> Result<Self, HttpError> {
        let (host, port) = split_host_port(spec)?;
        Ok(Self {
            host,
            port,
            config,
            connector,
            urls: UrlSplitter::new(),
            transport: None,
            state: ConnectionState::Idle,
            pending: None,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Opens the transport now instead of on the first send.
    pub fn connect(&mut self) -> Result<(), HttpError> {
        let kind = if self.config.wants_tls() { TransportKind::Tls } else { TransportKind::Plain };
        let stream = self.connector.open(kind, &self.host, self.port)?;
        debug!(host = %self.host, port = self.port, ?kind, "transport opened");
        self.transport = Some(TransportCell::new(stream));
        Ok(())
    }

    /// Writes raw bytes to the transport, opening one first when the
    /// connection is down and auto-reconnect is on.
    ///
    /// A broken-pipe or connection-reset failure closes the connection
    /// before propagating, so the next send starts fresh.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), HttpError> {
        if self.transport.is_none() {
            ensure!(self.config.auto_reconnect, HttpError::NotConnected);
            self.connect()?;
        }
        trace!(len = bytes.len(), "send");

        let transport = self.transport.as_ref().ok_or(HttpError::NotConnected)?;
        if let Err(e) = transport.write_all(bytes) {
            let err = HttpError::io(e);
            if err.is_connection_dropped() {
                debug!("peer dropped the connection mid-send");
                self.close();
            }
            return Err(err);
        }
        Ok(())
    }

    /// Sends the request line and the automatic headers, entering the
    /// `RequestStarted` state.
    ///
    /// An empty `url` is sent as `/`. Unless `skip_host` is set, a
    /// `Host` header is derived from the URL's netloc for absolute
    /// targets and from the connection's host (and non-default port)
    /// otherwise. `Accept-Encoding: identity` is always sent: this
    /// client decodes no content codings.
    ///
    /// # Errors
    ///
    /// [`StateError::CannotSendRequest`] unless the connection is idle.
    pub fn start_request(&mut self, method: &Method, url: &str, skip_host: bool) -> Result<(), HttpError> {
        self.discard_finished_response();
        ensure!(self.state == ConnectionState::Idle, StateError::CannotSendRequest.into());
        self.state = ConnectionState::RequestStarted;

        let target = if url.is_empty() { "/" } else { url };
        debug!(%method, target, "request started");
        self.send(format!("{method} {target} HTTP/1.1\r\n").as_bytes())?;

        if !skip_host {
            let netloc =
                if target.starts_with("http") { self.urls.split(target).netloc } else { String::new() };
            let host_value = if !netloc.is_empty() {
                netloc
            } else if self.port == HTTP_PORT {
                self.host.clone()
            } else {
                format!("{}:{}", self.host, self.port)
            };
            self.add_header("Host", &host_value)?;
        }
        self.add_header("Accept-Encoding", "identity")?;
        Ok(())
    }

    /// Sends one request header.
    ///
    /// # Errors
    ///
    /// [`StateError::CannotSendHeader`] outside the `RequestStarted`
    /// state.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
        ensure!(self.state == ConnectionState::RequestStarted, StateError::CannotSendHeader.into());
        self.send(format!("{name}: {value}\r\n").as_bytes())
    }

    /// Terminates the header block, entering the `RequestSent` state.
    ///
    /// # Errors
    ///
    /// [`StateError::CannotSendHeader`] outside the `RequestStarted`
    /// state.
    pub fn finish_headers(&mut self) -> Result<(), HttpError> {
        ensure!(self.state == ConnectionState::RequestStarted, StateError::CannotSendHeader.into());
        self.state = ConnectionState::RequestSent;
        self.send(b"\r\n")
    }

    /// Sends a complete request: request line, automatic and caller
    /// headers, and the body.
    ///
    /// A caller-supplied `Host` header suppresses the automatic one. A
    /// non-empty body gets an automatic `Content-Length`. When the peer
    /// dropped the connection mid-request and auto-reconnect is on, the
    /// whole request is retried exactly once on a fresh transport.
    pub fn request(
        &mut self,
        method: &Method,
        url: &str,
        body: &[u8],
        headers: &HeaderMap,
    ) -> Result<(), HttpError> {
        match self.send_request(method, url, body, headers) {
            Err(e) if e.is_connection_dropped() && self.config.auto_reconnect => {
                debug!("connection dropped mid-request, retrying once");
                self.send_request(method, url, body, headers)
            }
            result => result,
        }
    }

    fn send_request(
        &mut self,
        method: &Method,
        url: &str,
        body: &[u8],
        headers: &HeaderMap,
    ) -> Result<(), HttpError> {
        let skip_host = headers.contains_key(header::HOST);
        self.start_request(method, url, skip_host)?;

        if !body.is_empty() {
            self.add_header("Content-Length", &body.len().to_string())?;
        }
        for (name, value) in headers {
            let value = value.to_str().map_err(|_| {
                HttpError::io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("header {name} has a non-text value"),
                ))
            })?;
            self.add_header(name.as_str(), value)?;
        }
        self.finish_headers()?;

        if !body.is_empty() {
            self.send(body)?;
        }
        Ok(())
    }

    /// Parses the head of the server's response and returns the
    /// [`Response`] handle, re-entering the `Idle` state.
    ///
    /// A will-close response takes the transport with it: the
    /// connection detaches and the next request opens a fresh one,
    /// while the returned response keeps reading the old stream.
    /// Otherwise the transport stays shared and the next response
    /// cannot be fetched until this one is consumed or closed.
    ///
    /// # Errors
    ///
    /// [`StateError::ResponseNotReady`] unless a request has been fully
    /// sent and no earlier response is still open; otherwise whatever
    /// head parsing reports.
    pub fn get_response(&mut self) -> Result<Response, HttpError> {
        self.discard_finished_response();
        ensure!(
            self.state == ConnectionState::RequestSent && self.pending.is_none(),
            StateError::ResponseNotReady.into()
        );

        let transport = self.transport.clone().ok_or(HttpError::NotConnected)?;
        let mut response = Response::new(transport);
        response.begin()?;

        self.state = ConnectionState::Idle;
        if response.detaches_connection() {
            debug!("response will close the connection, detaching transport");
            self.transport = None;
            self.pending = None;
        } else {
            self.pending = Some(response.completion_flag());
        }
        Ok(response)
    }

    /// Closes the transport and resets the state machine. A pending
    /// response is released. Idempotent.
    pub fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            debug!("closing connection");
            let _ = transport.close();
        }
        if let Some(pending) = self.pending.take() {
            pending.set(true);
        }
        self.state = ConnectionState::Idle;
    }

    fn discard_finished_response(&mut self) {
        if self.pending.as_ref().is_some_and(|flag| flag.get()) {
            self.pending = None;
        }
    }
}

fn split_host_port(spec: &str) -> Result<(String, u16), HttpError> {
    match spec.find(':') {
        Some(pos) => {
            let port = spec[pos + 1..]
                .parse()
                .map_err(|_| HttpError::invalid_url(&spec[pos + 1..]))?;
            Ok((spec[..pos].to_string(), port))
        }
        None => Ok((spec.to_string(), HTTP_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;
    use crate::transport::{MockConnector, Transport};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;

    fn connector_for(transports: Vec<ScriptedTransport>) -> Box<dyn Connector> {
        let mut queue: VecDeque<ScriptedTransport> = transports.into();
        let mut connector = MockConnector::new();
        connector.expect_open().returning_st(move |_, _, _| match queue.pop_front() {
            Some(t) => Ok(Box::new(t) as Box<dyn Transport>),
            None => Err(HttpError::io(io::Error::new(io::ErrorKind::NotFound, "script exhausted"))),
        });
        Box::new(connector)
    }

    fn connection(spec: &str, transports: Vec<ScriptedTransport>) -> HttpConnection {
        HttpConnection::with_connector(spec, ClientConfig::default(), connector_for(transports))
            .unwrap()
    }

    fn written_of(transport: &ScriptedTransport) -> Rc<RefCell<Vec<u8>>> {
        transport.written_handle()
    }

    #[test]
    fn host_port_parsing() {
        let conn = connection("example.com", vec![]);
        assert_eq!(conn.host(), "example.com");
        assert_eq!(conn.port(), HTTP_PORT);

        let conn = connection("example.com:8080", vec![]);
        assert_eq!(conn.port(), 8080);

        let err = HttpConnection::new("example.com:http").unwrap_err();
        assert!(matches!(err, HttpError::InvalidUrl { port } if port == "http"));
    }

    #[test]
    fn request_wire_format() {
        let transport = ScriptedTransport::sink();
        let written = written_of(&transport);
        let mut conn = connection("example.com", vec![transport]);

        conn.request(&Method::GET, "/index.html", b"", &HeaderMap::new()).unwrap();

        assert_eq!(
            written.borrow().as_slice(),
            b"GET /index.html HTTP/1.1\r\n\
              Host: example.com\r\n\
              Accept-Encoding: identity\r\n\
              \r\n" as &[u8]
        );
    }

    #[test]
    fn empty_url_is_sent_as_root() {
        let transport = ScriptedTransport::sink();
        let written = written_of(&transport);
        let mut conn = connection("example.com", vec![transport]);

        conn.request(&Method::GET, "", b"", &HeaderMap::new()).unwrap();
        assert!(written.borrow().starts_with(b"GET / HTTP/1.1\r\n"));
    }

    #[test]
    fn nondefault_port_appears_in_host_header() {
        let transport = ScriptedTransport::sink();
        let written = written_of(&transport);
        let mut conn = connection("example.com:8080", vec![transport]);

        conn.request(&Method::GET, "/", b"", &HeaderMap::new()).unwrap();
        let bytes = written.borrow();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.contains("\r\nHost: example.com:8080\r\n"), "got: {text}");
    }

    #[test]
    fn absolute_url_takes_host_from_netloc() {
        let transport = ScriptedTransport::sink();
        let written = written_of(&transport);
        let mut conn = connection("proxy.internal:3128", vec![transport]);

        conn.request(&Method::GET, "http://origin.example/x", b"", &HeaderMap::new()).unwrap();
        let bytes = written.borrow();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.contains("\r\nHost: origin.example\r\n"), "got: {text}");
    }

    #[test]
    fn caller_host_header_suppresses_the_automatic_one() {
        let transport = ScriptedTransport::sink();
        let written = written_of(&transport);
        let mut conn = connection("example.com", vec![transport]);

        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "other.example".parse().unwrap());
        conn.request(&Method::GET, "/", b"", &headers).unwrap();

        let bytes = written.borrow();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(text.matches("\r\nhost:").count() + text.matches("\r\nHost:").count(), 1);
        assert!(text.contains("other.example"), "got: {text}");
    }

    #[test]
    fn nonempty_body_gets_content_length_and_is_sent() {
        let transport = ScriptedTransport::sink();
        let written = written_of(&transport);
        let mut conn = connection("example.com", vec![transport]);

        conn.request(&Method::POST, "/submit", b"hello", &HeaderMap::new()).unwrap();

        let bytes = written.borrow();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.contains("\r\nContent-Length: 5\r\n"), "got: {text}");
        assert!(text.ends_with("\r\n\r\nhello"), "got: {text}");
    }

    #[test]
    fn empty_body_has_no_content_length() {
        let transport = ScriptedTransport::sink();
        let written = written_of(&transport);
        let mut conn = connection("example.com", vec![transport]);

        conn.request(&Method::GET, "/", b"", &HeaderMap::new()).unwrap();
        let bytes = written.borrow();
        assert!(!std::str::from_utf8(&bytes).unwrap().contains("Content-Length"));
    }

    #[test]
    fn double_start_request_is_rejected() {
        let mut conn = connection("example.com", vec![ScriptedTransport::sink()]);

        conn.start_request(&Method::GET, "/", false).unwrap();
        let err = conn.start_request(&Method::GET, "/", false).unwrap_err();
        assert!(matches!(
            err,
            HttpError::State { source: StateError::CannotSendRequest }
        ));

        // the in-flight request is unaffected
        conn.finish_headers().unwrap();
    }

    #[test]
    fn headers_only_while_request_is_open() {
        let mut conn = connection("example.com", vec![ScriptedTransport::sink()]);

        let err = conn.add_header("X-Early", "1").unwrap_err();
        assert!(matches!(err, HttpError::State { source: StateError::CannotSendHeader }));

        conn.start_request(&Method::GET, "/", false).unwrap();
        conn.add_header("X-Now", "1").unwrap();
        conn.finish_headers().unwrap();

        let err = conn.add_header("X-Late", "1").unwrap_err();
        assert!(matches!(err, HttpError::State { source: StateError::CannotSendHeader }));
        let err = conn.finish_headers().unwrap_err();
        assert!(matches!(err, HttpError::State { source: StateError::CannotSendHeader }));
    }

    #[test]
    fn get_response_requires_a_sent_request() {
        let mut conn = connection("example.com", vec![ScriptedTransport::sink()]);
        let err = conn.get_response().unwrap_err();
        assert!(matches!(err, HttpError::State { source: StateError::ResponseNotReady }));
    }

    #[test]
    fn pending_response_blocks_the_next_one() {
        let transport = ScriptedTransport::new(&[
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nfirst",
            b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nsecond",
        ]);
        let mut conn = connection("example.com", vec![transport]);

        conn.request(&Method::GET, "/a", b"", &HeaderMap::new()).unwrap();
        let mut first = conn.get_response().unwrap();

        // second exchange on the same transport
        conn.request(&Method::GET, "/b", b"", &HeaderMap::new()).unwrap();
        let err = conn.get_response().unwrap_err();
        assert!(matches!(err, HttpError::State { source: StateError::ResponseNotReady }));

        // draining the first body unblocks the second response
        assert_eq!(&first.read(None).unwrap()[..], b"first");
        assert!(first.is_closed());

        let mut second = conn.get_response().unwrap();
        assert_eq!(&second.read(None).unwrap()[..], b"second");
    }

    #[test]
    fn will_close_response_detaches_the_transport() {
        let transport =
            ScriptedTransport::single(b"HTTP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nhello");
        let stream_closed = transport.closed_handle();
        let fresh = ScriptedTransport::sink();
        let fresh_written = written_of(&fresh);
        let mut conn = connection("example.com", vec![transport, fresh]);

        conn.request(&Method::GET, "/", b"", &HeaderMap::new()).unwrap();
        let mut resp = conn.get_response().unwrap();
        assert!(resp.will_close().unwrap());
        assert!(!conn.is_connected());
        // detaching hands the stream to the response without closing it
        assert!(!stream_closed.get());

        // the next request opens a fresh transport while the old
        // response stays readable
        conn.request(&Method::GET, "/next", b"", &HeaderMap::new()).unwrap();
        assert!(fresh_written.borrow().starts_with(b"GET /next HTTP/1.1\r\n"));
        assert_eq!(&resp.read(None).unwrap()[..], b"hello");
    }

    #[test]
    fn dropped_connection_is_retried_once() {
        let failing = ScriptedTransport::sink().with_write_failures(1);
        let fresh = ScriptedTransport::sink();
        let fresh_written = written_of(&fresh);
        let mut conn = connection("example.com", vec![failing, fresh]);

        conn.request(&Method::GET, "/retry", b"", &HeaderMap::new()).unwrap();

        let bytes = fresh_written.borrow();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("GET /retry HTTP/1.1\r\n"), "got: {text}");
        assert!(text.ends_with("\r\n\r\n"), "got: {text}");
    }

    #[test]
    fn persistent_write_failure_is_not_retried_forever() {
        let first = ScriptedTransport::sink().with_write_failures(1);
        let second = ScriptedTransport::sink().with_write_failures(1);
        let mut conn = connection("example.com", vec![first, second]);

        let err = conn.request(&Method::GET, "/", b"", &HeaderMap::new()).unwrap_err();
        assert!(err.is_connection_dropped());
        assert!(!conn.is_connected());
    }

    #[test]
    fn send_without_transport_fails_when_auto_reconnect_is_off() {
        let config = ClientConfig { auto_reconnect: false, ..ClientConfig::default() };
        let mut conn =
            HttpConnection::with_connector("example.com", config, connector_for(vec![])).unwrap();

        let err = conn.start_request(&Method::GET, "/", false).unwrap_err();
        assert!(matches!(err, HttpError::NotConnected));
    }

    #[test]
    fn tls_configuration_requests_a_tls_transport() {
        let mut connector = MockConnector::new();
        connector
            .expect_open()
            .withf(|kind, _, _| *kind == TransportKind::Tls)
            .returning_st(|_, _, _| Err(HttpError::unimplemented_mode("tls")));

        let config = ClientConfig {
            cert_file: Some("/etc/pki/client.pem".into()),
            ..ClientConfig::default()
        };
        let mut conn =
            HttpConnection::with_connector("example.com", config, Box::new(connector)).unwrap();

        let err = conn.connect().unwrap_err();
        assert!(matches!(err, HttpError::UnimplementedMode { mode } if mode == "tls"));
    }

    #[test]
    fn close_releases_the_pending_response_and_resets_state() {
        let transport =
            ScriptedTransport::single(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");
        let stream_closed = transport.closed_handle();
        let fresh = ScriptedTransport::sink();
        let mut conn = connection("example.com", vec![transport, fresh]);

        conn.request(&Method::GET, "/", b"", &HeaderMap::new()).unwrap();
        let resp = conn.get_response().unwrap();
        assert!(!resp.is_closed());

        conn.close();
        conn.close();
        assert!(stream_closed.get());
        assert!(resp.is_closed());

        // state machine is reset, a new exchange auto-reconnects
        conn.start_request(&Method::GET, "/", false).unwrap();
    }

    #[test]
    fn bad_status_line_closes_the_stream() {
        let transport = ScriptedTransport::single(b"garbage response\r\n");
        let stream_closed = transport.closed_handle();
        let mut conn = connection("example.com", vec![transport]);

        conn.request(&Method::GET, "/", b"", &HeaderMap::new()).unwrap();
        let err = conn.get_response().unwrap_err();
        assert!(matches!(err, HttpError::BadStatusLine { .. }));
        assert!(stream_closed.get());
    }
}
