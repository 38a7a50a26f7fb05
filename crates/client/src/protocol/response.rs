//! The response half of an exchange.
//!
//! A [`Response`] is only ever created by reading a status line and
//! headers off a transport. Until [`Response::begin`] has run, every
//! accessor answers [`StateError::ResponseNotReady`] — the caller checks
//! the result instead of the head silently not being there yet.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Version};
use tracing::debug;

use super::error::{HttpError, StateError};
use crate::codec::body::BodyReader;
use crate::codec::response_decoder;
use crate::transport::TransportCell;

/// The parsed head of a response: status line fields plus the header
/// set. Immutable once parsed.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: String,
    pub version: Version,
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// The synthetic head of an HTTP/0.9 simple response: no status
    /// line on the wire, so status 200 with no reason and no headers.
    pub(crate) fn simple_09() -> Self {
        Self { status: 200, reason: String::new(), version: Version::HTTP_09, headers: HeaderMap::new() }
    }
}

/// A server response being read off a connection.
///
/// The framing mode and the will-close flag are computed exactly once,
/// while parsing the head, and never change afterwards.
pub struct Response {
    transport: TransportCell,
    closed: Rc<Cell<bool>>,
    head: Option<ResponseHead>,
    body: Option<BodyReader>,
    will_close: bool,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.head.as_ref().map(|h| h.status))
            .field("will_close", &self.will_close)
            .field("closed", &self.closed.get())
            .finish()
    }
}

impl Response {
    pub(crate) fn new(transport: TransportCell) -> Self {
        Self { transport, closed: Rc::new(Cell::new(false)), head: None, body: None, will_close: false }
    }

    /// Parses the status line and header block and fixes the framing
    /// decision. Calling it again on an already-parsed response is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`HttpError::BadStatusLine`] (the transport is closed as part of
    /// failing), [`HttpError::UnknownProtocol`],
    /// [`HttpError::UnknownTransferEncoding`], or a transport error.
    pub fn begin(&mut self) -> Result<(), HttpError> {
        if self.head.is_some() {
            return Ok(());
        }

        let (head, decision) = response_decoder::decode_head(&self.transport)?;
        debug!(status = head.status, ?decision, "response head parsed");

        self.will_close = decision.will_close;
        self.body = Some(BodyReader::new(
            self.transport.clone(),
            decision.framing,
            Rc::clone(&self.closed),
        ));
        self.head = Some(head);
        Ok(())
    }

    fn head_ref(&self) -> Result<&ResponseHead, StateError> {
        self.head.as_ref().ok_or(StateError::ResponseNotReady)
    }

    /// Status code, 100–999.
    pub fn status(&self) -> Result<u16, StateError> {
        self.head_ref().map(|head| head.status)
    }

    /// Reason phrase; empty when the server sent none.
    pub fn reason(&self) -> Result<&str, StateError> {
        self.head_ref().map(|head| head.reason.as_str())
    }

    pub fn version(&self) -> Result<Version, StateError> {
        self.head_ref().map(|head| head.version)
    }

    pub fn headers(&self) -> Result<&HeaderMap, StateError> {
        self.head_ref().map(|head| &head.headers)
    }

    /// Looks a header up by name, case-insensitively. Fails with
    /// [`StateError::ResponseNotReady`] before the head is parsed.
    pub fn header(&self, name: &str) -> Result<Option<&HeaderValue>, StateError> {
        self.head_ref().map(|head| head.headers.get(name))
    }

    /// Whether the server will close the connection after this response.
    pub fn will_close(&self) -> Result<bool, StateError> {
        self.head_ref().map(|_| self.will_close)
    }

    /// Reads body bytes; `None` drains the remainder of the body. See
    /// [`BodyReader::read`] for the per-framing semantics.
    pub fn read(&mut self, amt: Option<usize>) -> Result<Bytes, HttpError> {
        match self.body.as_mut() {
            Some(body) => body.read(amt),
            None => Err(StateError::ResponseNotReady.into()),
        }
    }

    /// Releases the read handle. Idempotent. A detached (will-close)
    /// response also shuts its private transport down.
    pub fn close(&mut self) {
        self.closed.set(true);
        if self.will_close {
            let _ = self.transport.close();
        }
    }

    /// True once the body has been fully consumed or the response was
    /// closed. Only then may the owning connection fetch the next
    /// response.
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Shared completion flag the owning connection tracks.
    pub(crate) fn completion_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.closed)
    }

    pub(crate) fn detaches_connection(&self) -> bool {
        self.will_close
    }
}
