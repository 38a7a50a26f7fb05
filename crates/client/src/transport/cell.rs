//! Shared buffered handle over a [`Transport`].
//!
//! A connection and the response it is currently producing both need the
//! same stream: the connection writes the next request while the caller
//! drains the previous body. The cell is a `Rc<RefCell<_>>` because the
//! whole client is single-threaded blocking I/O; there is no locking to
//! get right, only ownership.
//!
//! The read buffer lives here rather than in the response so that any
//! lookahead buffered past one body is still available to the next
//! response on a reused connection.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, ErrorKind};
use std::rc::Rc;

use bytes::{Bytes, BytesMut};

use super::Transport;
use crate::protocol::HttpError;

/// Per-read chunk size for line and exact reads.
const READ_CHUNK: usize = 8 * 1024;

/// A cloneable shared handle owning the transport and its read buffer.
#[derive(Clone)]
pub struct TransportCell {
    inner: Rc<RefCell<Inner>>,
}

struct Inner {
    stream: Option<Box<dyn Transport>>,
    rbuf: BytesMut,
}

impl fmt::Debug for TransportCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TransportCell")
            .field("open", &inner.stream.is_some())
            .field("buffered", &inner.rbuf.len())
            .finish()
    }
}

impl TransportCell {
    pub fn new(stream: Box<dyn Transport>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner { stream: Some(stream), rbuf: BytesMut::new() })),
        }
    }

    /// Write the whole buffer to the underlying stream.
    pub fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        let mut inner = self.inner.borrow_mut();
        match inner.stream.as_mut() {
            Some(stream) => stream.write_all(buf),
            None => Err(io::Error::new(ErrorKind::NotConnected, "transport is closed")),
        }
    }

    /// Read one line, including its `\n` terminator.
    ///
    /// At end-of-stream the remaining buffered bytes are returned as-is,
    /// so an empty result means the stream is exhausted.
    pub fn read_line(&self) -> io::Result<Bytes> {
        let mut inner = self.inner.borrow_mut();
        loop {
            if let Some(pos) = inner.rbuf.iter().position(|b| *b == b'\n') {
                return Ok(inner.rbuf.split_to(pos + 1).freeze());
            }
            if inner.fill()? == 0 {
                let len = inner.rbuf.len();
                return Ok(inner.rbuf.split_to(len).freeze());
            }
        }
    }

    /// Reliable read: loop until exactly `n` bytes are
    /// collected, failing with [`HttpError::IncompleteRead`] (carrying
    /// whatever was collected) if the stream ends first.
    pub fn read_exact(&self, n: usize) -> Result<Bytes, HttpError> {
        let mut inner = self.inner.borrow_mut();
        while inner.rbuf.len() < n {
            if inner.fill().map_err(HttpError::io)? == 0 {
                let len = inner.rbuf.len();
                return Err(HttpError::incomplete_read(inner.rbuf.split_to(len).freeze()));
            }
        }
        Ok(inner.rbuf.split_to(n).freeze())
    }

    /// A single underlying read of up to `max` bytes. May legitimately
    /// return fewer bytes than requested; callers loop if they need more.
    pub fn read_some(&self, max: usize) -> io::Result<Bytes> {
        if max == 0 {
            return Ok(Bytes::new());
        }

        let mut inner = self.inner.borrow_mut();
        if !inner.rbuf.is_empty() {
            let n = inner.rbuf.len().min(max);
            return Ok(inner.rbuf.split_to(n).freeze());
        }

        let Some(stream) = inner.stream.as_mut() else {
            return Ok(Bytes::new());
        };
        let mut buf = vec![0u8; max.min(READ_CHUNK)];
        let n = stream.read(&mut buf)?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    /// Read until end-of-stream.
    pub fn read_to_end(&self) -> io::Result<Bytes> {
        let mut inner = self.inner.borrow_mut();
        let mut out = inner.rbuf.split().to_vec();
        if let Some(stream) = inner.stream.as_mut() {
            stream.read_to_end(&mut out)?;
        }
        Ok(Bytes::from(out))
    }

    /// Push bytes back to the front of the read buffer.
    pub fn unread(&self, bytes: &[u8]) {
        let mut inner = self.inner.borrow_mut();
        let mut rbuf = BytesMut::with_capacity(bytes.len() + inner.rbuf.len());
        rbuf.extend_from_slice(bytes);
        rbuf.extend_from_slice(&inner.rbuf);
        inner.rbuf = rbuf;
    }

    /// Shut the stream down and drop it. Idempotent.
    pub fn close(&self) -> io::Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.rbuf.clear();
        match inner.stream.take() {
            Some(mut stream) => stream.close(),
            None => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.borrow().stream.is_some()
    }
}

impl Inner {
    /// Pull one chunk from the stream into the read buffer, returning the
    /// number of bytes obtained (0 at end-of-stream or when closed).
    fn fill(&mut self) -> io::Result<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };
        let mut buf = [0u8; READ_CHUNK];
        let n = stream.read(&mut buf)?;
        self.rbuf.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}
