//! Streaming reader for a response body.
//!
//! One [`BodyReader`] exists per response, created once the framing
//! decision is known. It owns the read side of the shared transport for
//! the duration of the body and releases it on close. Completion is
//! published through a shared closed flag so the owning connection can
//! tell when the transport is free for the next exchange.

use std::cell::Cell;
use std::io::{self, ErrorKind};
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use super::framing::Framing;
use crate::protocol::HttpError;
use crate::transport::TransportCell;

/// Reads a response body under one of the three framing modes.
pub struct BodyReader {
    transport: TransportCell,
    framing: Framing,
    closed: Rc<Cell<bool>>,
}

impl std::fmt::Debug for BodyReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyReader")
            .field("framing", &self.framing)
            .field("closed", &self.closed.get())
            .finish()
    }
}

impl BodyReader {
    pub(crate) fn new(transport: TransportCell, framing: Framing, closed: Rc<Cell<bool>>) -> Self {
        Self { transport, framing, closed }
    }

    /// Read body bytes.
    ///
    /// `None` reads the remainder of the body and closes the reader.
    /// `Some(n)` reads at most `n` bytes with a single underlying read
    /// where the framing allows it; a short return is not an error and
    /// does not mean the body is finished.
    pub fn read(&mut self, amt: Option<usize>) -> Result<Bytes, HttpError> {
        if self.closed.get() {
            return Ok(Bytes::new());
        }

        match self.framing {
            Framing::Chunked(chunk_left) => self.read_chunked(chunk_left, amt),
            Framing::Length(remaining) => self.read_identity(remaining, amt),
            Framing::UntilClose => self.read_until_close(amt),
        }
    }

    /// Release the read handle. Idempotent.
    pub fn close(&mut self) {
        self.closed.set(true);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn read_identity(&mut self, remaining: u64, amt: Option<usize>) -> Result<Bytes, HttpError> {
        match amt {
            None => {
                // identity framing always knows exactly how much is left,
                // so an unbounded read exhausts the body
                let bytes = self.transport.read_exact(usize::try_from(remaining).unwrap_or(usize::MAX))?;
                trace!(len = bytes.len(), "read identity body to completion");
                self.close();
                Ok(bytes)
            }
            Some(requested) => {
                // the remaining count drops by the clipped request even if
                // the underlying read comes back short; a subsequent
                // unbounded read observes exhaustion from the count alone
                let clipped = (requested as u64).min(remaining).try_into().unwrap_or(usize::MAX);
                self.framing = Framing::Length(remaining - clipped as u64);
                Ok(self.transport.read_some(clipped)?)
            }
        }
    }

    fn read_until_close(&mut self, amt: Option<usize>) -> Result<Bytes, HttpError> {
        match amt {
            None => {
                let bytes = self.transport.read_to_end()?;
                trace!(len = bytes.len(), "read close-delimited body to end of stream");
                self.close();
                Ok(bytes)
            }
            Some(requested) => Ok(self.transport.read_some(requested)?),
        }
    }

    /// Chunked transfer decoding, bounded and unbounded.
    ///
    /// Keeps consuming successive chunks until the request is satisfied
    /// or the terminal zero-size chunk is reached; a partially consumed
    /// chunk is remembered across calls.
    fn read_chunked(&mut self, mut chunk_left: Option<u64>, amt: Option<usize>) -> Result<Bytes, HttpError> {
        let mut amt = amt;
        let mut value = BytesMut::new();

        loop {
            let left = match chunk_left {
                Some(left) => left,
                None => {
                    let size = self.read_chunk_size()?;
                    trace!(size, "read chunk header");
                    if size == 0 {
                        break;
                    }
                    chunk_left = Some(size);
                    size
                }
            };

            match amt {
                None => {
                    value.extend_from_slice(&self.read_exact_u64(left)?);
                }
                Some(requested) if (requested as u64) < left => {
                    value.extend_from_slice(&self.transport.read_exact(requested)?);
                    self.framing = Framing::Chunked(Some(left - requested as u64));
                    return Ok(value.freeze());
                }
                Some(requested) if requested as u64 == left => {
                    value.extend_from_slice(&self.transport.read_exact(requested)?);
                    self.transport.read_exact(2)?; // chunk-terminating CRLF
                    self.framing = Framing::Chunked(None);
                    return Ok(value.freeze());
                }
                Some(requested) => {
                    value.extend_from_slice(&self.read_exact_u64(left)?);
                    amt = Some(requested - usize::try_from(left).unwrap_or(usize::MAX));
                }
            }

            // the whole chunk was consumed, discard its CRLF and loop on
            // to the next chunk header
            self.transport.read_exact(2)?;
            chunk_left = None;
            self.framing = Framing::Chunked(None);
        }

        // terminal zero-size chunk: discard trailer lines up to the
        // blank line, then the body is complete
        loop {
            let line = self.transport.read_line().map_err(HttpError::io)?;
            if line.is_empty() || line[..] == b"\r\n"[..] || line[..] == b"\n"[..] {
                break;
            }
            trace!(len = line.len(), "discarded trailer line");
        }

        self.close();
        Ok(value.freeze())
    }

    fn read_exact_u64(&mut self, n: u64) -> Result<Bytes, HttpError> {
        self.transport.read_exact(usize::try_from(n).unwrap_or(usize::MAX))
    }

    /// One `size[;extension] CRLF` chunk header line.
    fn read_chunk_size(&mut self) -> Result<u64, HttpError> {
        let line = self.transport.read_line().map_err(HttpError::io)?;
        let text = String::from_utf8_lossy(&line);
        let text = match text.find(';') {
            Some(pos) => &text[..pos], // strip chunk-extensions
            None => &text[..],
        };
        u64::from_str_radix(text.trim(), 16).map_err(|_| {
            HttpError::io(io::Error::new(
                ErrorKind::InvalidData,
                format!("invalid chunk size line: {text:?}"),
            ))
        })
    }
}
