//! Body framing decision for a parsed response head.
//!
//! Given status code, protocol version and headers, decides how the body
//! is delimited and whether the server will close the connection after
//! this exchange, per RFC 2616 section 4.4. The connection state machine
//! depends on this: it must not start another request until the
//! will-close answer for the previous response is known.

use http::header::{CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, Version};

use crate::protocol::HttpError;

/// How a response body is delimited on the wire.
///
/// Exactly one mode is active per response, fixed at header-parse time.
/// The mutable payload (`Length` remaining, `Chunked` bytes left in the
/// open chunk) is the body reader's progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Identity framing, bounded by Content-Length; the payload is the
    /// number of body bytes still unread.
    Length(u64),
    /// Chunked transfer encoding; the payload is the number of bytes
    /// left in the currently open chunk (`None` when no chunk is open).
    Chunked(Option<u64>),
    /// The body ends when the transport reaches end-of-stream.
    UntilClose,
}

/// Output of the framing decision: the body delimiter plus whether the
/// connection dies with this response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingDecision {
    pub framing: Framing,
    pub will_close: bool,
}

/// Decides framing and connection persistence for a response head.
///
/// # Errors
///
/// Fails with [`HttpError::UnknownTransferEncoding`] when a
/// Transfer-Encoding header is present whose value is not, case
/// insensitively, exactly `chunked`.
pub fn decide(status: u16, version: Version, headers: &HeaderMap) -> Result<FramingDecision, HttpError> {
    let chunked = match headers.get(TRANSFER_ENCODING) {
        Some(value) => {
            let text = String::from_utf8_lossy(value.as_bytes());
            if !text.trim().eq_ignore_ascii_case("chunked") {
                return Err(HttpError::unknown_transfer_encoding(text));
            }
            true
        }
        None => false,
    };

    let mut will_close = will_close(version, headers);

    // RFC 2616 S4.4 #3: Content-Length is ignored when chunked. A
    // malformed value means "length unknown", not an error.
    let mut length = if chunked {
        None
    } else {
        headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|text| text.trim().parse::<u64>().ok())
    };

    // 204 No Content, 304 Not Modified and 1xx bodies have a fixed
    // length of zero no matter what the headers claim.
    if status == 204 || status == 304 || (100..200).contains(&status) {
        length = Some(0);
    }

    // An open connection with no declared length and no chunking can
    // only be framed by end-of-stream, which requires closing.
    if !will_close && !chunked && length.is_none() {
        will_close = true;
    }

    let framing = match length {
        Some(0) => Framing::Length(0),
        _ if chunked => Framing::Chunked(None),
        Some(n) => Framing::Length(n),
        None => Framing::UntilClose,
    };

    Ok(FramingDecision { framing, will_close })
}

/// The version-sensitive persistence rule.
///
/// A `Connection` value containing `close` always closes. Otherwise a
/// pre-1.1 response stays open only when a `Keep-Alive` header is
/// present; an 1.1 response stays open by default.
fn will_close(version: Version, headers: &HeaderMap) -> bool {
    let keep_alive_absent = !headers.contains_key("keep-alive");
    match headers.get(CONNECTION) {
        Some(value) => {
            let text = String::from_utf8_lossy(value.as_bytes()).to_ascii_lowercase();
            text.contains("close") || (version != Version::HTTP_11 && keep_alive_absent)
        }
        None => version != Version::HTTP_11 && keep_alive_absent,
    }
}
