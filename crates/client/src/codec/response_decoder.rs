//! Decodes a response head off the transport: status line, header block,
//! framing decision.
//!
//! The status line grammar is deliberately forgiving, matching what real
//! servers have shipped since HTTP/1.0: a missing reason phrase is fine,
//! and a line that cannot be split into version and status at all is
//! treated as an HTTP/0.9 simple response whose body starts with that
//! very line. Only a line that claims to be HTTP and then fails to parse
//! is a hard error — and since the byte stream is unreliable to continue
//! reading after that, the transport is closed as part of failing.

use bytes::BytesMut;
use http::{HeaderMap, HeaderName, HeaderValue, Version};
use httparse::Status;
use std::io::{self, ErrorKind};
use tracing::trace;

use super::framing::{self, FramingDecision};
use crate::protocol::{HttpError, ResponseHead};
use crate::transport::TransportCell;

/// Maximum number of headers accepted in a response head.
const MAX_HEADER_NUM: usize = 64;

/// Reads and parses one response head, returning it together with the
/// framing decision for the body that follows.
pub(crate) fn decode_head(transport: &TransportCell) -> Result<(ResponseHead, FramingDecision), HttpError> {
    let line = transport.read_line().map_err(HttpError::io)?;
    let raw = String::from_utf8_lossy(&line).into_owned();
    trace!(line = %raw.trim_end(), "read status line");

    let fields = split_fields(raw.trim(), 3);
    let (version_text, status_text, reason) = match fields[..] {
        [version, status, reason] => (version, status, reason),
        [version, status] => (version, status, ""),
        // not even two fields: an HTTP/0.9 simple response, the "status
        // line" is actually the first bytes of the body
        _ => {
            transport.unread(&line);
            let head = ResponseHead::simple_09();
            let decision = framing::decide(head.status, head.version, &head.headers)?;
            return Ok((head, decision));
        }
    };

    if !version_text.starts_with("HTTP/") {
        let _ = transport.close();
        return Err(HttpError::bad_status_line(&raw));
    }

    let status = match status_text.parse::<u16>() {
        Ok(status) if (100..=999).contains(&status) => status,
        _ => {
            let _ = transport.close();
            return Err(HttpError::bad_status_line(&raw));
        }
    };

    let version = match version_text {
        "HTTP/1.0" => Version::HTTP_10,
        // HTTP/1.x with x >= 1 all use the 1.1 rules
        v if v.starts_with("HTTP/1.") => Version::HTTP_11,
        "HTTP/0.9" => Version::HTTP_09,
        v => return Err(HttpError::unknown_protocol(v)),
    };

    // an explicit HTTP/0.9 status line carries no header block; the rest
    // of the stream is the body
    let headers = if version == Version::HTTP_09 { HeaderMap::new() } else { read_header_block(transport)? };

    let head = ResponseHead { status, reason: reason.trim().to_string(), version, headers };
    let decision = framing::decide(head.status, head.version, &head.headers)?;
    trace!(status, ?version, ?decision, "decoded response head");
    Ok((head, decision))
}

/// Reads the CRLF-terminated header block and parses it into an ordered,
/// case-insensitive [`HeaderMap`].
fn read_header_block(transport: &TransportCell) -> Result<HeaderMap, HttpError> {
    let mut block = BytesMut::new();
    loop {
        let line = transport.read_line().map_err(HttpError::io)?;
        if line.is_empty() {
            // premature end of stream; close the block so whatever was
            // received still parses
            block.extend_from_slice(b"\r\n");
            break;
        }
        block.extend_from_slice(&line);
        if line[..] == b"\r\n"[..] || line[..] == b"\n"[..] {
            break;
        }
    }

    let mut parsed = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let headers = match httparse::parse_headers(&block, &mut parsed) {
        Ok(Status::Complete((_, headers))) => headers,
        Ok(Status::Partial) => {
            return Err(HttpError::io(io::Error::new(ErrorKind::UnexpectedEof, "truncated header block")));
        }
        Err(e) => {
            return Err(HttpError::io(io::Error::new(ErrorKind::InvalidData, e.to_string())));
        }
    };

    let mut map = HeaderMap::with_capacity(headers.len());
    for header in headers {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|e| HttpError::io(io::Error::new(ErrorKind::InvalidData, e.to_string())))?;
        let value = HeaderValue::from_bytes(header.value)
            .map_err(|e| HttpError::io(io::Error::new(ErrorKind::InvalidData, e.to_string())))?;
        map.append(name, value);
    }
    Ok(map)
}

/// Splits on runs of ASCII whitespace into at most `max` fields, the
/// last field keeping its internal whitespace.
fn split_fields(line: &str, max: usize) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut rest = line.trim_start();
    while fields.len() + 1 < max {
        let Some(pos) = rest.find(|c: char| c.is_ascii_whitespace()) else {
            break;
        };
        fields.push(&rest[..pos]);
        rest = rest[pos..].trim_start();
    }
    if !rest.is_empty() {
        fields.push(rest);
    }
    fields
}
