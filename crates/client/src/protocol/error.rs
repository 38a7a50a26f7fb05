use bytes::Bytes;
use std::io;
use std::io::ErrorKind;
use thiserror::Error;

/// Top level error type for the client transport.
///
/// Wire-level failures carry the underlying [`io::Error`]; pure
/// state-machine misuse is collected in [`StateError`] and never tears
/// anything down — the caller can recover by calling in the right order.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: io::Error,
    },

    #[error("not connected and auto reconnect is disabled")]
    NotConnected,

    #[error("invalid url: nonnumeric port: {port:?}")]
    InvalidUrl { port: String },

    #[error("illegal configuration option: {option:?}")]
    IllegalConfiguration { option: String },

    #[error("unimplemented transport mode: {mode:?}")]
    UnimplementedMode { mode: String },

    #[error("incomplete read: got {} bytes before end of stream", partial.len())]
    IncompleteRead { partial: Bytes },

    #[error("improper connection state: {source}")]
    State {
        #[from]
        source: StateError,
    },

    #[error("bad status line: {line:?}")]
    BadStatusLine { line: String },

    #[error("unknown protocol version: {version:?}")]
    UnknownProtocol { version: String },

    #[error("unknown transfer encoding: {value:?}")]
    UnknownTransferEncoding { value: String },
}

/// Request/response ordering violations.
///
/// These are caller bugs, not wire failures: raising one has no side
/// effect on the connection or any pending response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("cannot send request")]
    CannotSendRequest,

    #[error("cannot send header")]
    CannotSendHeader,

    #[error("response not ready")]
    ResponseNotReady,
}

impl HttpError {
    pub fn invalid_url<S: ToString>(port: S) -> Self {
        Self::InvalidUrl { port: port.to_string() }
    }

    pub fn illegal_configuration<S: ToString>(option: S) -> Self {
        Self::IllegalConfiguration { option: option.to_string() }
    }

    pub fn unimplemented_mode<S: ToString>(mode: S) -> Self {
        Self::UnimplementedMode { mode: mode.to_string() }
    }

    pub fn incomplete_read(partial: Bytes) -> Self {
        Self::IncompleteRead { partial }
    }

    pub fn bad_status_line<S: ToString>(line: S) -> Self {
        Self::BadStatusLine { line: line.to_string() }
    }

    pub fn unknown_protocol<S: ToString>(version: S) -> Self {
        Self::UnknownProtocol { version: version.to_string() }
    }

    pub fn unknown_transfer_encoding<S: ToString>(value: S) -> Self {
        Self::UnknownTransferEncoding { value: value.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Transport { source: e.into() }
    }

    /// True for the broken-pipe/connection-reset family of transport
    /// failures, the only errors the connection will transparently retry.
    pub fn is_connection_dropped(&self) -> bool {
        match self {
            Self::Transport { source } => {
                matches!(source.kind(), ErrorKind::BrokenPipe | ErrorKind::ConnectionReset)
            }
            _ => false,
        }
    }
}
