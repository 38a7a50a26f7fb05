use std::io;
use thiserror::Error;

/// Errors from loading or rendering client capabilities.
#[derive(Debug, Error)]
pub enum CapsError {
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("invalid capability declaration: {line:?}")]
    InvalidCapability { line: String },

    #[error("capability does not form a valid header value: {source}")]
    Header {
        #[from]
        source: http::header::InvalidHeaderValue,
    },
}

impl CapsError {
    pub fn invalid_capability<S: ToString>(line: S) -> Self {
        Self::InvalidCapability { line: line.to_string() }
    }
}
