use thiserror::Error;

/// All errors produced by the TriDH line transport.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("line too long: {size} bytes buffered without a delimiter, maximum {max}")]
    LineTooLong { size: usize, max: usize },

    #[error("line is not valid utf-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("record contains the line delimiter")]
    EmbeddedDelimiter,

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;
