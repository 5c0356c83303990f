//! TriDH line transport.
//!
//! Every protocol value travels as one text record terminated by `\r\n`.
//! A stream closed by the peer reads as `None`, which is distinct from an
//! empty record.

pub mod connection;
pub mod error;
pub mod line;
pub mod memory;
pub mod tcp;

// Re-export key public types at crate root.
pub use connection::{ConnectionState, LineConnection};
pub use error::{Result, StreamError};
pub use line::{LineCodec, DELIMITER, MAX_LINE_LEN};
