//! `\r\n` record framing.
//!
//! ```text
//! +---------- variable ----------+------+
//! | utf-8 text (no \r\n inside)  | \r\n |
//! +------------------------------+------+
//! ```

use std::fmt::Display;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, StreamError};

/// Record delimiter.
pub const DELIMITER: &[u8; 2] = b"\r\n";

/// Largest record accepted by the decoder, delimiter excluded.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Incremental decoder and encoder for delimited records.
#[derive(Debug)]
pub struct LineCodec {
    buffer: BytesMut,
    max_len: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
            max_len,
        }
    }

    /// Append raw bytes received from the stream.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Mutable access to the receive buffer, for `read_buf`-style reads.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Number of buffered bytes not yet returned as a record.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete record, if any.
    pub fn decode(&mut self) -> Result<Option<String>> {
        match find_delimiter(&self.buffer) {
            Some(pos) => {
                if pos > self.max_len {
                    return Err(StreamError::LineTooLong {
                        size: pos,
                        max: self.max_len,
                    });
                }
                let line = self.buffer.split_to(pos);
                self.buffer.advance(DELIMITER.len());
                Ok(Some(String::from_utf8(line.to_vec())?))
            }
            None if self.buffer.len() > self.max_len + 1 => Err(StreamError::LineTooLong {
                size: self.buffer.len(),
                max: self.max_len,
            }),
            None => Ok(None),
        }
    }

    /// Encode one record, delimiter included.
    pub fn encode<T: Display>(value: T) -> Result<Bytes> {
        let text = value.to_string();
        if find_delimiter(text.as_bytes()).is_some() {
            return Err(StreamError::EmbeddedDelimiter);
        }
        let mut out = BytesMut::with_capacity(text.len() + DELIMITER.len());
        out.put_slice(text.as_bytes());
        out.put_slice(DELIMITER);
        Ok(out.freeze())
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn find_delimiter(data: &[u8]) -> Option<usize> {
    data.windows(DELIMITER.len()).position(|w| w == DELIMITER)
}
