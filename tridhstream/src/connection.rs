//! Line connection over any reliable byte stream.
//!
//! Open -> Closed. Closing shuts the write half down so the peer observes
//! end-of-stream; every later operation fails with `ConnectionClosed`.

use std::fmt::{self, Display};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, StreamError};
use crate::line::LineCodec;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Records can be sent and received.
    Open,
    /// The connection has been released.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// A `\r\n`-delimited record connection.
pub struct LineConnection<S> {
    stream: S,
    codec: LineCodec,
    state: ConnectionState,
    peer: String,
    bytes_sent: u64,
    bytes_received: u64,
}

impl<S> LineConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already connected stream.
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream,
            codec: LineCodec::new(),
            state: ConnectionState::Open,
            peer: peer.into(),
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream, including
    /// when an unterminated partial record is left in the buffer.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        self.ensure_open()?;
        loop {
            if let Some(line) = self.codec.decode()? {
                tracing::trace!(peer = %self.peer, len = line.len(), "record received");
                return Ok(Some(line));
            }
            let n = self.stream.read_buf(self.codec.buffer_mut()).await?;
            if n == 0 {
                tracing::debug!(
                    peer = %self.peer,
                    leftover = self.codec.buffered(),
                    "peer closed the stream"
                );
                return Ok(None);
            }
            self.bytes_received += n as u64;
        }
    }

    /// Send one record, appending the delimiter.
    pub async fn send_line<T: Display>(&mut self, value: T) -> Result<()> {
        self.ensure_open()?;
        let bytes = LineCodec::encode(value)?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.bytes_sent += bytes.len() as u64;
        tracing::trace!(peer = %self.peer, len = bytes.len(), "record sent");
        Ok(())
    }

    /// Release the connection. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        match self.stream.shutdown().await {
            Ok(()) => Ok(()),
            // The peer may already be gone; the connection is released either way.
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closed => Err(StreamError::ConnectionClosed),
        }
    }
}

impl<S> LineConnection<S> {
    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Peer label (socket address for TCP, a fixed name for in-memory pipes).
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
}
