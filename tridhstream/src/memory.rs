//! In-memory loopback transport built on `tokio::io::duplex`.

use tokio::io::DuplexStream;

use crate::connection::LineConnection;

/// Default per-direction buffer for [`pair`].
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Two connected line connections: records sent on one are read on the other.
pub fn pair(capacity: usize) -> (LineConnection<DuplexStream>, LineConnection<DuplexStream>) {
    let (a, b) = tokio::io::duplex(capacity);
    (
        LineConnection::new(a, "memory:b"),
        LineConnection::new(b, "memory:a"),
    )
}
