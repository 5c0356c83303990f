//! TCP transport: outbound connect and a listener that hands out accepted
//! line connections.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::connection::LineConnection;
use crate::error::Result;

/// Connect to a remote responder.
pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<LineConnection<TcpStream>> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    let peer = stream.peer_addr()?;
    tracing::info!(%peer, "connected");
    Ok(LineConnection::new(stream, peer.to_string()))
}

/// Listening socket for inbound line connections.
pub struct LineListener {
    listener: TcpListener,
}

impl LineListener {
    /// Bind to an address and start listening.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for one inbound connection.
    pub async fn accept(&self) -> Result<LineConnection<TcpStream>> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        tracing::info!(%peer, "connection accepted");
        Ok(LineConnection::new(stream, peer.to_string()))
    }
}
