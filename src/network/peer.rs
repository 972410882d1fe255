//! Peer
//!
//! Owns one client connection and its read loop.

use std::io::{BufReader, ErrorKind};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::{KvError, Result};
use crate::protocol::read_frame;

use super::dispatcher::{DispatcherHandle, PeerId, PeerInfo};

/// Server-side representative of a single connection
///
/// Purely a producer: decodes frames and forwards their raw bytes, never
/// touches the store. The socket is shut down when the Peer is dropped, so
/// every exit path releases it.
pub struct Peer {
    id: PeerId,

    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// Channels into the dispatcher
    dispatcher: DispatcherHandle,

    /// Peer address for logging
    peer_addr: String,
}

impl Peer {
    /// Wrap an accepted stream
    pub fn new(id: PeerId, stream: TcpStream, dispatcher: DispatcherHandle) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        Ok(Self {
            id,
            reader: BufReader::new(stream),
            dispatcher,
            peer_addr,
        })
    }

    /// Configure the read timeout, `None` blocks indefinitely
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Register, read until the connection ends, deregister
    ///
    /// Returns the error that ended the loop, if any. Clean disconnects,
    /// resets and read timeouts are not errors.
    pub fn run(mut self) -> Result<()> {
        self.dispatcher
            .register(PeerInfo::new(self.id, self.peer_addr.clone()))?;
        tracing::debug!("Peer {} connected from {}", self.id, self.peer_addr);

        let result = self.read_loop();

        if self.dispatcher.deregister(self.id).is_err() {
            tracing::debug!("Dispatcher closed before peer {} deregistered", self.id);
        }
        result
    }

    fn read_loop(&mut self) -> Result<()> {
        loop {
            let raw = match read_frame(&mut self.reader) {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(KvError::Io(ref e))
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!("Connection from {} closed: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(KvError::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    // Windows reports TimedOut instead of WouldBlock
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            tracing::trace!("Peer {} framed {} bytes", self.id, raw.len());
            self.dispatcher.forward(self.id, raw)?;
        }
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        match self.reader.get_ref().shutdown(Shutdown::Both) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotConnected => {}
            Err(e) => tracing::debug!("Shutdown of {} failed: {}", self.peer_addr, e),
        }
        tracing::debug!("Peer {} released", self.id);
    }
}
