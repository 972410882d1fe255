//! TCP Server
//!
//! Accepts connections and hands each one to its own peer thread.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::store::KvStore;

use super::dispatcher::{Dispatcher, DispatcherHandle, PeerId};
use super::peer::Peer;

/// TCP server for respkv
pub struct Server {
    config: Config,
    listener: TcpListener,
    local_addr: SocketAddr,

    /// Channels into the dispatcher thread
    dispatcher: DispatcherHandle,
    worker: JoinHandle<KvStore>,

    shutdown: Arc<AtomicBool>,

    /// Live peer threads
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the listener and start the dispatcher thread
    pub fn bind(config: Config) -> Result<Self> {
        config.validate()?;
        let addr = config.resolved_listen_addr();
        let listener = TcpListener::bind(&addr)?;
        let local_addr = listener.local_addr()?;

        let store = KvStore::with_capacity_limit(config.store_capacity());
        let (dispatcher, handle) = Dispatcher::new(store, config.message_queue_capacity);
        let worker = dispatcher.spawn()?;

        tracing::info!("Server listening on {}", local_addr);

        Ok(Self {
            config,
            listener,
            local_addr,
            dispatcher: handle,
            worker,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle to the dispatcher, e.g. for snapshots
    pub fn dispatcher(&self) -> DispatcherHandle {
        self.dispatcher.clone()
    }

    /// Handle that stops `run` from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            dispatcher: self.dispatcher.clone(),
            wake_addr: wake_addr(self.local_addr),
        }
    }

    /// Accept connections until shut down (blocking)
    ///
    /// Returns the dispatcher's final store.
    pub fn run(self) -> Result<KvStore> {
        let mut next_peer_id: PeerId = 1;

        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            match stream {
                Ok(stream) => {
                    self.spawn_peer(next_peer_id, stream);
                    next_peer_id += 1;
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            }
        }

        tracing::info!("Accept loop stopped");
        self.worker
            .join()
            .map_err(|_| KvError::Dispatcher("dispatcher thread panicked".to_string()))
    }

    fn spawn_peer(&self, id: PeerId, stream: TcpStream) {
        if self.active.load(Ordering::SeqCst) >= self.config.max_connections {
            tracing::warn!(
                "Connection limit ({}) reached, rejecting {}",
                self.config.max_connections,
                stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "unknown".to_string())
            );
            return;
        }

        let slot = ConnectionSlot::acquire(Arc::clone(&self.active));
        let dispatcher = self.dispatcher.clone();
        let read_timeout = self.config.read_timeout();

        let spawned = thread::Builder::new()
            .name(format!("peer-{}", id))
            .spawn(move || {
                let _slot = slot;
                let mut peer = match Peer::new(id, stream, dispatcher) {
                    Ok(peer) => peer,
                    Err(e) => {
                        tracing::warn!("Peer {} setup failed: {}", id, e);
                        return;
                    }
                };
                let remote = peer.peer_addr().to_string();
                let result = peer.set_read_timeout(read_timeout).and_then(|()| peer.run());

                match result {
                    Ok(()) => {}
                    Err(KvError::DispatcherClosed) => {
                        tracing::debug!("Peer {} ({}) stopped: dispatcher closed", id, remote)
                    }
                    Err(e) => tracing::warn!("Peer {} ({}) read error: {}", id, remote, e),
                }
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn thread for peer {}: {}", id, e);
        }
    }
}

/// Stops a running server from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    dispatcher: DispatcherHandle,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    /// Stop the dispatcher and the accept loop
    ///
    /// Peers blocked in reads are not interrupted; they exit on their next
    /// forward once the dispatcher is gone.
    pub fn shutdown(&self) {
        if self.flag.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Server shutting down");

        if self.dispatcher.shutdown().is_err() {
            tracing::debug!("Dispatcher already stopped");
        }

        // Unblock the pending accept
        if let Err(e) = TcpStream::connect(self.wake_addr) {
            tracing::debug!("Failed to wake accept loop: {}", e);
        }
    }
}

/// Counts a live peer for as long as it is held
struct ConnectionSlot {
    active: Arc<AtomicUsize>,
}

impl ConnectionSlot {
    fn acquire(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Loopback equivalent of a wildcard bind address
fn wake_addr(local: SocketAddr) -> SocketAddr {
    let ip = match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, local.port())
}
