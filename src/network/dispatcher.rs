//! Dispatcher
//!
//! The single serialization point for all mutable server state.
//!
//! ## Responsibilities
//! - Own the peer registry and the store (nothing else touches them)
//! - Handle exactly one event per iteration from three channels:
//!   control, peer lifecycle, raw messages
//! - Parse raw messages and apply them to the store
//!
//! ## Ordering
//! Each peer forwards from its own thread over a FIFO channel, so per-peer
//! order is preserved. Order across peers is arrival order here.

use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use crossbeam::select;

use crate::error::{KvError, Result};
use crate::protocol::parse_command;
use crate::store::KvStore;

/// Identifier assigned to each accepted connection
pub type PeerId = u64;

/// Registry record for one live peer
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub id: PeerId,

    /// Remote address for logging
    pub addr: String,

    pub connected_at: Instant,
}

impl PeerInfo {
    pub fn new(id: PeerId, addr: impl Into<String>) -> Self {
        Self {
            id,
            addr: addr.into(),
            connected_at: Instant::now(),
        }
    }
}

/// Peer lifecycle events
#[derive(Debug)]
pub enum PeerEvent {
    Registered(PeerInfo),
    Disconnected(PeerId),
}

/// Raw bytes of one frame, as read by a peer
#[derive(Debug)]
pub struct RawMessage {
    pub peer: PeerId,
    pub bytes: Vec<u8>,
}

/// Control events
#[derive(Debug)]
pub enum Control {
    /// Stop immediately without draining other channels
    Shutdown,

    /// Reply with a copy of the current state
    Snapshot(Sender<Snapshot>),
}

/// Point-in-time copy of dispatcher state
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub entries: HashMap<String, String>,

    /// Number of registered peers
    pub peers: usize,

    /// Messages applied to the store
    pub applied: u64,

    /// Messages that failed to parse or apply
    pub rejected: u64,
}

// =============================================================================
// Handle
// =============================================================================

/// Sending side of the dispatcher's channels
///
/// Cheap to clone; every peer holds one.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    control: Sender<Control>,
    peers: Sender<PeerEvent>,
    messages: Sender<RawMessage>,
}

impl DispatcherHandle {
    /// Register a peer
    ///
    /// Blocks until the dispatcher has taken the event.
    pub fn register(&self, info: PeerInfo) -> Result<()> {
        self.peers
            .send(PeerEvent::Registered(info))
            .map_err(|_| KvError::DispatcherClosed)
    }

    /// Remove a peer from the registry
    pub fn deregister(&self, id: PeerId) -> Result<()> {
        self.peers
            .send(PeerEvent::Disconnected(id))
            .map_err(|_| KvError::DispatcherClosed)
    }

    /// Hand one frame's raw bytes to the dispatcher
    pub fn forward(&self, peer: PeerId, bytes: Vec<u8>) -> Result<()> {
        self.messages
            .send(RawMessage { peer, bytes })
            .map_err(|_| KvError::DispatcherClosed)
    }

    /// Ask the dispatcher to stop
    pub fn shutdown(&self) -> Result<()> {
        self.control
            .send(Control::Shutdown)
            .map_err(|_| KvError::DispatcherClosed)
    }

    /// Fetch a snapshot of the current state
    pub fn snapshot(&self) -> Result<Snapshot> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.control
            .send(Control::Snapshot(reply_tx))
            .map_err(|_| KvError::DispatcherClosed)?;
        reply_rx.recv().map_err(|_| KvError::DispatcherClosed)
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// The dispatcher actor, run on its own thread
pub struct Dispatcher {
    inbox: Inbox,
    state: State,
}

struct Inbox {
    control: Receiver<Control>,
    peers: Receiver<PeerEvent>,
    messages: Receiver<RawMessage>,
}

struct State {
    store: KvStore,
    registry: HashMap<PeerId, PeerInfo>,
    applied: u64,
    rejected: u64,
}

impl Dispatcher {
    /// Create a dispatcher owning `store`, plus the handle to reach it
    ///
    /// `message_queue_capacity` of 0 makes message forwarding a rendezvous.
    /// Peer registration is always a rendezvous.
    pub fn new(store: KvStore, message_queue_capacity: usize) -> (Self, DispatcherHandle) {
        let (control_tx, control_rx) = channel::unbounded();
        let (peers_tx, peers_rx) = channel::bounded(0);
        let (messages_tx, messages_rx) = channel::bounded(message_queue_capacity);

        let dispatcher = Self {
            inbox: Inbox {
                control: control_rx,
                peers: peers_rx,
                messages: messages_rx,
            },
            state: State {
                store,
                registry: HashMap::new(),
                applied: 0,
                rejected: 0,
            },
        };
        let handle = DispatcherHandle {
            control: control_tx,
            peers: peers_tx,
            messages: messages_tx,
        };

        (dispatcher, handle)
    }

    /// Run on a dedicated thread
    pub fn spawn(self) -> Result<JoinHandle<KvStore>> {
        let handle = thread::Builder::new()
            .name("dispatcher".to_string())
            .spawn(move || self.run())?;
        Ok(handle)
    }

    /// Process events until shutdown, then hand back the store
    ///
    /// Also stops once every sender of any channel is gone.
    pub fn run(self) -> KvStore {
        let Dispatcher { inbox, mut state } = self;
        tracing::info!(
            "Dispatcher started (store capacity {:?})",
            state.store.capacity()
        );

        loop {
            // Pending control events win over queued messages
            match inbox.control.try_recv() {
                Ok(event) => {
                    if state.handle_control(event) == Flow::Stop {
                        break;
                    }
                    continue;
                }
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            select! {
                recv(inbox.control) -> event => match event {
                    Ok(event) => {
                        if state.handle_control(event) == Flow::Stop {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(inbox.peers) -> event => match event {
                    Ok(event) => state.handle_peer_event(event),
                    Err(_) => break,
                },
                recv(inbox.messages) -> message => match message {
                    Ok(message) => state.handle_raw_message(message),
                    Err(_) => break,
                },
            }
        }

        tracing::info!(
            "Dispatcher stopped: {} keys, {} applied, {} rejected",
            state.store.len(),
            state.applied,
            state.rejected
        );
        state.store
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

impl State {
    fn handle_control(&mut self, event: Control) -> Flow {
        match event {
            Control::Snapshot(reply) => {
                // Requester may have given up
                let _ = reply.send(self.snapshot());
                Flow::Continue
            }
            Control::Shutdown => {
                tracing::info!("Dispatcher received shutdown");
                Flow::Stop
            }
        }
    }

    fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Registered(info) => {
                tracing::debug!("Peer {} registered ({})", info.id, info.addr);
                self.registry.insert(info.id, info);
            }
            PeerEvent::Disconnected(id) => match self.registry.remove(&id) {
                Some(info) => tracing::debug!(
                    "Peer {} removed ({}, connected for {:?})",
                    id,
                    info.addr,
                    info.connected_at.elapsed()
                ),
                None => tracing::debug!("Disconnect for unknown peer {}", id),
            },
        }
    }

    /// Parse and apply one message; failures are logged, never fatal
    fn handle_raw_message(&mut self, message: RawMessage) {
        let store = &mut self.store;
        let result = parse_command(&message.bytes).and_then(|command| {
            tracing::trace!("Peer {} applying {:?}", message.peer, command);
            store.apply(command)
        });

        match result {
            Ok(()) => self.applied += 1,
            Err(e) => {
                self.rejected += 1;
                tracing::warn!("Raw message error from peer {}: {}", message.peer, e);
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            entries: self.store.to_map(),
            peers: self.registry.len(),
            applied: self.applied,
            rejected: self.rejected,
        }
    }
}
