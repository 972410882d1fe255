//! Network Module
//!
//! TCP server, peers and the dispatcher.
//!
//! ## Architecture
//! - Single acceptor thread
//! - One thread per peer running its read loop
//! - One dispatcher thread owning the registry and the store
//!
//! ```text
//!  accept ──► Peer ──┐ register / raw bytes / disconnect
//!  accept ──► Peer ──┼──────────────────────────────► Dispatcher ──► KvStore
//!  accept ──► Peer ──┘                          control ──┘
//! ```

mod dispatcher;
mod peer;
mod server;

pub use dispatcher::{
    Control, Dispatcher, DispatcherHandle, PeerEvent, PeerId, PeerInfo, RawMessage, Snapshot,
};
pub use peer::Peer;
pub use server::{Server, ShutdownHandle};
