//! Tests for Server
//!
//! These tests verify:
//! - Concurrent clients with distinct keys
//! - Last-processed-wins for a shared key
//! - Isolation of a misbehaving peer
//! - Registry cleanup, connection and capacity limits
//! - Shutdown returns the final store

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use respkv::network::{DispatcherHandle, ShutdownHandle, Snapshot};
use respkv::{Client, Config, KvStore, Server};

// =============================================================================
// Helper Functions
// =============================================================================

struct Running {
    addr: SocketAddr,
    dispatcher: DispatcherHandle,
    shutdown: ShutdownHandle,
    thread: thread::JoinHandle<respkv::Result<KvStore>>,
}

impl Running {
    fn client(&self) -> Client {
        Client::new(self.addr.to_string())
    }

    fn stop(self) -> KvStore {
        self.shutdown.shutdown();
        self.thread.join().unwrap().unwrap()
    }
}

fn start_server(config: Config) -> Running {
    let server = Server::bind(config).unwrap();
    let running_addr = server.local_addr();
    let dispatcher = server.dispatcher();
    let shutdown = server.shutdown_handle();
    let thread = thread::spawn(move || server.run());

    Running {
        addr: running_addr,
        dispatcher,
        shutdown,
        thread,
    }
}

fn local_config() -> Config {
    Config::builder().listen_addr("127.0.0.1:0").build()
}

fn wait_for(handle: &DispatcherHandle, what: &str, done: impl Fn(&Snapshot) -> bool) -> Snapshot {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = handle.snapshot().unwrap();
        if done(&snapshot) {
            return snapshot;
        }
        if Instant::now() > deadline {
            panic!("Timed out waiting for {}: {:?}", what, snapshot);
        }
        thread::sleep(Duration::from_millis(10));
    }
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_clients_distinct_keys() {
    let server = start_server(local_config());
    let n = 10;

    let clients: Vec<_> = (0..n)
        .map(|i| {
            let client = server.client();
            thread::spawn(move || {
                client
                    .set(&format!("foo_{}", i), &format!("bar_{}", i))
                    .unwrap()
            })
        })
        .collect();
    for client in clients {
        client.join().unwrap();
    }

    let snapshot = wait_for(&server.dispatcher, "all sets", |s| s.applied == n);
    assert_eq!(snapshot.entries.len(), n as usize);
    for i in 0..n {
        assert_eq!(
            snapshot.entries.get(&format!("foo_{}", i)),
            Some(&format!("bar_{}", i))
        );
    }

    let store = server.stop();
    assert_eq!(store.len(), n as usize);
}

#[test]
fn test_buffered_queue_concurrent_connections() {
    let server = start_server(
        Config::builder()
            .listen_addr("127.0.0.1:0")
            .message_queue_capacity(8)
            .build(),
    );
    let n: u64 = 10;
    let per_client: u64 = 20;

    let clients: Vec<_> = (0..n)
        .map(|i| {
            let addr = server.addr;
            thread::spawn(move || {
                let mut stream = TcpStream::connect(addr).unwrap();
                for j in 0..per_client {
                    let frame = respkv::Command::Set {
                        key: format!("client_{}", i),
                        val: j.to_string(),
                    }
                    .encode();
                    stream.write_all(&frame).unwrap();
                }
            })
        })
        .collect();
    for client in clients {
        client.join().unwrap();
    }

    let snapshot = wait_for(&server.dispatcher, "all sets and disconnects", |s| {
        s.applied == n * per_client && s.peers == 0
    });
    let last = (per_client - 1).to_string();
    for i in 0..n {
        assert_eq!(snapshot.entries.get(&format!("client_{}", i)), Some(&last));
    }

    let store = server.stop();
    assert_eq!(store.len(), n as usize);
}

#[test]
fn test_same_key_from_two_peers_last_processed_wins() {
    let server = start_server(local_config());

    server.client().set("shared", "first").unwrap();
    wait_for(&server.dispatcher, "first set", |s| s.applied == 1);

    server.client().set("shared", "second").unwrap();
    let snapshot = wait_for(&server.dispatcher, "second set", |s| s.applied == 2);

    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.entries.get("shared").map(String::as_str), Some("second"));
    server.stop();
}

#[test]
fn test_malformed_peer_does_not_block_others() {
    let server = start_server(local_config());

    let mut peer_a = TcpStream::connect(server.addr).unwrap();
    wait_for(&server.dispatcher, "peer A registered", |s| s.peers == 1);

    // Truncated frame, then hang up: A's read loop fails
    peer_a.write_all(b"*3\r\n$3\r\nSET\r\n$5\r\nmyk").unwrap();
    drop(peer_a);
    wait_for(&server.dispatcher, "peer A removed", |s| s.peers == 0);

    let mut peer_b = TcpStream::connect(server.addr).unwrap();
    peer_b
        .write_all(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n")
        .unwrap();

    let snapshot = wait_for(&server.dispatcher, "peer B's set", |s| s.applied == 1);
    assert_eq!(snapshot.entries.get("foo").map(String::as_str), Some("bar"));
    assert_eq!(snapshot.entries.len(), 1);

    drop(peer_b);
    server.stop();
}

#[test]
fn test_unknown_command_is_dropped_and_peer_continues() {
    let server = start_server(local_config());

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.write_all(b"*1\r\n$4\r\nPING\r\n").unwrap();
    stream
        .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n")
        .unwrap();

    // Framing was valid, so the same connection keeps delivering
    let snapshot = wait_for(&server.dispatcher, "set after ping", |s| s.applied == 1);
    assert_eq!(snapshot.rejected, 1);
    assert_eq!(snapshot.entries.get("k").map(String::as_str), Some("v"));

    drop(stream);
    server.stop();
}

// =============================================================================
// Registry and Limit Tests
// =============================================================================

#[test]
fn test_registry_tracks_live_connections() {
    let server = start_server(local_config());

    let streams: Vec<_> = (0..3)
        .map(|_| TcpStream::connect(server.addr).unwrap())
        .collect();
    wait_for(&server.dispatcher, "three peers", |s| s.peers == 3);

    drop(streams);
    wait_for(&server.dispatcher, "no peers", |s| s.peers == 0);

    server.stop();
}

#[test]
fn test_connection_limit_rejects_extra_peers() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_connections(1)
        .build();
    let server = start_server(config);

    let mut first = TcpStream::connect(server.addr).unwrap();
    wait_for(&server.dispatcher, "first peer", |s| s.peers == 1);

    let mut second = TcpStream::connect(server.addr).unwrap();
    second
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut buf = [0u8; 8];
    match second.read(&mut buf) {
        Ok(0) => {}
        Err(e) if !matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
        other => panic!("Expected rejected connection, got {:?}", other),
    }

    first
        .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n")
        .unwrap();
    let snapshot = wait_for(&server.dispatcher, "set on first peer", |s| s.applied == 1);
    assert_eq!(snapshot.peers, 1);

    drop(first);
    server.stop();
}

#[test]
fn test_bind_rejects_invalid_config() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_connections(0)
        .build();
    assert!(matches!(Server::bind(config), Err(respkv::KvError::Config(_))));
}

#[test]
fn test_store_capacity_limit() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_entries(2)
        .build();
    let server = start_server(config);
    let client = server.client();

    // Separate connections race each other, so wait for each one
    for (seen, key) in ["a", "b", "c"].into_iter().enumerate() {
        client.set(key, "v").unwrap();
        wait_for(&server.dispatcher, key, |s| s.applied + s.rejected == seen as u64 + 1);
    }
    let snapshot = server.dispatcher.snapshot().unwrap();
    assert_eq!(snapshot.rejected, 1);
    assert!(!snapshot.entries.contains_key("c"));

    client.set("a", "updated").unwrap();
    let snapshot = wait_for(&server.dispatcher, "overwrite", |s| s.applied + s.rejected == 4);

    assert_eq!(snapshot.entries.len(), 2);
    assert_eq!(snapshot.entries.get("a").map(String::as_str), Some("updated"));
    server.stop();
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_shutdown_returns_final_store() {
    let server = start_server(local_config());
    server.client().set("persist-in-memory", "yes").unwrap();
    wait_for(&server.dispatcher, "set", |s| s.applied == 1);

    let dispatcher = server.dispatcher.clone();
    let store = server.stop();

    assert_eq!(store.get("persist-in-memory"), Some("yes"));
    assert!(dispatcher.snapshot().is_err());
}

#[test]
fn test_shutdown_is_idempotent() {
    let server = start_server(local_config());
    let extra = server.shutdown.clone();

    extra.shutdown();
    extra.shutdown();
    let store = server.stop();
    assert!(store.is_empty());
}
