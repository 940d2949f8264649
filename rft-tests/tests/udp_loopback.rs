//! Transfers over real UDP sockets on the loopback interface

use rft::{Client, DirectoryStorage, Server, ServerOptions, Timeouts};
use rft_io::{RftSocket, StopSignal};
use rft_protocol::ConnectionId;
use std::fs;
use std::io::Write;
use std::thread;
use std::time::Duration;

fn timeouts() -> Timeouts {
    Timeouts {
        poll_interval: Duration::from_millis(100),
        handshake_timeout: Duration::from_secs(3),
        ack_timeout: Duration::from_secs(3),
        drain_timeout: Duration::from_millis(300),
    }
}

#[test]
fn test_file_over_loopback() {
    let out_dir = tempfile::tempdir().unwrap();
    let storage = DirectoryStorage::create(out_dir.path()).unwrap();

    let socket = RftSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let server_addr = socket.local_addr().unwrap();
    let stop = StopSignal::new();

    let mut server = Server::new(socket, storage)
        .with_options(ServerOptions {
            max_connections: 8,
            timeouts: timeouts(),
        })
        .with_stop_signal(stop.clone());
    let handle = thread::spawn(move || server.run());

    let contents: Vec<u8> = (0..40_000u32).map(|i| (i % 253) as u8).collect();
    let mut input = tempfile::NamedTempFile::new().unwrap();
    input.write_all(&contents).unwrap();
    input.flush().unwrap();

    let client_socket = RftSocket::for_peer(server_addr).unwrap();
    let report = Client::new(client_socket, server_addr)
        .with_timeouts(timeouts())
        .send_file(input.path())
        .unwrap();

    stop.raise();
    let outcome = handle.join().unwrap().unwrap();

    assert_eq!(report.connection_id, ConnectionId::new(1));
    assert_eq!(report.bytes, contents.len() as u64);
    assert_eq!(outcome.finished, 1);

    let written = fs::read(out_dir.path().join("1.file")).unwrap();
    assert_eq!(written, contents);
}

#[test]
fn test_empty_file_over_loopback() {
    let out_dir = tempfile::tempdir().unwrap();
    let storage = DirectoryStorage::create(out_dir.path().join("nested")).unwrap();

    let socket = RftSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let server_addr = socket.local_addr().unwrap();
    let stop = StopSignal::new();

    let mut server = Server::new(socket, storage).with_stop_signal(stop.clone());
    let handle = thread::spawn(move || server.run());

    let input = tempfile::NamedTempFile::new().unwrap();
    let report = Client::new(RftSocket::for_peer(server_addr).unwrap(), server_addr)
        .with_timeouts(timeouts())
        .send_file(input.path())
        .unwrap();
    assert!(report.fin_acknowledged);

    stop.raise();
    handle.join().unwrap().unwrap();

    let written = fs::read(out_dir.path().join("nested").join("1.file")).unwrap();
    assert!(written.is_empty());
}
