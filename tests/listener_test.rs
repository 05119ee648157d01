// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the configuration listener over real loopback sockets

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::sync::CancellationToken;

use rust_modbus_bridge::listener::{ConfigListener, ListenerHandle, ListenerSettings};
use rust_modbus_bridge::modbus::RegisterBank;
use rust_modbus_bridge::publisher::{RegisterPublisher, SourceSpec};

const MARKER: &str = "xxxxxx";

fn launch(settings_file: &Path) -> ListenerHandle {
    let mut settings = ListenerSettings::new("127.0.0.1:0".parse().unwrap(), settings_file);
    settings.session_timeout = Duration::from_millis(300);
    ListenerHandle::launch(ConfigListener::new(settings), CancellationToken::new()).unwrap()
}

/// Send a payload, then wait for the listener to close the connection
async fn send(address: SocketAddr, payload: &[u8]) {
    let mut stream = TcpStream::connect(address).await.unwrap();
    stream.write_all(payload).await.unwrap();

    let mut buf = [0u8; 16];
    let read = time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("connection left open")
        .unwrap_or(0);
    assert_eq!(read, 0, "listener must not answer");
}

#[tokio::test]
async fn test_valid_message_is_persisted() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("PARAMCHANNELS.txt");
    let handle = launch(&file);

    send(handle.local_addr(), format!("{MARKER};22;230.5").as_bytes()).await;

    assert_eq!(fs::read_to_string(&file).unwrap(), "22\n230.5\n");
    assert!(handle.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_producer_handle_survives_update() {
    use std::io::{Seek, SeekFrom, Write};

    let dir = tempdir().unwrap();
    let file = dir.path().join("PARAMCHANNELS.txt");
    fs::write(&file, "1\n2\n3\n").unwrap();

    // The producer opens the file once and rewrites it through this handle
    let mut producer = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(&file)
        .unwrap();

    let handle = launch(&file);
    send(handle.local_addr(), format!("{MARKER};22;230.5").as_bytes()).await;
    assert_eq!(fs::read_to_string(&file).unwrap(), "22\n230.5\n");

    producer.set_len(0).unwrap();
    producer.seek(SeekFrom::Start(0)).unwrap();
    producer.write_all(b"7\n8\n9\n").unwrap();
    producer.flush().unwrap();

    let bank = RegisterBank::new();
    let publisher = RegisterPublisher::new(bank.clone(), vec![SourceSpec::param(&file)]).unwrap();
    publisher.poll_once().unwrap();
    assert_eq!(bank.get_input_registers(18, 3), Some(vec![700, 800, 900]));

    assert!(handle.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_atomic_rename_persistence() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("SetInformation.txt");
    fs::write(&file, "old\n").unwrap();

    let mut settings = ListenerSettings::new("127.0.0.1:0".parse().unwrap(), &file);
    settings.atomic_rename = true;
    let handle =
        ListenerHandle::launch(ConfigListener::new(settings), CancellationToken::new()).unwrap();

    send(handle.local_addr(), format!("{MARKER};9;1").as_bytes()).await;
    assert_eq!(fs::read_to_string(&file).unwrap(), "9\n1\n");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    assert!(handle.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_invalid_messages_leave_file_unchanged() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("PARAMCHANNELS.txt");
    fs::write(&file, "1.5\n2.5\n").unwrap();
    let handle = launch(&file);

    for payload in [
        "yyyyyy;22;230.5".as_bytes(),
        format!("{MARKER};22").as_bytes(),
        format!("{MARKER};22;230.5;9").as_bytes(),
        &[0x78, 0xff, 0xfe][..],
        &b""[..],
    ] {
        send(handle.local_addr(), payload).await;
    }

    assert_eq!(fs::read_to_string(&file).unwrap(), "1.5\n2.5\n");
    assert!(!handle.is_finished());
    assert!(handle.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_sessions_are_served_in_order() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("settings.txt");
    let handle = launch(&file);

    send(handle.local_addr(), format!("{MARKER};22;1").as_bytes()).await;
    send(handle.local_addr(), b"bad").await;
    send(handle.local_addr(), format!("{MARKER};23;2").as_bytes()).await;

    assert_eq!(fs::read_to_string(&file).unwrap(), "23\n2\n");
    assert!(handle.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_silent_client_times_out() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("settings.txt");
    let handle = launch(&file);

    // Holds the session slot without sending anything
    let mut silent = TcpStream::connect(handle.local_addr()).await.unwrap();
    let mut buf = [0u8; 1];
    let read = time::timeout(Duration::from_secs(2), silent.read(&mut buf))
        .await
        .expect("session not timed out")
        .unwrap_or(0);
    assert_eq!(read, 0);

    send(handle.local_addr(), format!("{MARKER};22;7").as_bytes()).await;
    assert_eq!(fs::read_to_string(&file).unwrap(), "22\n7\n");
    assert!(handle.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_cancel_interrupts_accept() {
    let dir = tempdir().unwrap();
    let handle = launch(&dir.path().join("settings.txt"));
    let address = handle.local_addr();

    handle.cancel();
    time::sleep(Duration::from_millis(100)).await;
    assert!(handle.is_finished());
    assert!(handle.outcome().await.is_ok());

    time::sleep(Duration::from_millis(50)).await;
    assert!(TcpStream::connect(address).await.is_err());
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let settings = ListenerSettings::new(occupied.local_addr().unwrap(), "unused.txt");

    let result = ListenerHandle::launch(ConfigListener::new(settings), CancellationToken::new());
    assert!(result.is_err());
}
