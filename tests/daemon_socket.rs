//! End-to-end tests driving a live daemon router over a Unix socket.
//!
//! Spins up the real server with the real supervisor on a temp socket,
//! then exercises the full start/list/stop lifecycle through the client.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use sage::config::{Config, ServiceDefinition};
use sage::daemon;
use sage::envelope::{ListEntry, Response};
use sage::spmp::packet::{command, encoding, Packet, V1};
use sage::spmp::{SpmpClient, SpmpServer};
use sage::supervisor::Supervisor;

struct TestDaemon {
    client: SpmpClient,
    socket_path: PathBuf,
    server_task: tokio::task::JoinHandle<anyhow::Result<()>>,
    _tmp: tempfile::TempDir,
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.server_task.abort();
    }
}

/// Starts a daemon with two configured services on a temp socket.
async fn spawn_daemon() -> TestDaemon {
    let tmp = tempfile::TempDir::new().unwrap();
    let socket_path = tmp.path().join("sage.sock");

    let mut services = HashMap::new();
    services.insert(
        "web".to_string(),
        ServiceDefinition {
            name: "web".to_string(),
            command: "sleep".to_string(),
            args: vec!["100".to_string()],
            working_dir: None,
            env: HashMap::new(),
        },
    );
    services.insert(
        "db".to_string(),
        ServiceDefinition {
            name: "db".to_string(),
            command: "sleep".to_string(),
            args: vec!["100".to_string()],
            working_dir: None,
            env: HashMap::new(),
        },
    );

    let supervisor = Arc::new(Supervisor::new(
        Arc::new(Config { services }),
        tmp.path().join("logs"),
    ));
    let router = Arc::new(daemon::build_router(&supervisor));
    let server = SpmpServer::new(&socket_path, router);
    let server_task = tokio::spawn(async move { server.run().await });

    for _ in 0..100 {
        if socket_path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    TestDaemon {
        client: SpmpClient::new(&socket_path),
        socket_path,
        server_task,
        _tmp: tmp,
    }
}

fn request(cmd: u8, name: &str) -> Packet {
    Packet::new(V1, encoding::TEXT, cmd, name.as_bytes().to_vec()).unwrap()
}

async fn control(daemon: &TestDaemon, cmd: u8, name: &str) -> Response<String> {
    let reply = daemon.client.roundtrip(&request(cmd, name)).await.unwrap();
    assert_eq!(reply.encoding_tag(), encoding::JSON);
    serde_json::from_slice(&reply.payload).unwrap()
}

async fn listing(daemon: &TestDaemon, cmd: u8, name: &str) -> Response<Vec<ListEntry>> {
    let reply = daemon.client.roundtrip(&request(cmd, name)).await.unwrap();
    serde_json::from_slice(&reply.payload).unwrap()
}

#[tokio::test]
async fn test_full_service_lifecycle() {
    let daemon = spawn_daemon().await;

    // Start; the success message carries the PID.
    let started = control(&daemon, command::START, "web").await;
    assert!(started.is_ok(), "start failed: {}", started.msg);
    assert!(started.msg.contains("web"));
    let pid: u32 = started
        .msg
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .expect("start message should contain the PID");
    assert!(pid > 0);

    // List shows web online with the same PID, db offline.
    let listed = listing(&daemon, command::LIST, "").await;
    assert!(listed.is_ok());
    assert_eq!(listed.data.len(), 2);
    let web = listed.data.iter().find(|e| e.name == "web").unwrap();
    assert_eq!(web.status, "online");
    assert_eq!(web.pid, pid);
    let db = listed.data.iter().find(|e| e.name == "db").unwrap();
    assert_eq!(db.status, "offline");
    assert_eq!(db.pid, 0);
    assert_eq!(db.uptime, "0s");

    // Stop succeeds and the registry record disappears.
    let stopped = control(&daemon, command::STOP, "web").await;
    assert!(stopped.is_ok(), "stop failed: {}", stopped.msg);

    let listed = listing(&daemon, command::LIST, "").await;
    let web = listed.data.iter().find(|e| e.name == "web").unwrap();
    assert_eq!(web.status, "offline");
    assert_eq!(web.pid, 0);
}

#[tokio::test]
async fn test_start_unknown_service_returns_failure_envelope() {
    let daemon = spawn_daemon().await;

    let resp = control(&daemon, command::START, "ghost").await;
    assert!(!resp.is_ok());
    assert_eq!(resp.msg, "'ghost': service name doesn't exist");
}

#[tokio::test]
async fn test_stop_unknown_and_not_running() {
    let daemon = spawn_daemon().await;

    let resp = control(&daemon, command::STOP, "ghost").await;
    assert!(!resp.is_ok());
    assert_eq!(resp.msg, "service 'ghost' not found in configuration");

    let resp = control(&daemon, command::STOP, "web").await;
    assert!(!resp.is_ok());
    assert_eq!(resp.msg, "service 'web' is not running");
}

#[tokio::test]
async fn test_double_start_refused() {
    let daemon = spawn_daemon().await;

    assert!(control(&daemon, command::START, "web").await.is_ok());
    let resp = control(&daemon, command::START, "web").await;
    assert!(!resp.is_ok());
    assert_eq!(resp.msg, "service 'web' is already running");

    control(&daemon, command::STOP, "web").await;
}

#[tokio::test]
async fn test_status_returns_single_entry() {
    let daemon = spawn_daemon().await;

    let resp = listing(&daemon, command::STATUS, "db").await;
    assert!(resp.is_ok());
    assert_eq!(resp.data.len(), 1);
    assert_eq!(resp.data[0].name, "db");
    assert_eq!(resp.data[0].status, "offline");

    let resp = listing(&daemon, command::STATUS, "ghost").await;
    assert!(!resp.is_ok());
    assert!(resp.data.is_empty());
    assert!(resp.msg.contains("doesn't exist"));
}

#[tokio::test]
async fn test_malformed_packet_closes_without_response() {
    let daemon = spawn_daemon().await;

    let mut stream = tokio::net::UnixStream::connect(&daemon.socket_path)
        .await
        .unwrap();
    stream.write_all(b"not an spmp frame at all").await.unwrap();
    stream.shutdown().await.unwrap();

    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut out))
        .await
        .expect("server should close the connection")
        .unwrap();
    assert!(out.is_empty(), "expected silent close, got {out:?}");
}

#[tokio::test]
async fn test_unsupported_version_closes_without_response() {
    let daemon = spawn_daemon().await;

    let mut frame = request(command::LIST, "").encode().unwrap();
    frame[2] = 0x02;

    let mut stream = tokio::net::UnixStream::connect(&daemon.socket_path)
        .await
        .unwrap();
    stream.write_all(&frame).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut out))
        .await
        .expect("server should close the connection")
        .unwrap();
    assert!(out.is_empty());
}
