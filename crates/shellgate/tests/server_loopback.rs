//! End-to-end scenarios against a running server over loopback.

#![cfg(unix)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use russh::ChannelMsg;
use russh::client;
use russh::keys::{Algorithm, PrivateKey, PublicKey};
use shellgate::Server;
use shellgate::config::{ConfigFile, ServerConfig};
use tokio::task::JoinHandle;

/// Client that trusts any host key.
struct TrustingClient;

impl client::Handler for TrustingClient {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _key: &PublicKey) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

fn config(dir: &Path) -> ServerConfig {
    let mut config = ServerConfig::from_file(
        ConfigFile::default(),
        vec![],
        dir.join("shellgate.toml"),
    );
    config.port = 0;
    config.user = "admin".to_string();
    config.password = Some("hunter2".to_string());
    config.shell = "sh".to_string();
    config.auth_log = dir.join("ssh.log");
    config.idle_timeout = None;
    config.max_connection_time = None;
    config.sftp.enable = false;
    config
}

async fn start(config: ServerConfig) -> (SocketAddr, JoinHandle<()>) {
    let key = PrivateKey::random(&mut russh::keys::ssh_key::rand_core::OsRng, Algorithm::Ed25519)
        .unwrap();
    let server = Server::new(config, key);
    let listener = server.bind().await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let task = tokio::spawn(async move {
        server
            .serve(listener, std::future::pending::<()>())
            .await
            .unwrap();
    });
    (SocketAddr::from(([127, 0, 0, 1], port)), task)
}

async fn connect(addr: SocketAddr) -> client::Handle<TrustingClient> {
    client::connect(Arc::new(client::Config::default()), addr, TrustingClient)
        .await
        .unwrap()
}

async fn login(addr: SocketAddr) -> client::Handle<TrustingClient> {
    let mut handle = connect(addr).await;
    let auth = handle.authenticate_password("admin", "hunter2").await.unwrap();
    assert!(auth.success());
    handle
}

/// Poll until the server has dropped the connection.
async fn closed_within(handle: &client::Handle<TrustingClient>, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if handle.is_closed() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    handle.is_closed()
}

fn log_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn wrong_then_right_password_is_logged_once_each() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let log = config.auth_log.clone();
    let (addr, server) = start(config).await;

    let mut handle = connect(addr).await;
    let denied = handle.authenticate_password("admin", "wrong").await.unwrap();
    assert!(!denied.success());

    let lines = log_lines(&log);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(" - IP: 127.0.0.1:"), "got {:?}", lines[0]);
    assert!(lines[0].ends_with(", User: admin, Method: password, Success: false"));

    let granted = handle.authenticate_password("admin", "hunter2").await.unwrap();
    assert!(granted.success());

    let lines = log_lines(&log);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines.iter().filter(|l| l.ends_with("Success: false")).count(), 1);
    assert!(lines[1].ends_with(", User: admin, Method: password, Success: true"));

    server.abort();
}

#[tokio::test]
async fn silent_client_is_dropped_after_idle_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.idle_timeout = Some(Duration::from_secs(1));
    let (addr, server) = start(config).await;

    let handle = login(addr).await;
    assert!(!handle.is_closed());
    assert!(closed_within(&handle, Duration::from_secs(10)).await);

    server.abort();
}

#[tokio::test]
async fn busy_client_is_dropped_at_lifetime_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.max_connection_time = Some(Duration::from_secs(1));
    let (addr, server) = start(config).await;

    let handle = login(addr).await;
    let mut channel = handle.channel_open_session().await.unwrap();
    channel
        .request_pty(true, "xterm", 80, 24, 0, 0, &[])
        .await
        .unwrap();
    channel.request_shell(true).await.unwrap();

    // Keep traffic flowing so only the lifetime limit can end the connection
    let started = tokio::time::Instant::now();
    while started.elapsed() < Duration::from_secs(10) && !handle.is_closed() {
        if channel.data(&b"true\n"[..]).await.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(closed_within(&handle, Duration::from_secs(5)).await);
    assert!(started.elapsed() < Duration::from_secs(10));

    server.abort();
}

#[tokio::test]
async fn shell_exit_status_reaches_client() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, server) = start(config(dir.path())).await;

    let handle = login(addr).await;
    let mut channel = handle.channel_open_session().await.unwrap();
    channel
        .request_pty(true, "xterm", 80, 24, 0, 0, &[])
        .await
        .unwrap();
    channel.request_shell(true).await.unwrap();
    channel.data(&b"exit 7\n"[..]).await.unwrap();

    let status = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(msg) = channel.wait().await {
            if let ChannelMsg::ExitStatus { exit_status } = msg {
                return Some(exit_status);
            }
        }
        None
    })
    .await
    .unwrap();
    assert_eq!(status, Some(7));

    server.abort();
}

#[tokio::test]
async fn disabled_sftp_subsystem_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, server) = start(config(dir.path())).await;

    let handle = login(addr).await;
    let mut channel = handle.channel_open_session().await.unwrap();
    channel.request_subsystem(true, "sftp").await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Success) => return true,
                Some(ChannelMsg::Failure) => return false,
                Some(ChannelMsg::Data { data }) => {
                    panic!("unexpected data {:?}", String::from_utf8_lossy(&data))
                }
                Some(_) => {}
                None => panic!("channel closed without a reply"),
            }
        }
    })
    .await
    .unwrap();
    assert!(!reply, "sftp must be refused when disabled");

    server.abort();
}
