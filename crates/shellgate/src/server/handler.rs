//! Per-connection SSH handler.
//!
//! One [`ConnectionHandler`] exists per TCP connection. It decides
//! authentication, tracks the session channels the client opens and hands
//! each started channel to a [`SessionBridge`] or the file-transfer
//! collaborator on its own task.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use russh::server::{Auth, Handle, Msg, Session};
use russh::{Channel, ChannelId, MethodKind, MethodSet, Pty};
use shellgate_pty::WindowSize;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::oneshot;

use crate::auth::{AuthAttempt, AuthLog, AuthMethod, CredentialVerifier};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::session::{PtyRequest, SessionBridge};
use crate::sftp::FileTransfer;

/// Subsystem name routed to file transfer.
pub const SFTP_SUBSYSTEM: &str = "sftp";

/// State shared by every connection.
#[derive(Debug)]
pub struct Shared<F> {
    config: Arc<ServerConfig>,
    verifier: Option<CredentialVerifier>,
    auth_log: AuthLog,
    transfer: Arc<F>,
}

impl<F: FileTransfer> Shared<F> {
    /// Bundle the resolved configuration with its file-transfer collaborator.
    #[must_use]
    pub fn new(config: Arc<ServerConfig>, transfer: F) -> Self {
        Self {
            verifier: config.verifier(),
            auth_log: AuthLog::new(&config.auth_log),
            config,
            transfer: Arc::new(transfer),
        }
    }

    /// The resolved configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Whether password authentication is enabled.
    #[must_use]
    pub const fn auth_enabled(&self) -> bool {
        self.verifier.is_some()
    }

    /// Methods advertised to clients.
    #[must_use]
    pub fn methods(&self) -> MethodSet {
        let mut methods = MethodSet::empty();
        if self.auth_enabled() {
            methods.push(MethodKind::Password);
        } else {
            methods.push(MethodKind::None);
        }
        methods
    }

    /// Decide a password attempt: right user and matching credential.
    pub async fn check_password(&self, user: &str, password: &str) -> bool {
        let Some(verifier) = self.verifier.clone() else {
            return false;
        };
        if user != self.config.user {
            return false;
        }

        // bcrypt and Argon2 are deliberately slow
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verifier.verify(&password))
            .await
            .unwrap_or(false)
    }

    async fn record(&self, peer: Option<SocketAddr>, user: &str, method: AuthMethod, success: bool) {
        let attempt = AuthAttempt::now(peer, user, method, success);
        if let Err(e) = self.auth_log.record(&attempt).await {
            tracing::warn!(
                path = %self.auth_log.path().display(),
                error = %e,
                "Failed to write auth log"
            );
        }
    }
}

/// A session channel and what has been negotiated on it.
struct ChannelSlot {
    channel: Option<Channel<Msg>>,
    bridge: Option<SessionBridge>,
    resizes: Option<UnboundedSender<WindowSize>>,
    /// Dropped with the slot, which tells a running bridge the channel closed.
    hangup: Option<oneshot::Sender<()>>,
}

/// Handles one SSH connection.
pub struct ConnectionHandler<F> {
    shared: Arc<Shared<F>>,
    peer: Option<SocketAddr>,
    channels: HashMap<ChannelId, ChannelSlot>,
}

impl<F: FileTransfer> ConnectionHandler<F> {
    /// Create a handler for a connection from `peer`.
    #[must_use]
    pub fn new(shared: Arc<Shared<F>>, peer: Option<SocketAddr>) -> Self {
        Self {
            shared,
            peer,
            channels: HashMap::new(),
        }
    }

    fn reject(&self) -> Auth {
        Auth::Reject {
            proceed_with_methods: Some(self.shared.methods()),
            partial_success: false,
        }
    }

    /// Take the channel for a service request, failing the request if it cannot start.
    fn claim(&mut self, id: ChannelId, session: &mut Session) -> Option<(Channel<Msg>, &mut ChannelSlot)> {
        let Some(slot) = self.channels.get_mut(&id) else {
            tracing::warn!(channel = ?id, "Service request for unknown channel");
            let _ = session.channel_failure(id);
            return None;
        };
        let Some(channel) = slot.channel.take() else {
            tracing::warn!(channel = ?id, "Channel already started a service");
            let _ = session.channel_failure(id);
            return None;
        };
        let _ = session.channel_success(id);
        Some((channel, slot))
    }

    /// Run the shell for channel `id` through a [`SessionBridge`].
    fn start_shell(&mut self, id: ChannelId, session: &mut Session) {
        let handle = session.handle();
        let Some((channel, slot)) = self.claim(id, session) else {
            return;
        };
        let Some(bridge) = slot.bridge.take() else {
            return;
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let (hangup, closed) = oneshot::channel();
        slot.resizes = Some(tx);
        slot.hangup = Some(hangup);
        let peer = self.peer;

        tokio::spawn(async move {
            let (reader, writer) = tokio::io::split(channel.into_stream());
            let outcome = bridge.run(reader, writer, rx, closed).await;
            tracing::debug!(?peer, channel = ?id, ?outcome, "Shell session finished");
            finish_channel(&handle, id, outcome.exit_status).await;
        });
    }

    /// Hand channel `id` to the file-transfer collaborator.
    fn start_transfer(&mut self, id: ChannelId, session: &mut Session) {
        let handle = session.handle();
        let Some((channel, _)) = self.claim(id, session) else {
            return;
        };

        let transfer = Arc::clone(&self.shared.transfer);
        let peer = self.peer;

        tokio::spawn(async move {
            let status = match transfer.serve(channel.into_stream()).await {
                Ok(()) => 0,
                Err(e) => {
                    tracing::warn!(?peer, channel = ?id, error = %e, "File transfer failed");
                    1
                }
            };
            finish_channel(&handle, id, status).await;
        });
    }
}

/// Report the exit status, then end and close the channel.
async fn finish_channel(handle: &Handle, id: ChannelId, exit_status: u32) {
    if handle.exit_status_request(id, exit_status).await.is_err() {
        tracing::debug!(channel = ?id, "Client gone before exit status");
        return;
    }
    let _ = handle.eof(id).await;
    let _ = handle.close(id).await;
}

impl<F: FileTransfer> russh::server::Handler for ConnectionHandler<F> {
    type Error = ServerError;

    async fn auth_none(&mut self, user: &str) -> Result<Auth, Self::Error> {
        if self.shared.auth_enabled() {
            return Ok(self.reject());
        }
        self.shared.record(self.peer, user, AuthMethod::None, true).await;
        Ok(Auth::Accept)
    }

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        let accepted = self.shared.check_password(user, password).await;
        self.shared
            .record(self.peer, user, AuthMethod::Password, accepted)
            .await;
        Ok(if accepted { Auth::Accept } else { self.reject() })
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let id = channel.id();
        tracing::debug!(peer = ?self.peer, channel = ?id, "Session channel opened");
        self.channels.insert(
            id,
            ChannelSlot {
                channel: Some(channel),
                bridge: Some(SessionBridge::new(self.shared.config.shell.clone())),
                resizes: None,
                hangup: None,
            },
        );
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    async fn pty_request(
        &mut self,
        channel: ChannelId,
        term: &str,
        col_width: u32,
        row_height: u32,
        pix_width: u32,
        pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        match self.channels.get_mut(&channel).and_then(|slot| slot.bridge.as_mut()) {
            Some(bridge) => {
                bridge.request_pty(PtyRequest {
                    term: term.to_string(),
                    size: WindowSize::saturating(col_width, row_height, pix_width, pix_height),
                });
                let _ = session.channel_success(channel);
            }
            _ => {
                tracing::warn!(channel = ?channel, "PTY request for unknown or started channel");
                let _ = session.channel_failure(channel);
            }
        }
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        tracing::info!(peer = ?self.peer, channel = ?channel, "Shell requested");
        self.start_shell(channel, session);
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        // The command is not run; exec gets the same interactive shell
        tracing::info!(
            peer = ?self.peer,
            channel = ?channel,
            command = %String::from_utf8_lossy(data),
            "Exec requested, starting shell"
        );
        self.start_shell(channel, session);
        Ok(())
    }

    async fn subsystem_request(
        &mut self,
        channel: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if name == SFTP_SUBSYSTEM && self.shared.config.sftp.enable {
            tracing::info!(peer = ?self.peer, channel = ?channel, "SFTP subsystem requested");
            self.start_transfer(channel, session);
        } else {
            tracing::info!(
                peer = ?self.peer,
                channel = ?channel,
                subsystem = %name,
                "Unsupported subsystem requested"
            );
            let _ = session.channel_failure(channel);
        }
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        col_width: u32,
        row_height: u32,
        pix_width: u32,
        pix_height: u32,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        let size = WindowSize::saturating(col_width, row_height, pix_width, pix_height);
        let Some(slot) = self.channels.get_mut(&channel) else {
            tracing::debug!(channel = ?channel, "Window change for unknown channel");
            return Ok(());
        };

        if let Some(resizes) = slot.resizes.as_ref() {
            let _ = resizes.send(size);
        } else if !slot.bridge.as_mut().is_some_and(|bridge| bridge.set_window_size(size)) {
            tracing::debug!(channel = ?channel, "Window change without a PTY, ignored");
        }
        Ok(())
    }

    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        tracing::debug!(channel = ?channel, "Channel EOF received");
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        tracing::debug!(channel = ?channel, "Channel closed");
        if let Some(hangup) = self.channels.remove(&channel).and_then(|slot| slot.hangup) {
            let _ = hangup.send(());
        }
        Ok(())
    }
}

impl<F> Drop for ConnectionHandler<F> {
    fn drop(&mut self) {
        tracing::debug!(peer = ?self.peer, channels = self.channels.len(), "Connection handler dropped");
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::ConfigFile;
    use crate::sftp::SftpServerProcess;

    fn shared(password: Option<&str>, log: PathBuf) -> Shared<SftpServerProcess> {
        let mut config = ServerConfig::from_file(ConfigFile::default(), vec![], PathBuf::from("t"));
        config.user = "admin".to_string();
        config.password = password.map(str::to_string);
        config.auth_log = log;
        Shared::new(Arc::new(config), SftpServerProcess::new("cat"))
    }

    #[tokio::test]
    async fn password_needs_user_and_credential() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared(Some("hunter2"), dir.path().join("ssh.log"));

        assert!(shared.check_password("admin", "hunter2").await);
        assert!(!shared.check_password("root", "hunter2").await);
        assert!(!shared.check_password("admin", "hunter3").await);
    }

    #[tokio::test]
    async fn disabled_auth_rejects_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared(None, dir.path().join("ssh.log"));

        assert!(!shared.auth_enabled());
        assert!(!shared.check_password("admin", "").await);
    }

    #[tokio::test]
    async fn attempts_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("ssh.log");
        let shared = shared(Some("x"), log.clone());
        let peer: SocketAddr = "192.0.2.7:50000".parse().unwrap();

        shared.record(Some(peer), "admin", AuthMethod::Password, false).await;
        shared.record(Some(peer), "admin", AuthMethod::Password, true).await;

        let text = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - IP: 192.0.2.7:50000, User: admin, Method: password, Success: false"));
        assert!(lines[1].ends_with("Success: true"));
    }

    #[tokio::test]
    async fn unwritable_log_is_not_fatal() {
        let shared = shared(Some("x"), PathBuf::from("/nonexistent/dir/ssh.log"));
        shared.record(None, "admin", AuthMethod::Password, false).await;
    }
}
