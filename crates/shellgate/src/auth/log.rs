//! Append-only audit log of authentication attempts.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat};
use tokio::io::AsyncWriteExt;

/// How the client tried to authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// `password` method.
    Password,
    /// `none` method, accepted only when no password is configured.
    None,
}

impl AuthMethod {
    /// Tag written to the log line.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::None => "none",
        }
    }
}

/// One authentication attempt.
#[derive(Debug, Clone)]
pub struct AuthAttempt {
    /// When the attempt was decided.
    pub at: DateTime<Local>,
    /// Remote address, if the transport reported one.
    pub peer: Option<SocketAddr>,
    /// Username offered by the client.
    pub user: String,
    /// Method used.
    pub method: AuthMethod,
    /// Whether access was granted.
    pub success: bool,
}

impl AuthAttempt {
    /// Record an attempt decided now.
    #[must_use]
    pub fn now(peer: Option<SocketAddr>, user: &str, method: AuthMethod, success: bool) -> Self {
        Self {
            at: Local::now(),
            peer,
            user: user.to_string(),
            method,
            success,
        }
    }

    /// Format the log line, newline included.
    #[must_use]
    pub fn line(&self) -> String {
        let peer = self
            .peer
            .map_or_else(|| "unknown".to_string(), |addr| addr.to_string());
        format!(
            "{} - IP: {}, User: {}, Method: {}, Success: {}\n",
            self.at.to_rfc3339_opts(SecondsFormat::Secs, true),
            peer,
            self.user,
            self.method.tag(),
            self.success,
        )
    }
}

/// Audit log file.
///
/// Each record is a single `write_all` on a file opened in append mode, so
/// lines from concurrent connections never interleave.
#[derive(Debug, Clone)]
pub struct AuthLog {
    path: PathBuf,
}

impl AuthLog {
    /// Log to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one attempt to the log and mirror it to the console.
    pub async fn record(&self, attempt: &AuthAttempt) -> io::Result<()> {
        let peer = attempt.peer.map(|p| p.to_string());
        if attempt.success {
            tracing::info!(
                peer = peer.as_deref().unwrap_or("unknown"),
                user = %attempt.user,
                method = attempt.method.tag(),
                "Authentication succeeded"
            );
        } else {
            tracing::warn!(
                peer = peer.as_deref().unwrap_or("unknown"),
                user = %attempt.user,
                method = attempt.method.tag(),
                "Authentication failed"
            );
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o644);

        let mut file = options.open(&self.path).await?;
        file.write_all(attempt.line().as_bytes()).await?;
        file.flush().await
    }
}
