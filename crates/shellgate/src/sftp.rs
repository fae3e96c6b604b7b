//! File-transfer collaborator for the `sftp` subsystem.
//!
//! The SFTP wire protocol is never parsed here: the channel's bytes are piped
//! to an external `sftp-server` process and back.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

/// Serves a file-transfer session over an opaque duplex stream.
pub trait FileTransfer: Send + Sync + 'static {
    /// Serve until either side ends.
    fn serve<S>(&self, stream: S) -> impl Future<Output = io::Result<()>> + Send
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static;
}

/// Runs an external `sftp-server` binary per session.
#[derive(Debug, Clone)]
pub struct SftpServerProcess {
    path: PathBuf,
}

impl SftpServerProcess {
    /// Use the server binary at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The server binary.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileTransfer for SftpServerProcess {
    async fn serve<S>(&self, stream: S) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(mut stdin), Some(mut stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(io::Error::other("sftp-server stdio was not captured"));
        };
        tracing::debug!(path = %self.path.display(), pid = child.id(), "sftp-server started");

        let (mut reader, mut writer) = tokio::io::split(stream);

        let to_server = async move {
            let copied = tokio::io::copy(&mut reader, &mut stdin).await;
            // Closing stdin tells the server the client is done
            let _ = stdin.shutdown().await;
            copied
        };
        let from_server = async move {
            let copied = tokio::io::copy(&mut stdout, &mut writer).await;
            let _ = writer.shutdown().await;
            copied
        };
        tokio::pin!(to_server, from_server);

        let result = tokio::select! {
            sent = &mut to_server => {
                // Let the server answer what it already received
                let received = from_server.await;
                sent.and(received)
            }
            received = &mut from_server => received,
        };

        match result {
            Ok(bytes) => tracing::debug!(bytes, "sftp session finished"),
            Err(ref e) => tracing::debug!(error = %e, "sftp session relay failed"),
        }

        if child.try_wait()?.is_none() {
            let _ = child.start_kill();
        }
        let status = child.wait().await?;
        tracing::debug!(%status, "sftp-server exited");

        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn pipes_both_ways() {
        let (mut client, server) = tokio::io::duplex(1024);
        let transfer = SftpServerProcess::new("cat");
        let session = tokio::spawn(async move { transfer.serve(server).await });

        client.write_all(b"hello sftp").await.unwrap();
        client.shutdown().await.unwrap();

        let mut echoed = Vec::new();
        client.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, b"hello sftp");

        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let (_client, server) = tokio::io::duplex(64);
        let transfer = SftpServerProcess::new("/nonexistent/sftp-server");

        let err = transfer.serve(server).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn keeps_path() {
        let transfer = SftpServerProcess::new("/usr/lib/openssh/sftp-server");
        assert_eq!(transfer.path(), Path::new("/usr/lib/openssh/sftp-server"));
    }
}
