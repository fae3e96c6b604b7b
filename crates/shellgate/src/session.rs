//! Interactive session bridge.
//!
//! A [`SessionBridge`] joins one authenticated byte channel to a shell running
//! on a local pseudo-terminal:
//!
//! ```text
//! Created ──request_pty──▶ PtyNegotiated ──run──▶ Relaying ──▶ Closed
//!    └──────────────run (no PTY)──▶ NoPtyRejected ──────────────▶ Closed
//! ```
//!
//! While relaying, three activities run concurrently over one shared PTY
//! master: channel → PTY (spawned task), resize propagation (spawned task)
//! and PTY → channel (on the calling task). End of channel input only stops
//! the first of these; the session ends when the PTY output reaches end of
//! stream, the child exits or the channel is closed.

use std::sync::Arc;
use std::time::Duration;

use shellgate_pty::{
    ExitStatus, NativePtySystem, PtyChild, PtyConfig, PtyMaster, PtySystem, WindowSize,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;

/// Sent to clients that open a shell without requesting a PTY.
pub const NO_PTY_MESSAGE: &str = "No PTY requested.\n";

/// How long remaining output is drained after the child exits or the remote hangs up.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Exit status reported when the session never produced one of its own.
const FAILURE_STATUS: u32 = 1;

/// Relay buffer size.
const RELAY_BUFFER_SIZE: usize = 8 * 1024;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Channel open, nothing negotiated.
    Created,
    /// The client requested a PTY.
    PtyNegotiated,
    /// Shell running, bytes flowing.
    Relaying,
    /// Shell requested without a PTY.
    NoPtyRejected,
    /// Finished; resources released.
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// No PTY was requested.
    NoPty,
    /// The shell could not be started.
    SpawnFailed,
    /// The shell exited.
    ChildExited,
    /// PTY output reached end of stream.
    OutputClosed,
    /// The channel was closed or stopped accepting output.
    RemoteClosed,
}

/// Result of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Status to report to the client.
    pub exit_status: u32,
    /// Why the session ended.
    pub end: SessionEnd,
}

/// PTY parameters from the client's `pty-req`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    /// Terminal type, exported to the shell as `TERM`.
    pub term: String,
    /// Initial window size.
    pub size: WindowSize,
}

/// How one relay direction stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayEnd {
    /// The side being read reached end of stream or failed.
    SourceEnded,
    /// The side being written failed.
    SinkFailed,
}

/// Bridges a byte channel to a shell on a PTY.
#[derive(Debug)]
pub struct SessionBridge {
    shell: String,
    pty: Option<PtyRequest>,
    state: SessionState,
    drain_grace: Duration,
}

impl SessionBridge {
    /// Create a bridge that will start `shell`.
    #[must_use]
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            pty: None,
            state: SessionState::Created,
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }

    /// Override the output drain grace period.
    #[must_use]
    pub const fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Record the client's PTY request. A repeated request replaces the earlier one.
    pub fn request_pty(&mut self, request: PtyRequest) {
        tracing::debug!(
            term = %request.term,
            cols = request.size.cols,
            rows = request.size.rows,
            "PTY negotiated"
        );
        self.pty = Some(request);
        self.transition(SessionState::PtyNegotiated);
    }

    /// Apply a window change that arrived before the shell started.
    ///
    /// Returns `false` when no PTY has been negotiated yet.
    pub fn set_window_size(&mut self, size: WindowSize) -> bool {
        let Some(pty) = self.pty.as_mut() else {
            return false;
        };
        tracing::trace!(cols = size.cols, rows = size.rows, "Pending PTY size updated");
        pty.size = size;
        true
    }

    /// The negotiated PTY, if any.
    #[must_use]
    pub const fn pty(&self) -> Option<&PtyRequest> {
        self.pty.as_ref()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }

    /// Run the session to completion.
    ///
    /// `reader` and `writer` are the two halves of the client channel;
    /// `resizes` carries window-change events in arrival order. `hangup`
    /// resolves when the channel is closed, either by a send or by its sender
    /// being dropped. Failures are reported to the client on `writer`, never
    /// returned.
    pub async fn run<R, W>(
        mut self,
        reader: R,
        mut writer: W,
        resizes: UnboundedReceiver<WindowSize>,
        mut hangup: oneshot::Receiver<()>,
    ) -> SessionOutcome
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send,
    {
        let Some(pty) = self.pty.take() else {
            self.transition(SessionState::NoPtyRejected);
            tracing::info!("Shell requested without a PTY, rejecting");
            send_notice(&mut writer, NO_PTY_MESSAGE).await;
            self.transition(SessionState::Closed);
            return SessionOutcome {
                exit_status: FAILURE_STATUS,
                end: SessionEnd::NoPty,
            };
        };

        let config = PtyConfig::builder()
            .env("TERM", &pty.term)
            .initial_size(pty.size)
            .build();

        let (master, mut child) =
            match NativePtySystem::spawn(&self.shell, std::iter::empty::<&str>(), &config).await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(shell = %self.shell, error = %e, "Failed to start shell on PTY");
                    send_notice(&mut writer, &format!("Error starting pty: {e}\n")).await;
                    self.transition(SessionState::Closed);
                    return SessionOutcome {
                        exit_status: FAILURE_STATUS,
                        end: SessionEnd::SpawnFailed,
                    };
                }
            };

        let master = Arc::new(master);
        self.transition(SessionState::Relaying);
        tracing::info!(shell = %self.shell, pid = child.pid(), term = %pty.term, "Shell started");

        let mut inbound = tokio::spawn(relay_inbound(reader, Arc::clone(&master)));
        let resizer = tokio::spawn(propagate_resizes(resizes, Arc::clone(&master)));

        let grace = self.drain_grace;
        let mut input_open = true;
        let (end, status) = {
            let outbound = relay_outbound(master.as_ref(), &mut writer);
            tokio::pin!(outbound);

            loop {
                tokio::select! {
                    relay = &mut outbound => break match relay {
                        // The last slave descriptor usually closes as the child exits
                        RelayEnd::SourceEnded => match tokio::time::timeout(grace, child.wait()).await {
                            Ok(Ok(status)) => (SessionEnd::ChildExited, Some(status)),
                            _ => (SessionEnd::OutputClosed, None),
                        },
                        RelayEnd::SinkFailed => {
                            hang_up(&child);
                            (SessionEnd::RemoteClosed, None)
                        }
                    },
                    status = child.wait() => {
                        // Output written just before exit is still in the PTY buffer
                        let _ = tokio::time::timeout(grace, outbound.as_mut()).await;
                        break (SessionEnd::ChildExited, status.ok());
                    }
                    relay = &mut inbound, if input_open => {
                        input_open = false;
                        tracing::debug!(?relay, "Channel input finished, output still relayed");
                    }
                    _ = &mut hangup => {
                        hang_up(&child);
                        let _ = tokio::time::timeout(grace, outbound.as_mut()).await;
                        break (SessionEnd::RemoteClosed, None);
                    }
                }
            }
        };

        inbound.abort();
        resizer.abort();

        let status = match status {
            Some(status) => Some(status),
            None => reap(&mut child, grace).await,
        };
        let _ = writer.flush().await;
        let _ = master.close();
        self.transition(SessionState::Closed);

        let exit_status = status.map_or(FAILURE_STATUS, |s| s.shell_code());
        tracing::info!(?end, exit_status, "Session closed");
        SessionOutcome { exit_status, end }
    }
}

/// Write a short message to the client, ignoring failures.
async fn send_notice<W: AsyncWrite + Unpin>(writer: &mut W, message: &str) {
    if let Err(e) = writer.write_all(message.as_bytes()).await {
        tracing::debug!(error = %e, "Failed to send notice to client");
        return;
    }
    let _ = writer.flush().await;
}

/// Hang up the child's terminal.
fn hang_up<C: PtyChild>(child: &C) {
    if let Err(e) = child.hang_up() {
        tracing::debug!(error = %e, "Failed to hang up child");
    }
}

/// Wait briefly for the child, then kill and reap it.
async fn reap<C: PtyChild>(child: &mut C, grace: Duration) -> Option<ExitStatus> {
    if let Ok(Ok(status)) = tokio::time::timeout(grace, child.wait()).await {
        return Some(status);
    }

    tracing::debug!(pid = child.pid(), "Child still running after session end, killing");
    if let Err(e) = child.kill() {
        tracing::debug!(error = %e, "Failed to kill child");
    }
    child.wait().await.ok()
}

/// Copy channel input into the PTY.
async fn relay_inbound<R, M>(mut reader: R, master: Arc<M>) -> RelayEnd
where
    R: AsyncRead + Unpin,
    M: PtyMaster,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return RelayEnd::SourceEnded,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "Channel read failed");
                return RelayEnd::SourceEnded;
            }
        };
        if let Err(e) = master.write_all(&buf[..n]).await {
            tracing::debug!(error = %e, "PTY write failed");
            return RelayEnd::SinkFailed;
        }
    }
}

/// Copy PTY output to the channel.
async fn relay_outbound<M, W>(master: &M, writer: &mut W) -> RelayEnd
where
    M: PtyMaster,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    loop {
        let n = match master.read(&mut buf).await {
            Ok(0) => return RelayEnd::SourceEnded,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "PTY read failed");
                return RelayEnd::SourceEnded;
            }
        };
        if writer.write_all(&buf[..n]).await.is_err() || writer.flush().await.is_err() {
            return RelayEnd::SinkFailed;
        }
    }
}

/// Apply window-change events in order. Failures are not fatal to the session.
async fn propagate_resizes<M: PtyMaster>(
    mut resizes: UnboundedReceiver<WindowSize>,
    master: Arc<M>,
) {
    while let Some(size) = resizes.recv().await {
        match master.resize(size) {
            Ok(()) => tracing::trace!(cols = size.cols, rows = size.rows, "PTY resized"),
            Err(e) => tracing::debug!(error = %e, "PTY resize failed"),
        }
    }
}
