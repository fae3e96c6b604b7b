//! Operator console and process signals.
//!
//! The server runs until a line reading `q` arrives on stdin or the process
//! receives SIGINT or SIGTERM. Stdin reaching end of file (a detached
//! service) leaves the server running.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Line that stops the server.
pub const QUIT_COMMAND: &str = "q";

/// Why the server is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The operator typed the quit command.
    Quit,
    /// A termination signal arrived.
    Signal(i32),
}

/// Read lines until the quit command.
///
/// Returns `false` if input ends or fails first.
pub async fn wait_for_quit<R: AsyncBufRead + Unpin>(input: R) -> bool {
    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim() == QUIT_COMMAND => return true,
            Ok(Some(_)) => {}
            Ok(None) => return false,
            Err(e) => {
                tracing::debug!(error = %e, "Console read failed");
                return false;
            }
        }
    }
}

/// Wait for SIGINT or SIGTERM and return its number.
pub async fn wait_for_signal() -> io::Result<i32> {
    use futures::StreamExt;
    use signal_hook::consts::signal::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();
    let signal = signals
        .next()
        .await
        .ok_or_else(|| io::Error::other("signal stream ended"))?;
    handle.close();
    Ok(signal)
}

/// Resolve when the server should stop.
pub async fn shutdown_requested() -> ShutdownReason {
    let console = async {
        if wait_for_quit(tokio::io::BufReader::new(tokio::io::stdin())).await {
            return;
        }
        tracing::debug!("Console input closed, use a signal to stop the server");
        std::future::pending::<()>().await;
    };

    let signal = async {
        match wait_for_signal().await {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install signal handlers");
                std::future::pending().await
            }
        }
    };

    tokio::select! {
        () = console => ShutdownReason::Quit,
        signal = signal => ShutdownReason::Signal(signal),
    }
}
