//! Core traits for PTY abstraction.
//!
//! - [`PtyMaster`]: the controller end of a PTY, shared between relay tasks.
//! - [`PtyChild`]: handle for the process running on the slave end.
//! - [`PtySystem`]: factory that allocates a PTY and spawns a child on it.

use std::ffi::OsStr;
use std::future::Future;
use std::io;

use crate::config::{PtyConfig, WindowSize};
use crate::error::Result;

/// The master side of a pseudo-terminal.
///
/// All operations take `&self` so a single master can be shared through an
/// `Arc` by an input relay, an output relay and a resize task concurrently.
pub trait PtyMaster: Send + Sync + 'static {
    /// Read terminal output into `buf`.
    ///
    /// Returns `Ok(0)` at end of stream, which includes the hang-up reported
    /// once every slave descriptor has been closed.
    fn read(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Write terminal input from `buf`, returning how many bytes were accepted.
    fn write(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Write the whole buffer.
    fn write_all(&self, mut buf: &[u8]) -> impl Future<Output = io::Result<()>> + Send {
        async move {
            while !buf.is_empty() {
                match self.write(buf).await? {
                    0 => return Err(io::ErrorKind::WriteZero.into()),
                    n => buf = &buf[n..],
                }
            }
            Ok(())
        }
    }

    /// Resize the PTY. The kernel delivers SIGWINCH to the foreground group.
    fn resize(&self, size: WindowSize) -> Result<()>;

    /// Get the current window size.
    fn window_size(&self) -> Result<WindowSize>;

    /// Mark the master closed. Later reads return EOF and writes fail.
    fn close(&self) -> Result<()>;

    /// Check if the PTY is still open.
    fn is_open(&self) -> bool;

    /// Get the raw master file descriptor.
    #[cfg(unix)]
    fn as_raw_fd(&self) -> std::os::unix::io::RawFd;
}

/// Handle for a child process spawned on a PTY.
pub trait PtyChild: Send + Sync {
    /// Get the process ID of the child.
    fn pid(&self) -> u32;

    /// Wait for the child process to exit and reap it.
    fn wait(&mut self) -> impl Future<Output = Result<ExitStatus>> + Send;

    /// Send SIGHUP, as a terminal hang-up would.
    fn hang_up(&self) -> Result<()>;

    /// Kill the child process with SIGKILL.
    fn kill(&mut self) -> Result<()>;
}

/// Exit status of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The process exited normally with the given exit code.
    Exited(i32),

    /// The process was terminated by a signal.
    Signaled(i32),
}

impl ExitStatus {
    /// Check if the process exited successfully (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Get the exit code, if the process exited normally.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
        }
    }

    /// Get the signal number that terminated the process.
    #[must_use]
    pub const fn signal(&self) -> Option<i32> {
        match self {
            Self::Signaled(sig) => Some(*sig),
            Self::Exited(_) => None,
        }
    }

    /// Status as a shell would report it: the exit code, or 128 plus the signal.
    #[must_use]
    pub const fn shell_code(&self) -> u32 {
        match self {
            Self::Exited(code) => *code as u32,
            Self::Signaled(sig) => 128 + *sig as u32,
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(sig) => write!(f, "terminated by signal {sig}"),
        }
    }
}

/// Factory trait for creating PTY sessions.
pub trait PtySystem: Send + Sync {
    /// The master PTY type for this platform.
    type Master: PtyMaster;
    /// The child process type for this platform.
    type Child: PtyChild;

    /// Allocate a PTY sized from `config` and spawn `program` on its slave side.
    fn spawn<S, I>(
        program: S,
        args: I,
        config: &PtyConfig,
    ) -> impl Future<Output = Result<(Self::Master, Self::Child)>> + Send
    where
        S: AsRef<OsStr> + Send,
        I: IntoIterator + Send,
        I::Item: AsRef<OsStr>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_success() {
        let status = ExitStatus::Exited(0);
        assert!(status.success());
        assert_eq!(status.code(), Some(0));
        assert_eq!(status.shell_code(), 0);
    }

    #[test]
    fn exit_status_failure() {
        let status = ExitStatus::Exited(3);
        assert!(!status.success());
        assert_eq!(status.shell_code(), 3);
    }

    #[test]
    fn exit_status_signaled() {
        let status = ExitStatus::Signaled(9);
        assert!(!status.success());
        assert_eq!(status.code(), None);
        assert_eq!(status.signal(), Some(9));
        assert_eq!(status.shell_code(), 137);
    }
}
