//! Unix child process management for PTY sessions.

use std::ffi::OsStr;
use std::io;
use std::os::unix::io::OwnedFd;
use std::process::{ExitStatus as StdExitStatus, Stdio};

use rustix::process::{Pid, Signal, kill_process};
use tokio::process::{Child as TokioChild, Command};

use crate::config::PtyConfig;
use crate::error::{PtyError, Result, errno_to_io};
use crate::traits::{ExitStatus, PtyChild};

/// Unix child process handle.
///
/// Wraps the tokio child so reaping goes through tokio's SIGCHLD driver.
pub struct UnixPtyChild {
    /// The underlying tokio child process.
    child: TokioChild,
    /// The process ID.
    pid: u32,
    /// Cached exit status once reaped.
    exit_status: Option<ExitStatus>,
}

impl std::fmt::Debug for UnixPtyChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixPtyChild")
            .field("pid", &self.pid)
            .field("exit_status", &self.exit_status)
            .finish()
    }
}

impl UnixPtyChild {
    /// Wrap a freshly spawned tokio child.
    pub fn new(child: TokioChild) -> Result<Self> {
        let pid = child.id().ok_or_else(|| {
            PtyError::Spawn(io::Error::other("child exited before its pid was read"))
        })?;
        Ok(Self {
            child,
            pid,
            exit_status: None,
        })
    }

    /// Get the process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Wait for the child process to exit.
    ///
    /// Cancel safe: dropping the future leaves the child waitable.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }

        let status = self.child.wait().await.map_err(PtyError::Wait)?;
        let status = convert_exit_status(status);
        self.exit_status = Some(status);
        Ok(status)
    }

    /// Send SIGHUP to the child.
    ///
    /// Fails with [`PtyError::ProcessExited`] once the child has been reaped.
    pub fn hang_up(&self) -> Result<()> {
        if let Some(status) = self.exit_status {
            return Err(PtyError::ProcessExited(status.code().unwrap_or(-1)));
        }

        let pid = Pid::from_raw(self.pid as i32).ok_or_else(|| {
            PtyError::Signal(io::Error::new(io::ErrorKind::InvalidInput, "invalid pid"))
        })?;
        let signal = Signal::from_named_raw(libc::SIGHUP).ok_or_else(|| {
            PtyError::Signal(io::Error::new(io::ErrorKind::InvalidInput, "invalid signal"))
        })?;

        kill_process(pid, signal).map_err(|e| PtyError::Signal(errno_to_io(e)))
    }

    /// Kill the child process (SIGKILL).
    pub fn kill(&mut self) -> Result<()> {
        if self.exit_status.is_some() {
            return Ok(());
        }
        self.child.start_kill().map_err(PtyError::Signal)
    }
}

impl PtyChild for UnixPtyChild {
    fn pid(&self) -> u32 {
        Self::pid(self)
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        Self::wait(self).await
    }

    fn hang_up(&self) -> Result<()> {
        Self::hang_up(self)
    }

    fn kill(&mut self) -> Result<()> {
        Self::kill(self)
    }
}

/// Convert `std::process::ExitStatus` to our `ExitStatus`.
fn convert_exit_status(status: StdExitStatus) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    if let Some(code) = status.code() {
        ExitStatus::Exited(code)
    } else if let Some(signal) = status.signal() {
        ExitStatus::Signaled(signal)
    } else {
        ExitStatus::Exited(-1)
    }
}

/// Spawn a child process with the slave PTY as its stdin, stdout and stderr.
pub fn spawn_child<S, I>(
    slave_fd: OwnedFd,
    program: S,
    args: I,
    config: &PtyConfig,
) -> Result<UnixPtyChild>
where
    S: AsRef<OsStr>,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let mut cmd = Command::new(program.as_ref());
    cmd.args(args);
    cmd.envs(&config.env);
    cmd.kill_on_drop(true);

    cmd.stdin(Stdio::from(slave_fd.try_clone().map_err(PtyError::Spawn)?));
    cmd.stdout(Stdio::from(slave_fd.try_clone().map_err(PtyError::Spawn)?));
    cmd.stderr(Stdio::from(slave_fd));

    // SAFETY: setsid and ioctl are async-signal-safe; stdin is the slave by now
    #[allow(unsafe_code)]
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }

            if libc::ioctl(libc::STDIN_FILENO, libc::TIOCSCTTY, 0) == -1 {
                return Err(io::Error::last_os_error());
            }

            Ok(())
        });
    }

    let child = cmd.spawn().map_err(PtyError::Spawn)?;
    UnixPtyChild::new(child)
}
