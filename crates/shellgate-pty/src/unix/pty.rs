//! Unix PTY allocation and master-side I/O.

use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use rustix::fs::{Mode, OFlags, fcntl_setfl, open};
use rustix::io::Errno;
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{Winsize, tcgetwinsize, tcsetwinsize};
use tokio::io::unix::AsyncFd;

use crate::config::WindowSize;
use crate::error::{PtyError, Result, errno_to_io};
use crate::traits::PtyMaster;

/// Unix PTY master implementation.
///
/// Reads and writes go through tokio readiness on a non-blocking descriptor,
/// so any number of tasks may hold a shared reference.
pub struct UnixPtyMaster {
    /// The master file descriptor wrapped for async I/O.
    async_fd: AsyncFd<OwnedFd>,
    /// Whether the PTY is still open.
    open: AtomicBool,
}

impl std::fmt::Debug for UnixPtyMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixPtyMaster")
            .field("fd", &self.async_fd.as_raw_fd())
            .field("open", &self.open.load(Ordering::SeqCst))
            .finish()
    }
}

impl UnixPtyMaster {
    /// Allocate a new pseudo-terminal pair and return the master with the slave path.
    ///
    /// # Errors
    ///
    /// Returns an error if PTY allocation fails.
    pub fn open() -> Result<(Self, String)> {
        let create = |e: Errno| PtyError::Create(errno_to_io(e));

        let master_fd = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY).map_err(create)?;
        grantpt(&master_fd).map_err(create)?;
        unlockpt(&master_fd).map_err(create)?;

        let slave_name = ptsname(&master_fd, Vec::new()).map_err(create)?;
        let slave_path = slave_name
            .to_str()
            .map_err(|_| {
                PtyError::Create(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "invalid slave path encoding",
                ))
            })?
            .to_string();

        fcntl_setfl(&master_fd, OFlags::NONBLOCK).map_err(create)?;

        let async_fd = AsyncFd::new(master_fd).map_err(PtyError::Create)?;

        Ok((
            Self {
                async_fd,
                open: AtomicBool::new(true),
            },
            slave_path,
        ))
    }

    /// Check if the PTY is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Set the window size.
    pub fn set_window_size(&self, size: WindowSize) -> Result<()> {
        if !self.is_open() {
            return Err(PtyError::Closed);
        }

        let winsize = Winsize {
            ws_col: size.cols,
            ws_row: size.rows,
            ws_xpixel: size.xpixel,
            ws_ypixel: size.ypixel,
        };

        tcsetwinsize(self.async_fd.get_ref(), winsize)
            .map_err(|e| PtyError::Resize(errno_to_io(e)))
    }

    /// Get the current window size.
    pub fn get_window_size(&self) -> Result<WindowSize> {
        if !self.is_open() {
            return Err(PtyError::Closed);
        }

        let winsize = tcgetwinsize(self.async_fd.get_ref())
            .map_err(|e| PtyError::GetAttributes(errno_to_io(e)))?;

        Ok(WindowSize::with_pixels(
            winsize.ws_col,
            winsize.ws_row,
            winsize.ws_xpixel,
            winsize.ws_ypixel,
        ))
    }

    /// Read terminal output.
    ///
    /// Linux reports `EIO` on the master once the last slave descriptor is
    /// closed; that is end of stream here, not an error.
    pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if !self.is_open() {
                return Ok(0);
            }

            let mut guard = self.async_fd.readable().await?;

            match rustix::io::read(self.async_fd.get_ref(), &mut *buf) {
                Ok(n) => return Ok(n),
                Err(Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(Errno::INTR) => {}
                Err(Errno::IO) => return Ok(0),
                Err(e) => return Err(errno_to_io(e)),
            }
        }
    }

    /// Write terminal input.
    pub async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        loop {
            if !self.is_open() {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "PTY closed"));
            }

            let mut guard = self.async_fd.writable().await?;

            match rustix::io::write(self.async_fd.get_ref(), buf) {
                Ok(n) => return Ok(n),
                Err(Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(Errno::INTR) => {}
                Err(e) => return Err(errno_to_io(e)),
            }
        }
    }

    /// Mark the PTY master closed. The descriptor itself is released on drop.
    pub fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

impl AsRawFd for UnixPtyMaster {
    fn as_raw_fd(&self) -> RawFd {
        self.async_fd.as_raw_fd()
    }
}

impl PtyMaster for UnixPtyMaster {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        Self::read(self, buf).await
    }

    async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        Self::write(self, buf).await
    }

    fn resize(&self, size: WindowSize) -> Result<()> {
        self.set_window_size(size)
    }

    fn window_size(&self) -> Result<WindowSize> {
        self.get_window_size()
    }

    fn close(&self) -> Result<()> {
        Self::close(self)
    }

    fn is_open(&self) -> bool {
        Self::is_open(self)
    }

    fn as_raw_fd(&self) -> RawFd {
        AsRawFd::as_raw_fd(self)
    }
}

/// Open the slave side of a PTY.
pub fn open_slave(path: &str) -> Result<OwnedFd> {
    open(
        Path::new(path),
        OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC,
        Mode::empty(),
    )
    .map_err(|e| PtyError::Create(errno_to_io(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_pty() {
        let (master, slave_path) = UnixPtyMaster::open().unwrap();
        assert!(master.is_open());
        assert!(slave_path.starts_with("/dev/pts/") || slave_path.starts_with("/dev/pty"));
    }

    #[tokio::test]
    async fn window_size_operations() {
        let (master, _) = UnixPtyMaster::open().unwrap();

        let size = WindowSize::new(120, 40);
        master.set_window_size(size).unwrap();

        let retrieved = master.get_window_size().unwrap();
        assert_eq!(retrieved.cols, 120);
        assert_eq!(retrieved.rows, 40);
    }

    #[tokio::test]
    async fn closed_master_reads_eof() {
        let (master, _) = UnixPtyMaster::open().unwrap();
        master.close().unwrap();

        assert!(!master.is_open());
        let mut buf = [0u8; 8];
        assert_eq!(master.read(&mut buf).await.unwrap(), 0);
        assert!(master.write(b"x").await.is_err());
        assert!(matches!(master.set_window_size(WindowSize::default()), Err(PtyError::Closed)));
    }

    #[tokio::test]
    async fn slave_hangup_is_eof() {
        let (master, slave_path) = UnixPtyMaster::open().unwrap();
        let slave = open_slave(&slave_path).unwrap();
        rustix::io::write(&slave, b"ping").unwrap();
        drop(slave);

        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = master.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"ping");
    }
}
