//! shellgate-pty: async pseudo-terminals for remote shell sessions
//!
//! This crate allocates a Unix pseudo-terminal, spawns a child process on its
//! slave side and exposes the master side for concurrent async I/O.
//!
//! The master handle is designed to be shared: reads, writes and resizes all
//! take `&self`, so one `Arc<UnixPtyMaster>` can feed an input relay, an
//! output relay and a resize task at the same time without a lock.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use shellgate_pty::{NativePtySystem, PtyChild, PtyConfig, PtyMaster, PtySystem, WindowSize};
//!
//! let config = PtyConfig::builder()
//!     .env("TERM", "xterm")
//!     .initial_size(WindowSize::new(120, 40))
//!     .build();
//! let (master, mut child) = NativePtySystem::spawn("sh", ["-c", "echo hi"], &config).await?;
//! let master = Arc::new(master);
//!
//! let mut buf = [0u8; 1024];
//! let n = master.read(&mut buf).await?;
//! println!("{}", String::from_utf8_lossy(&buf[..n]));
//!
//! let status = child.wait().await?;
//! ```

pub mod config;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod unix;

// Re-export primary types
pub use config::{PtyConfig, PtyConfigBuilder, WindowSize};
pub use error::{PtyError, Result};
pub use traits::{ExitStatus, PtyChild, PtyMaster, PtySystem};

#[cfg(unix)]
pub use unix::{NativePtySystem, UnixPtyChild, UnixPtyMaster, UnixPtySystem};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PtyConfig::default();
        assert_eq!(config.window_size, WindowSize::new(80, 24));
        assert!(config.env.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawn_true() {
        let config = PtyConfig::default();
        let (master, mut child) = UnixPtySystem::spawn("true", std::iter::empty::<&str>(), &config)
            .await
            .unwrap();
        let status = child.wait().await.unwrap();
        assert!(status.success());
        master.close().ok();
    }
}
