//! Configuration types for PTY creation.
//!
//! [`PtyConfig`] describes how the child is spawned and [`WindowSize`] the
//! terminal geometry.

use std::collections::HashMap;
use std::ffi::OsString;

/// Configuration for spawning a process on a new PTY.
///
/// The child inherits the parent's environment plus [`PtyConfig::env`] and
/// always runs as a session leader with the PTY as its controlling terminal.
///
/// # Example
///
/// ```
/// use shellgate_pty::{PtyConfig, WindowSize};
///
/// let config = PtyConfig::builder()
///     .env("TERM", "xterm-256color")
///     .initial_size(WindowSize::new(80, 24))
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct PtyConfig {
    /// Variables set on top of the inherited environment.
    pub env: HashMap<OsString, OsString>,

    /// Initial window size.
    pub window_size: WindowSize,
}

impl PtyConfig {
    /// Create a new builder for `PtyConfig`.
    #[must_use]
    pub fn builder() -> PtyConfigBuilder {
        PtyConfigBuilder::default()
    }
}

/// Builder for [`PtyConfig`].
#[derive(Debug, Clone, Default)]
pub struct PtyConfigBuilder {
    config: PtyConfig,
}

impl PtyConfigBuilder {
    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.config.env.insert(key.into(), value.into());
        self
    }

    /// Set the initial window size.
    #[must_use]
    pub const fn initial_size(mut self, size: WindowSize) -> Self {
        self.config.window_size = size;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> PtyConfig {
        self.config
    }
}

/// Window size for the PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of columns (characters per line).
    pub cols: u16,
    /// Number of rows (lines).
    pub rows: u16,
    /// Pixel width (optional, often 0).
    pub xpixel: u16,
    /// Pixel height (optional, often 0).
    pub ypixel: u16,
}

impl WindowSize {
    /// Create a new window size with the given dimensions.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            xpixel: 0,
            ypixel: 0,
        }
    }

    /// Create a window size with pixel dimensions.
    #[must_use]
    pub const fn with_pixels(cols: u16, rows: u16, xpixel: u16, ypixel: u16) -> Self {
        Self {
            cols,
            rows,
            xpixel,
            ypixel,
        }
    }

    /// Build a window size from 32-bit wire values, saturating at `u16::MAX`.
    #[must_use]
    pub fn saturating(cols: u32, rows: u32, xpixel: u32, ypixel: u32) -> Self {
        let clamp = |v: u32| u16::try_from(v).unwrap_or(u16::MAX);
        Self::with_pixels(clamp(cols), clamp(rows), clamp(xpixel), clamp(ypixel))
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = PtyConfig::builder()
            .env("TERM", "vt100")
            .initial_size(WindowSize::new(120, 40))
            .build();

        assert_eq!(config.window_size, WindowSize::new(120, 40));
        assert_eq!(
            config.env.get(&OsString::from("TERM")),
            Some(&OsString::from("vt100"))
        );
    }

    #[test]
    fn later_env_value_wins() {
        let config = PtyConfig::builder()
            .env("TERM", "vt100")
            .env("TERM", "xterm")
            .build();
        assert_eq!(config.env.len(), 1);
        assert_eq!(
            config.env.get(&OsString::from("TERM")),
            Some(&OsString::from("xterm"))
        );
    }

    #[test]
    fn window_size_saturates() {
        let size = WindowSize::saturating(100_000, 50, 0, 70_000);
        assert_eq!(size.cols, u16::MAX);
        assert_eq!(size.rows, 50);
        assert_eq!(size.ypixel, u16::MAX);
    }
}
