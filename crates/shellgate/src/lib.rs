//! shellgate: password-authenticated SSH shell and SFTP endpoint
//!
//! A single configured user logs in with a password stored as plaintext,
//! bcrypt or Argon2. Each session channel gets the configured shell on a
//! fresh pseudo-terminal, or an external `sftp-server` for the `sftp`
//! subsystem. Every login attempt is appended to an audit log.
//!
//! # Components
//!
//! - [`auth`]: credential classification and verification, audit log
//! - [`hostkey`]: persistent RSA identity key
//! - [`session`]: PTY session bridge
//! - [`sftp`]: file-transfer collaborator
//! - [`server`]: accept loop, per-connection handler and timeouts
//! - [`config`]: TOML file plus environment overrides
//!
//! # Quick Start
//!
//! ```ignore
//! use shellgate::{ServerConfig, console, server};
//!
//! let config = ServerConfig::load(None)?;
//! server::run(config, async {
//!     console::shutdown_requested().await;
//! })
//! .await?;
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod hostkey;
pub mod logging;
pub mod paths;
pub mod server;
pub mod session;
pub mod sftp;

// Re-export primary types
pub use auth::{CredentialVerifier, Scheme};
pub use config::ServerConfig;
pub use error::{AuthError, ConfigError, HostKeyError, Result, ServerError};
pub use hostkey::HostKey;
pub use server::Server;
pub use session::{PtyRequest, SessionBridge, SessionEnd, SessionOutcome, SessionState};
pub use sftp::{FileTransfer, SftpServerProcess};
