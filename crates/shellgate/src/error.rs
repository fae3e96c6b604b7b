//! Error types for shellgate.
//!
//! Each startup concern has its own enum so the binary can report exactly
//! which step failed. Per-connection problems never surface here: they are
//! logged and absorbed by the connection that hit them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error returned by [`crate::server::run`] and the binary.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be loaded or created.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The identity key could not be loaded or created.
    #[error(transparent)]
    HostKey(#[from] HostKeyError),

    /// Binding or accepting on the listen socket failed.
    #[error("failed to listen on port {port}: {source}")]
    Listen {
        /// The configured port.
        port: u16,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Logging could not be initialized.
    #[error("failed to initialize logging: {0}")]
    Logging(String),

    /// Hashing a password for the `hash-password` command failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// SSH transport failure on a connection.
    #[error("SSH transport error: {0}")]
    Transport(#[from] russh::Error),

    /// Other I/O failure during startup.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors while locating, reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// None of the candidate directories accepted a write probe.
    #[error("no writable directory for the configuration file (tried {tried:?})")]
    NoWritableLocation {
        /// Directories that were probed.
        tried: Vec<PathBuf>,
    },

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The default configuration could not be written.
    #[error("failed to write default config {path}: {source}")]
    Write {
        /// The file that was written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// The file that was parsed.
        path: PathBuf,
        /// The parser error.
        #[source]
        source: toml::de::Error,
    },

    /// An environment override holds an unusable value.
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// The environment variable name.
        var: String,
        /// The rejected value.
        value: String,
    },
}

/// Errors while loading or creating the identity key.
#[derive(Debug, Error)]
pub enum HostKeyError {
    /// None of the candidate directories accepted a write probe.
    #[error("no writable directory for the host key (tried {tried:?})")]
    NoWritableLocation {
        /// Directories that were probed.
        tried: Vec<PathBuf>,
    },

    /// RSA key generation failed.
    #[error("failed to generate RSA host key: {0}")]
    Generate(#[source] rsa::Error),

    /// PKCS#1 PEM encoding failed.
    #[error("failed to encode host key: {0}")]
    Encode(String),

    /// The key file could not be written.
    #[error("failed to write host key {path}: {source}")]
    Write {
        /// The key file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The key file could not be read.
    #[error("failed to read host key {path}: {source}")]
    Read {
        /// The key file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The key material is not a usable private key.
    #[error("failed to parse host key {path}: {reason}")]
    Parse {
        /// The key file.
        path: PathBuf,
        /// Why parsing failed.
        reason: String,
    },
}

/// Errors from the credential encoders.
///
/// Verification itself never fails; it only answers match or no match.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The Argon2 cost parameters were rejected.
    #[error("invalid Argon2 parameters: {0}")]
    Argon2Params(String),

    /// Argon2 hashing failed.
    #[error("Argon2 hashing failed: {0}")]
    Argon2(String),

    /// bcrypt hashing failed.
    #[error("bcrypt hashing failed: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// Result type alias for shellgate startup operations.
pub type Result<T> = std::result::Result<T, ServerError>;
