//! On-disk TOML configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{DEFAULT_PORT, DEFAULT_SFTP_SERVER, DEFAULT_SHELL, DEFAULT_TIMEOUT_SECS, DEFAULT_USER};
use crate::error::ConfigError;

/// Contents written when no configuration file exists.
///
/// The password is a placeholder that the server warns about on every start.
pub const DEFAULT_CONFIG_TOML: &str = r#"# shellgate configuration

[ssh]
port = 2222
user = "root"
# Plaintext, bcrypt ($2a$/$2b$/$2y$) or Argon2 ($argon2id$...).
# Generate a hash with `shellgate hash-password`. Leave empty to disable authentication.
password = "password"
# Seconds; applies to both limits below unless they are set. 0 disables.
timeout = 300
# idle_timeout = 300
# max_connection_time = 300
shell = "sh"

[sftp]
enable = true
server_path = "/usr/lib/openssh/sftp-server"

[log]
# auth_log = "/root/ssh.log"
"#;

/// Parsed configuration file. Missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// `[ssh]` section.
    pub ssh: SshSection,
    /// `[sftp]` section.
    pub sftp: SftpSection,
    /// `[log]` section.
    pub log: LogSection,
}

/// `[ssh]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SshSection {
    /// Listen port.
    pub port: u16,
    /// The only accepted username.
    pub user: String,
    /// Stored credential; absent or empty disables authentication.
    pub password: Option<String>,
    /// Seconds applied to both limits unless overridden.
    pub timeout: u64,
    /// Idle limit in seconds.
    pub idle_timeout: Option<u64>,
    /// Lifetime limit in seconds.
    pub max_connection_time: Option<u64>,
    /// Program started for shell sessions.
    pub shell: String,
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            password: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            idle_timeout: None,
            max_connection_time: None,
            shell: DEFAULT_SHELL.to_string(),
        }
    }
}

/// `[sftp]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SftpSection {
    /// Route `sftp` subsystem requests to the file-transfer server.
    pub enable: bool,
    /// External sftp-server binary.
    pub server_path: PathBuf,
}

impl Default for SftpSection {
    fn default() -> Self {
        Self {
            enable: true,
            server_path: PathBuf::from(DEFAULT_SFTP_SERVER),
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    /// Audit log path; defaults to `ssh.log` in the home directory.
    pub auth_log: Option<PathBuf>,
}

impl ConfigFile {
    /// Parse TOML text.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse the file at `path`.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Write [`DEFAULT_CONFIG_TOML`] to `path`.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, DEFAULT_CONFIG_TOML).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
