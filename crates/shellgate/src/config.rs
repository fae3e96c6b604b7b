//! Server configuration.
//!
//! The configuration is resolved once at startup from the TOML file plus
//! environment overrides and then shared read-only through an `Arc`.
//!
//! # Sources (later wins)
//!
//! 1. Built-in defaults
//! 2. `shellgate.toml` in the first writable of `/`, `$HOME`, `.` (or `--config`)
//! 3. `SSH_PORT`, `SSH_USER`, `SSH_PASSWORD`, `SSH_TIMEOUT`, `SFTP_ENABLE`

pub mod env;
pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use env::EnvConfig;
use env::vars;
pub use file::{ConfigFile, DEFAULT_CONFIG_TOML};

use crate::auth::CredentialVerifier;
use crate::error::ConfigError;
use crate::paths;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 2222;

/// Default login user.
pub const DEFAULT_USER: &str = "root";

/// Password written into a freshly created config file.
pub const PLACEHOLDER_PASSWORD: &str = "password";

/// Default idle and lifetime limit in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default program for shell sessions.
pub const DEFAULT_SHELL: &str = "sh";

/// Default external sftp-server binary.
pub const DEFAULT_SFTP_SERVER: &str = "/usr/lib/openssh/sftp-server";

/// Configuration file name inside the chosen directory.
pub const CONFIG_FILE_NAME: &str = "shellgate.toml";

/// Audit log file name inside the home directory.
pub const AUTH_LOG_FILE_NAME: &str = "ssh.log";

/// File-transfer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpConfig {
    /// Route `sftp` subsystem requests to the file-transfer server.
    pub enable: bool,
    /// External sftp-server binary.
    pub server_path: PathBuf,
}

/// Fully resolved server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,
    /// The only accepted username.
    pub user: String,
    /// Stored credential; `None` disables authentication.
    pub password: Option<String>,
    /// Close connections with no traffic for this long.
    pub idle_timeout: Option<Duration>,
    /// Close connections older than this.
    pub max_connection_time: Option<Duration>,
    /// Program started for shell sessions.
    pub shell: String,
    /// File-transfer settings.
    pub sftp: SftpConfig,
    /// Audit log file.
    pub auth_log: PathBuf,
    /// Directories searched for the host key, in order.
    pub host_key_dirs: Vec<PathBuf>,
    /// File the configuration was read from.
    pub config_path: PathBuf,
    /// Whether this start wrote a default configuration file.
    pub created_default: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("user", &self.user)
            .field("auth", &self.verifier().map(|v| v.scheme()))
            .field("idle_timeout", &self.idle_timeout)
            .field("max_connection_time", &self.max_connection_time)
            .field("shell", &self.shell)
            .field("sftp", &self.sftp)
            .field("auth_log", &self.auth_log)
            .field("config_path", &self.config_path)
            .finish()
    }
}

impl ServerConfig {
    /// Load from `--config` or the default location, applying environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(explicit, &paths::default_candidates(), &EnvConfig::process())
    }

    /// Load with explicit candidate directories and environment source.
    ///
    /// A missing file is created from [`DEFAULT_CONFIG_TOML`].
    pub fn load_with(
        explicit: Option<&Path>,
        candidates: &[PathBuf],
        env: &EnvConfig,
    ) -> Result<Self, ConfigError> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => paths::first_writable(candidates)
                .ok_or_else(|| ConfigError::NoWritableLocation {
                    tried: candidates.to_vec(),
                })?
                .join(CONFIG_FILE_NAME),
        };

        let created_default = !config_path.exists();
        if created_default {
            tracing::warn!(
                path = %config_path.display(),
                "Configuration file not found, creating default with placeholder password"
            );
            ConfigFile::write_default(&config_path)?;
        }

        let file = ConfigFile::read(&config_path)?;
        let mut config = Self::from_file(file, candidates.to_vec(), config_path);
        config.created_default = created_default;
        config.apply_env(env)?;
        Ok(config)
    }

    /// Resolve a parsed file into a configuration.
    #[must_use]
    pub fn from_file(file: ConfigFile, host_key_dirs: Vec<PathBuf>, config_path: PathBuf) -> Self {
        let ssh = file.ssh;
        let auth_log = file.log.auth_log.unwrap_or_else(|| {
            paths::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(AUTH_LOG_FILE_NAME)
        });

        Self {
            port: ssh.port,
            user: ssh.user,
            password: ssh.password.filter(|p| !p.is_empty()),
            idle_timeout: limit(ssh.idle_timeout.unwrap_or(ssh.timeout)),
            max_connection_time: limit(ssh.max_connection_time.unwrap_or(ssh.timeout)),
            shell: ssh.shell,
            sftp: SftpConfig {
                enable: file.sftp.enable,
                server_path: file.sftp.server_path,
            },
            auth_log,
            host_key_dirs,
            config_path,
            created_default: false,
        }
    }

    /// Apply `SSH_*` and `SFTP_ENABLE` overrides.
    pub fn apply_env(&mut self, env: &EnvConfig) -> Result<(), ConfigError> {
        let invalid = |var: &str, value: String| ConfigError::InvalidEnv {
            var: env.full_name(var),
            value,
        };

        if let Some(port) = env.parse::<u16>(vars::SSH_PORT) {
            self.port = port.map_err(|v| invalid(vars::SSH_PORT, v))?;
        }
        if let Some(user) = env.get(vars::SSH_USER) {
            self.user = user;
        }
        if let Some(password) = env.get(vars::SSH_PASSWORD) {
            self.password = Some(password).filter(|p| !p.is_empty());
        }
        if let Some(timeout) = env.duration_secs(vars::SSH_TIMEOUT) {
            let timeout = timeout.map_err(|v| invalid(vars::SSH_TIMEOUT, v))?;
            let timeout = limit(timeout.as_secs());
            self.idle_timeout = timeout;
            self.max_connection_time = timeout;
        }
        if let Some(enable) = env.bool(vars::SFTP_ENABLE) {
            self.sftp.enable = enable;
        }
        Ok(())
    }

    /// Verifier for the configured password, `None` when authentication is disabled.
    #[must_use]
    pub fn verifier(&self) -> Option<CredentialVerifier> {
        self.password.as_deref().map(CredentialVerifier::new)
    }

    /// Whether the stored password is the placeholder from the default file.
    #[must_use]
    pub fn uses_placeholder_password(&self) -> bool {
        self.password.as_deref() == Some(PLACEHOLDER_PASSWORD)
    }
}

/// Seconds to an optional limit; zero disables it.
fn limit(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
