//! Environment-based configuration overrides.

use std::collections::HashMap;
use std::time::Duration;

/// Environment variable reader.
///
/// Reads the process environment unless built from an explicit set of
/// variables, which keeps tests free of global state. Names are looked up
/// upper-cased.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    /// Explicit variables used instead of the process environment.
    vars: Option<HashMap<String, String>>,
}

impl EnvConfig {
    /// Read from the process environment.
    #[must_use]
    pub fn process() -> Self {
        Self::default()
    }

    /// Read from the given variables instead of the process environment.
    #[must_use]
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    /// Build the full environment variable name.
    fn var_name(name: &str) -> String {
        name.to_uppercase()
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = Self::var_name(name);
        match &self.vars {
            Some(vars) => vars.get(&var_name).cloned(),
            None => std::env::var(&var_name).ok(),
        }
    }

    /// Get a parsed value, `Err` carrying the raw value when it does not parse.
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<Result<T, String>> {
        self.get(name).map(|v| v.trim().parse().map_err(|_| v))
    }

    /// Get a boolean value.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| {
            matches!(
                v.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on" | "enabled"
            )
        })
    }

    /// Get a duration in seconds.
    pub fn duration_secs(&self, name: &str) -> Option<Result<Duration, String>> {
        self.parse::<u64>(name).map(|r| r.map(Duration::from_secs))
    }

    /// Full name of a variable, for error messages.
    #[must_use]
    pub fn full_name(&self, name: &str) -> String {
        Self::var_name(name)
    }
}

/// Override variables.
pub mod vars {
    /// Listen port.
    pub const SSH_PORT: &str = "SSH_PORT";
    /// Login user.
    pub const SSH_USER: &str = "SSH_USER";
    /// Stored credential.
    pub const SSH_PASSWORD: &str = "SSH_PASSWORD";
    /// Connection timeout in seconds.
    pub const SSH_TIMEOUT: &str = "SSH_TIMEOUT";
    /// Enable the sftp subsystem.
    pub const SFTP_ENABLE: &str = "SFTP_ENABLE";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_upper_cased() {
        let env = EnvConfig::from_vars([("SSH_PORT", "2022")]);
        assert_eq!(env.full_name("ssh_port"), "SSH_PORT");
        assert_eq!(env.get("ssh_port"), Some("2022".to_string()));
    }

    #[test]
    fn explicit_vars() {
        let env = EnvConfig::from_vars([("SSH_PORT", "2022"), ("SFTP_ENABLE", "no"), ("SSH_TIMEOUT", "x")]);
        assert_eq!(env.parse::<u16>(vars::SSH_PORT), Some(Ok(2022)));
        assert_eq!(env.bool(vars::SFTP_ENABLE), Some(false));
        assert_eq!(env.duration_secs(vars::SSH_TIMEOUT), Some(Err("x".to_string())));
        assert_eq!(env.get(vars::SSH_USER), None);
    }

    #[test]
    fn bool_parsing() {
        for yes in ["1", "true", "YES", "on", "enabled"] {
            assert_eq!(EnvConfig::from_vars([("FLAG", yes)]).bool("FLAG"), Some(true));
        }
        assert_eq!(EnvConfig::from_vars([("FLAG", "0")]).bool("FLAG"), Some(false));
    }
}
