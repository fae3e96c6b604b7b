//! Command-line interface.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::auth::{Argon2Config, hash_argon2id, hash_bcrypt};
use crate::error::AuthError;
use crate::logging::LogFormat;

/// Default bcrypt cost for `hash-password`.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Log output format for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => Self::Text,
            CliLogFormat::Json => Self::Json,
        }
    }
}

/// Hash scheme produced by `hash-password`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum HashScheme {
    /// `$argon2id$v=19$...`
    #[default]
    Argon2id,
    /// `$2b$...`
    Bcrypt,
}

impl HashScheme {
    /// Hash `password`; `cost` applies to bcrypt only.
    pub fn hash(self, password: &str, cost: u32) -> Result<String, AuthError> {
        match self {
            Self::Argon2id => hash_argon2id(password, &Argon2Config::default()),
            Self::Bcrypt => hash_bcrypt(password, cost),
        }
    }
}

/// shellgate - password-authenticated SSH shell and SFTP endpoint.
#[derive(Debug, Parser)]
#[command(name = "shellgate", version, about)]
pub struct Cli {
    /// Configuration file (default: shellgate.toml in the first writable of /, $HOME, .)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (can be repeated: -v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long = "log-format", default_value = "text", global = true)]
    pub log_format: CliLogFormat,

    /// What to do (default: serve)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the SSH server until `q` is entered or a termination signal arrives
    Serve,

    /// Read a password from stdin and print a hash for the config file
    HashPassword {
        /// Hash scheme
        #[arg(long = "scheme", default_value = "argon2id")]
        scheme: HashScheme,

        /// bcrypt cost factor
        #[arg(long = "cost", default_value_t = DEFAULT_BCRYPT_COST)]
        cost: u32,
    },
}

impl Cli {
    /// The subcommand to run, `serve` when none was given.
    #[must_use]
    pub fn action(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
