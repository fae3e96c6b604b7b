//! Console logging setup.
//!
//! Authentication attempts are logged at `info`/`warn`, so the default level
//! is `info`. `RUST_LOG` overrides the verbosity flags.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::ServerError;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Level for a `-v` count: 0=info, 1=debug, 2+=trace.
#[must_use]
pub const fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Filter directives for both shellgate crates at `level`.
#[must_use]
pub fn directives(level: &str) -> String {
    format!("shellgate={level},shellgate_pty={level}")
}

/// Initialize the global subscriber, writing to stderr.
pub fn init_logging(verbosity: u8, format: LogFormat) -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(level_for(verbosity))));

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbosity >= 1)
                    .with_file(verbosity >= 2)
                    .with_line_number(verbosity >= 2),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| ServerError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(0), "info");
        assert_eq!(level_for(1), "debug");
        assert_eq!(level_for(2), "trace");
        assert_eq!(level_for(9), "trace");
    }

    #[test]
    fn directives_cover_both_crates() {
        assert_eq!(directives("debug"), "shellgate=debug,shellgate_pty=debug");
    }

    #[test]
    fn second_init_fails() {
        // Whichever call comes first in this process may succeed; a repeat never does
        let _ = init_logging(0, LogFormat::Text);
        assert!(matches!(
            init_logging(0, LogFormat::Json),
            Err(ServerError::Logging(_))
        ));
    }
}
