//! shellgate binary entry point.

use std::io::{self, BufRead};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use shellgate::cli::{Cli, Command, HashScheme};
use shellgate::console::{self, ShutdownReason};
use shellgate::logging::init_logging;
use shellgate::{ServerConfig, server};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_format.into()) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match cli.action() {
        Command::Serve => serve(&cli).await,
        Command::HashPassword { scheme, cost } => hash_password(scheme, cost),
    }
}

async fn serve(cli: &Cli) -> ExitCode {
    info!(version = env!("CARGO_PKG_VERSION"), "shellgate starting");

    let config = match ServerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(
        path = %config.config_path.display(),
        port = config.port,
        user = %config.user,
        idle_timeout = ?config.idle_timeout,
        max_connection_time = ?config.max_connection_time,
        sftp = config.sftp.enable,
        "Configuration loaded"
    );
    info!("Type 'q' and press Enter to stop");

    let shutdown = async {
        match console::shutdown_requested().await {
            ShutdownReason::Quit => info!("Quit requested"),
            ShutdownReason::Signal(signal) => info!(signal, "Termination signal received"),
        }
    };

    match server::run(config, shutdown).await {
        Ok(()) => {
            info!("shellgate stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

fn hash_password(scheme: HashScheme, cost: u32) -> ExitCode {
    let mut line = String::new();
    if let Err(e) = io::stdin().lock().read_line(&mut line) {
        eprintln!("failed to read password from stdin: {e}");
        return ExitCode::FAILURE;
    }

    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        eprintln!("empty password; an empty password disables authentication instead");
        return ExitCode::FAILURE;
    }

    match scheme.hash(password, cost) {
        Ok(hash) => {
            println!("{hash}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
