//! kcc - Karachi Coffee Culture cafe dashboard CLI

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use kcc_http::ClientError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "kcc")]
#[command(about = "Manage a Karachi Coffee Culture cafe from the terminal")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Data directory for the session cookie, config and logs
    #[arg(short = 'd', long, global = true)]
    data_dir: Option<PathBuf>,

    /// Client configuration file (defaults to <data-dir>/config.toml when present)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Timeout for the whole command in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "60")]
    timeout: u64,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = config::resolve_data_dir(cli.data_dir);
    logging::init_logging(cli.log_level.into(), &data_dir, cli.no_file_log)?;

    debug!(data_dir = %data_dir.display(), "Starting kcc");

    let client_config = config::load_client_config(cli.config.as_deref(), &data_dir)?;
    let client = config::connect(client_config, &data_dir)?;

    let outcome = if cli.timeout == 0 {
        cli.command.execute(client).await
    } else {
        let timeout_duration = Duration::from_secs(cli.timeout);
        match tokio::time::timeout(timeout_duration, cli.command.execute(client)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Command timed out after {} seconds", cli.timeout);
                std::process::exit(1);
            }
        }
    };

    if let Err(e) = outcome {
        error!("Command failed: {e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }

    Ok(())
}

/// 2 when the user has to sign in (again), 1 for any other failure
fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<ClientError>() {
        Some(client_error) if client_error.is_auth_expired() => 2,
        _ => 1,
    }
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kcc_http::RefreshFailure;

    #[test]
    fn test_exit_code_flags_expired_sessions() {
        let expired = anyhow::Error::new(ClientError::RefreshFailed(RefreshFailure::status(
            401,
            "revoked",
        )));
        assert_eq!(exit_code(&expired), 2);

        let rejected = anyhow::Error::new(ClientError::AuthenticationFailed(String::new()))
            .context("loading cafe");
        assert_eq!(exit_code(&rejected), 2);

        let not_found = anyhow::Error::new(ClientError::NotFound("event".to_string()));
        assert_eq!(exit_code(&not_found), 1);
        assert_eq!(exit_code(&anyhow::anyhow!("not signed in")), 1);
    }
}
