//! Lingua presence CLI, running presence sessions against the in-memory realtime hub.
//!
//! Main entry point that loads configuration, sets up logging and runs the
//! requested command.

mod simulate;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use lingua_core::config::AppConfig;
use lingua_core::error::AppError;

/// Lingua presence tracking core
#[derive(Debug, Parser)]
#[command(name = "lingua-presence", version, about, long_about = None)]
struct Cli {
    /// Configuration environment (config/<env>.toml is layered over config/default.toml)
    #[arg(short, long, default_value = "development")]
    env: String,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Bring several clients online on one in-memory presence topic
    Simulate(simulate::SimulateArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(cli, config).await {
        tracing::error!("Presence error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging. Logs go to stderr so stdout carries the report.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        "Starting lingua-presence v{} (env: {})",
        env!("CARGO_PKG_VERSION"),
        cli.env
    );

    match cli.command {
        Commands::Simulate(args) => simulate::execute(&args, &config).await,
    }
}
