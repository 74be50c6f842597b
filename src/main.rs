use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxwatch::cli::setup::setup;
use fxwatch::core::config::DEFAULT_MONITORING_INTERVAL;
use fxwatch::core::log::init_logging;
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fxwatch::AppCommand {
    fn from(cmd: Commands) -> fxwatch::AppCommand {
        match cmd {
            Commands::Rate {
                source,
                target,
                update,
            } => fxwatch::AppCommand::Rate {
                source,
                target,
                update,
            },
            Commands::Alert {
                source,
                target,
                threshold,
                below,
            } => fxwatch::AppCommand::Alert {
                source,
                target,
                threshold,
                below,
            },
            Commands::RemoveAlert { source, target } => {
                fxwatch::AppCommand::RemoveAlert { source, target }
            }
            Commands::Alerts => fxwatch::AppCommand::Alerts,
            Commands::Update => fxwatch::AppCommand::Update,
            Commands::Monitor { interval } => fxwatch::AppCommand::Monitor { interval },
            Commands::Currencies => fxwatch::AppCommand::Currencies,
            Commands::Config => fxwatch::AppCommand::Config,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show the exchange rate for a currency pair
    Rate {
        /// Source currency code, e.g. USD
        source: String,
        /// Target currency code, e.g. EUR
        target: String,
        /// Ignore the cache and fetch a fresh rate
        #[arg(short, long)]
        update: bool,
    },
    /// Set a threshold alert for a currency pair
    Alert {
        source: String,
        target: String,
        threshold: Decimal,
        /// Alert when the rate goes below the threshold
        #[arg(long)]
        below: bool,
    },
    /// Remove the alert for a currency pair
    RemoveAlert { source: String, target: String },
    /// List all alerts
    Alerts,
    /// Refresh all cached exchange rates
    Update,
    /// Check alerts periodically until interrupted
    Monitor {
        /// Seconds between checks (60-3600)
        #[arg(short, long, default_value_t = DEFAULT_MONITORING_INTERVAL)]
        interval: u64,
    },
    /// List supported currency codes
    Currencies,
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => fxwatch::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
