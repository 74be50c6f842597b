pub mod alerts;
pub mod app;
pub mod cli;
pub mod core;
pub mod exchange;
pub mod providers;
pub mod store;

pub use crate::core::config;

use crate::app::App;
use anyhow::Result;
use rust_decimal::Decimal;
use std::path::Path;
use tracing::{debug, info};

/// Commands that run against a loaded configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Rate {
        source: String,
        target: String,
        update: bool,
    },
    Alert {
        source: String,
        target: String,
        threshold: Decimal,
        below: bool,
    },
    RemoveAlert {
        source: String,
        target: String,
    },
    Alerts,
    Update,
    Monitor {
        interval: u64,
    },
    Currencies,
    Config,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxwatch starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Currencies => {
            cli::info::currencies();
            return Ok(());
        }
        AppCommand::Config => return cli::info::config(&config, config_path.map(Path::new)),
        _ => {}
    }

    let mut app = App::new(config)?;
    let result = match command {
        AppCommand::Rate {
            source,
            target,
            update,
        } => cli::rate::run(&mut app, &source, &target, update).await,
        AppCommand::Alert {
            source,
            target,
            threshold,
            below,
        } => cli::alerts::add(&mut app, &source, &target, threshold, below),
        AppCommand::RemoveAlert { source, target } => {
            cli::alerts::remove(&mut app, &source, &target)
        }
        AppCommand::Alerts => cli::alerts::list(&app),
        AppCommand::Update => cli::rate::update(&mut app).await,
        AppCommand::Monitor { interval } => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    std::future::pending::<()>().await;
                }
            };
            cli::alerts::monitor(&mut app, interval, shutdown).await
        }
        AppCommand::Currencies | AppCommand::Config => Ok(()),
    };

    app.close().await;
    result
}
