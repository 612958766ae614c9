//! toolpanel CLI Binary
//!
//! Command-line interface for the tool registry.

use anyhow::Context;
use clap::Parser;
use std::process;
use toolpanel::cli::{Cli, RunContext};
use toolpanel::config::ConfigLoader;
use toolpanel::logging::{init_logging, LoggingConfig};
use tracing::{error, info};

fn main() {
    if let Err(e) = run() {
        error!("Command failed: {:#}", e);
        eprintln!("{:#}", e);
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    init_logging(Some(&logging_config)).context("Failed to initialize logging")?;
    info!("toolpanel CLI starting");

    let context = RunContext::new(cli.workspace.clone(), cli.config.clone(), cli.format)
        .context("Failed to load tool panel configuration")?;
    let output = context.execute(&cli.command)?;
    info!("Command completed successfully");
    println!("{}", output);
    Ok(())
}

/// Build logging configuration from CLI args and the config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
        None => ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
    };

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.format = format.clone();
    }
    config
}
