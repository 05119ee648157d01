// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the Modbus register bridge
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{error, info};

use rust_modbus_bridge::config::{self, Config};
use rust_modbus_bridge::daemon::{wait_for_shutdown_signal, Supervisor};
use rust_modbus_bridge::logging;
use rust_modbus_bridge::modbus::REGISTER_MAP;

/// Publishes channel files as Modbus input registers
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Print the register to channel handle map and exit
    #[arg(long)]
    print_register_map: bool,

    /// Modbus server address
    #[arg(long)]
    modbus_address: Option<String>,

    /// Modbus server port
    #[arg(long)]
    modbus_port: Option<u16>,

    /// Configuration listener address
    #[arg(long)]
    listener_address: Option<String>,

    /// Configuration listener port
    #[arg(long)]
    listener_port: Option<u16>,

    /// SPOT channel file
    #[arg(long)]
    spot_file: Option<PathBuf>,

    /// PARAM channel file
    #[arg(long)]
    param_file: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

fn print_register_map() {
    println!("{:<8} {:<6} {:>7}", "register", "range", "channel");
    for entry in REGISTER_MAP.iter() {
        println!(
            "{:<8} {:<6} {:>7}",
            entry.address, entry.range, entry.channel
        );
    }
}

/// Load the configuration and run the bridge until a signal or a fault.
///
/// `Ok(false)` means the supervisor stopped on a fatal fault.
async fn run(args: Args) -> Result<bool> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    config.apply_args(
        args.modbus_address.clone(),
        args.modbus_port,
        args.listener_address.clone(),
        args.listener_port,
        args.spot_file.clone(),
        args.param_file.clone(),
    );
    config::utils::validate_specific_rules(&config)?;

    logging::init(&config.logging, args.verbose, args.quiet)?;
    info!("Configuration loaded from {}", config_path.display());

    let mut supervisor = Supervisor::from_config(&config)?;
    let shutdown = supervisor.shutdown_token();
    tokio::spawn(async move {
        if let Err(err) = wait_for_shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", err);
            return;
        }
        shutdown.cancel();
    });

    Ok(supervisor.run().await.is_ok())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if args.show_config_schema {
        config::output_config_schema()?;
        return Ok(ExitCode::SUCCESS);
    }

    if args.print_register_map {
        print_register_map();
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(validate_path) = &args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }

        Config::from_file(validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {:#}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    if run(args).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
