// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Logger initialisation
//!
//! Records go to stderr unless `logging.file` is set, in which case they are
//! appended to that file. `--verbose`/`--quiet` set the level when given;
//! otherwise `RUST_LOG` is used, defaulting to `info`.

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::Local;
use env_logger::{Builder, Env, Target};

use crate::config::LoggingConfig;

/// Level forced by the command line flags, `--quiet` wins over `--verbose`.
///
/// `None` leaves the choice to `RUST_LOG`.
pub fn level_from_flags(verbose: bool, quiet: bool) -> Option<log::LevelFilter> {
    if quiet {
        Some(log::LevelFilter::Off)
    } else if verbose {
        Some(log::LevelFilter::Debug)
    } else {
        None
    }
}

/// Install the global logger.
///
/// Fails when the log file cannot be opened or a logger is already installed.
pub fn init(config: &LoggingConfig, verbose: bool, quiet: bool) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(level) = level_from_flags(verbose, quiet) {
        builder.filter_level(level);
    }

    if let Some(path) = &config.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        builder
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .target(Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("Failed to initialise logger")?;
    Ok(())
}
