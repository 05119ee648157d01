// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the Modbus bridge
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings for the bridge. The configuration is backed by a
//! YAML file and validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! The configuration is organized as a nested structure with sections:
//! - `modbus`: Settings for the Modbus TCP server
//! - `sources`: Channel files and polling cadence
//! - `listener`: Settings for the configuration listener
//! - `logging`: Optional append-only log file
//!
//! ## Usage
//!
//! ```no_run
//! use rust_modbus_bridge::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("0.0.0.0".to_string()), // Modbus address
//!     Some(1502),                  // Modbus port
//!     None,                        // Listener address
//!     Some(5001),                  // Listener port
//!     None,                        // Spot file
//!     None,                        // Param file
//! );
//!
//! println!("Modbus port: {}", config.modbus.port);
//! ```

pub mod listener;
pub mod logging;
pub mod modbus;
pub mod sources;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use listener::{ListenerConfig, RestartPolicy};
pub use logging::LoggingConfig;
pub use modbus::ModbusConfig;
pub use sources::SourcesConfig;
pub use utils::{is_valid_ip_address, output_config_schema, resolve_socket_addr};

use crate::listener::ListenerSettings;
use crate::publisher::SourceSpec;

/// JSON schema the YAML configuration is validated against
pub const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Root configuration structure for the bridge.
///
/// Each section uses default values when not explicitly specified in the
/// configuration file, allowing for minimal configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Modbus TCP server exposing the input registers
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Channel files published into the register bank
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Raw TCP listener accepting configuration updates
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Log sink
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let sample_path = path.as_ref().with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with the default configuration. An invalid
    /// file is rejected and a `*.sample.yaml` with defaults is written next
    /// to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        Self::from_yaml_str(&contents).or_else(|err| {
            error!("Configuration error in {}: {:#}", path.display(), err);
            if let Err(e) = Self::create_sample_config(path) {
                error!("Failed to create sample config: {}", e);
            }
            Err(err.context(format!("Invalid configuration file {}", path.display())))
        })
    }

    /// Parse, schema-validate and check a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value =
            serde_yml::from_str(contents).context("Failed to parse YAML configuration")?;

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)
            .map_err(|e| anyhow::anyhow!("Invalid configuration schema: {}", e))?;

        if let Err(error) = validator.validate(&json_value) {
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config =
            serde_yml::from_str(contents).context("Failed to deserialize configuration")?;

        utils::validate_specific_rules(&config)?;
        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only explicitly provided values override the loaded configuration.
    pub fn apply_args(
        &mut self,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
        listener_address: Option<String>,
        listener_port: Option<u16>,
        spot_file: Option<PathBuf>,
        param_file: Option<PathBuf>,
    ) {
        if let Some(address) = modbus_address {
            self.modbus.address = address;
        }
        if let Some(port) = modbus_port {
            self.modbus.port = port;
        }
        if let Some(address) = listener_address {
            self.listener.address = address;
        }
        if let Some(port) = listener_port {
            self.listener.port = port;
        }
        if let Some(path) = spot_file {
            self.sources.spot_file = path;
        }
        if let Some(path) = param_file {
            self.sources.param_file = path;
        }
    }

    /// Socket address of the Modbus server
    pub fn modbus_socket_addr(&self) -> Result<SocketAddr> {
        resolve_socket_addr(&self.modbus.address, self.modbus.port)
    }

    /// The SPOT and PARAM sources
    pub fn source_specs(&self) -> Vec<SourceSpec> {
        vec![
            SourceSpec::spot(&self.sources.spot_file),
            SourceSpec::param(&self.sources.param_file),
        ]
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.sources.poll_interval_ms)
    }

    /// File the listener rewrites, the PARAM source unless overridden
    pub fn settings_file(&self) -> &Path {
        self.listener
            .settings_file
            .as_deref()
            .unwrap_or(&self.sources.param_file)
    }

    /// Runtime settings of the configuration listener
    pub fn listener_settings(&self) -> Result<ListenerSettings> {
        let address = resolve_socket_addr(&self.listener.address, self.listener.port)?;
        Ok(ListenerSettings {
            address,
            marker: self.listener.marker.clone(),
            settings_file: self.settings_file().to_path_buf(),
            read_buffer: self.listener.read_buffer,
            session_timeout: Duration::from_millis(self.listener.session_timeout_ms),
            atomic_rename: self.listener.atomic_rename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_schema() {
        let yaml = serde_yml::to_string(&Config::default()).unwrap();
        let config = Config::from_yaml_str(&yaml).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.modbus.port, 502);
        assert_eq!(config.listener.port, 5000);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.settings_file(), Path::new("PARAMCHANNELS.txt"));
        assert_eq!(config.listener.restart, RestartPolicy::Never);
    }

    #[test]
    fn test_settings_file_override() {
        let mut config = Config::default();
        config.listener.settings_file = Some(PathBuf::from("SetInformation.txt"));
        assert_eq!(config.settings_file(), Path::new("SetInformation.txt"));
        assert_eq!(
            config.listener_settings().unwrap().settings_file,
            PathBuf::from("SetInformation.txt")
        );
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(
            Some("127.0.0.1".to_string()),
            Some(1502),
            None,
            Some(5001),
            Some(PathBuf::from("/tmp/spot.txt")),
            None,
        );
        assert_eq!(config.modbus.address, "127.0.0.1");
        assert_eq!(config.modbus.port, 1502);
        assert_eq!(config.listener.address, "0.0.0.0");
        assert_eq!(config.listener.port, 5001);
        assert_eq!(config.sources.spot_file, PathBuf::from("/tmp/spot.txt"));
        assert_eq!(config.sources.param_file, PathBuf::from("PARAMCHANNELS.txt"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = Config::from_yaml_str(
            r#"
listener:
  port: 6000
  marker: SETCFG
  restart: always
"#,
        )
        .unwrap();
        assert_eq!(config.listener.port, 6000);
        assert_eq!(config.listener.marker, "SETCFG");
        assert_eq!(config.listener.restart, RestartPolicy::Always);
        assert_eq!(config.modbus, ModbusConfig::default());
    }

    #[test]
    fn test_schema_rejects_unknown_section() {
        assert!(Config::from_yaml_str("web:\n  port: 80\n").is_err());
    }

    #[test]
    fn test_schema_rejects_bad_port() {
        assert!(Config::from_yaml_str("modbus:\n  port: 0\n  address: 0.0.0.0\n").is_err());
    }
}
