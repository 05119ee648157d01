// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::Result;
use tempfile::tempdir;

use rust_modbus_bridge::config::{self, Config, ModbusConfig, RestartPolicy};

static INIT: Once = Once::new();

// Setup logger for tests
fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

#[test]
fn test_config_load_and_save() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let mut config = Config::default();
    config.modbus = ModbusConfig {
        port: 1502,
        address: "192.168.1.1".to_string(),
    };
    config.listener.marker = "SETCFG".to_string();
    config.listener.settings_file = Some(PathBuf::from("SetInformation.txt"));
    config.listener.restart = RestartPolicy::Always;
    config.logging.file = Some(PathBuf::from("bridge.log"));

    config.save_to_file(&config_path)?;
    let loaded_config = Config::from_file(&config_path)?;
    assert_eq!(loaded_config, config);

    // Test loading default config for non-existent file
    let non_existent_path = temp_dir.path().join("non_existent.yaml");
    let default_config = Config::from_file(&non_existent_path)?;
    assert!(non_existent_path.exists());
    assert_eq!(default_config, Config::default());

    Ok(())
}

#[test]
fn test_command_line_overrides() -> Result<()> {
    let mut config = Config::default();
    config.apply_args(
        Some("127.0.0.1".to_string()),
        Some(5020),
        Some("127.0.0.1".to_string()),
        Some(5001),
        Some(PathBuf::from("/var/lib/sma/SPOTCHANNELS.txt")),
        Some(PathBuf::from("/var/lib/sma/PARAMCHANNELS.txt")),
    );

    assert_eq!(config.modbus_socket_addr()?, "127.0.0.1:5020".parse()?);
    let listener = config.listener_settings()?;
    assert_eq!(listener.address, "127.0.0.1:5001".parse()?);
    assert_eq!(
        listener.settings_file,
        PathBuf::from("/var/lib/sma/PARAMCHANNELS.txt")
    );

    let specs = config.source_specs();
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].range(), 0..18);
    assert_eq!(specs[1].range(), 18..47);
    Ok(())
}

#[test]
fn test_config_validation_error_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let invalid_config = r#"
modbus:
  port: 99999  # Port out of range (valid range is 1-65534)
  address: "127.0.0.1"
"#;
    fs::write(&config_path, invalid_config)?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err(), "Config loading should have failed");

    let sample_path = config_path.with_extension("sample.yaml");
    assert!(
        Path::new(&sample_path).exists(),
        "Sample config file was not created"
    );

    let sample_config = Config::from_file(&sample_path)?;
    assert_eq!(sample_config.modbus.port, 502);

    Ok(())
}

#[test]
fn test_config_type_mismatch_is_rejected() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let invalid_yaml = r#"
listener:
  port: "not-an-integer"
  enabled: "true"
  restart: sometimes
"#;
    fs::write(&config_path, invalid_yaml)?;

    assert!(Config::from_file(&config_path).is_err());
    assert!(config_path.with_extension("sample.yaml").exists());
    Ok(())
}

#[test]
fn test_specific_rules_are_enforced_after_schema() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Valid against the schema, but both servers on the same socket
    let clashing = r#"
modbus:
  port: 5000
  address: 0.0.0.0
listener:
  port: 5000
  address: 0.0.0.0
"#;
    fs::write(&config_path, clashing)?;
    let err = Config::from_file(&config_path).unwrap_err();
    assert!(format!("{:#}", err).contains("both use"));
    Ok(())
}

#[test]
fn test_config_schema_output() -> Result<()> {
    config::output_config_schema()?;

    let schema: serde_json::Value = serde_json::from_str(config::CONFIG_SCHEMA)?;
    assert!(schema["properties"]["listener"]["properties"]["marker"].is_object());
    Ok(())
}
