// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use std::net::{SocketAddr, ToSocketAddrs};

use anyhow::{Context, Result};
use log::debug;

use super::{Config, CONFIG_SCHEMA};

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_modbus_bridge --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    // Special cases
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Whether `addr` binds every interface (`0.0.0.0`, `::`)
pub fn is_wildcard_address(addr: &str) -> bool {
    addr.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<std::net::IpAddr>()
        .is_ok_and(|ip| ip.is_unspecified())
}

/// Whether binding both addresses on one port would collide
fn addresses_overlap(a: &str, b: &str) -> bool {
    a == b || is_wildcard_address(a) || is_wildcard_address(b)
}

/// Resolve an `address`/`port` pair into a socket address.
///
/// IPv6 literals are accepted with or without brackets. Hostnames go
/// through the system resolver and the first result is used.
pub fn resolve_socket_addr(address: &str, port: u16) -> Result<SocketAddr> {
    let host = address.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("Failed to resolve address {}:{}", address, port))?
        .next()
        .with_context(|| format!("No socket address found for {}:{}", address, port))
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Port Range**: Both ports are within 1-65534
/// - **Port Clash**: The Modbus server and the listener do not share a port on
///   the same address, or on any address when either binds a wildcard
/// - **IP Address Format**: Bind addresses are IP addresses or special values
/// - **Marker**: The listener marker is non-empty and does not contain the field separator
/// - **Sizes**: Read buffer and polling interval are non-zero
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.modbus.port < 1 || config.modbus.port > 65534 {
        anyhow::bail!("Invalid Modbus port number: {}", config.modbus.port);
    }
    if config.listener.port < 1 || config.listener.port > 65534 {
        anyhow::bail!("Invalid listener port number: {}", config.listener.port);
    }

    if !is_valid_ip_address(&config.modbus.address) {
        anyhow::bail!("Invalid Modbus address format: {}", config.modbus.address);
    }
    if !is_valid_ip_address(&config.listener.address) {
        anyhow::bail!(
            "Invalid listener address format: {}",
            config.listener.address
        );
    }

    if config.listener.enabled
        && config.modbus.port == config.listener.port
        && addresses_overlap(&config.modbus.address, &config.listener.address)
    {
        anyhow::bail!(
            "Modbus server and configuration listener both use {}:{}",
            config.modbus.address,
            config.modbus.port
        );
    }

    if config.listener.marker.is_empty() {
        anyhow::bail!("Listener marker must not be empty");
    }
    if config
        .listener
        .marker
        .contains(crate::listener::message::FIELD_SEPARATOR)
    {
        anyhow::bail!(
            "Listener marker must not contain '{}'",
            crate::listener::message::FIELD_SEPARATOR
        );
    }

    if config.listener.read_buffer == 0 {
        anyhow::bail!("Listener read buffer must be at least one byte");
    }
    if config.sources.poll_interval_ms == 0 {
        anyhow::bail!("Polling interval must be greater than zero");
    }

    Ok(())
}
