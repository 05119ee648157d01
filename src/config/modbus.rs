// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP server configuration
//!
//! This module defines the structures for configuring the Modbus TCP server
//! exposing the input-register bank.

use serde::{Deserialize, Serialize};

/// Configuration for the Modbus TCP server component.
///
/// # Fields
///
/// * `port` - TCP port number for the Modbus server (default: 502)
/// * `address` - Network address for the Modbus server to bind to (default: 0.0.0.0)
///
/// # Example
///
/// ```
/// use rust_modbus_bridge::config::ModbusConfig;
///
/// let modbus_config = ModbusConfig {
///     port: 503,
///     address: "127.0.0.1".to_string(),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// The TCP port the Modbus server will listen on.
    ///
    /// Valid range is 1-65534. Default value is 502, which is the standard Modbus TCP port.
    pub port: u16,

    /// The network address the Modbus server will bind to.
    ///
    /// Can be an IPv4/IPv6 address or a hostname. Default is "0.0.0.0" so
    /// that SCADA clients on the plant network can poll the bridge.
    pub address: String,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            port: 502,                      // Standard Modbus TCP port
            address: "0.0.0.0".to_string(), // All IPv4 interfaces
        }
    }
}
