// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration listener settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What the supervisor does when the listener task ends on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartPolicy {
    /// Log the exit and leave the listener down
    #[default]
    Never,
    /// Relaunch after `restart_delay_ms`
    Always,
}

/// Configuration for the raw TCP configuration listener.
///
/// # Example
///
/// ```
/// use rust_modbus_bridge::config::ListenerConfig;
///
/// let listener = ListenerConfig {
///     port: 5001,
///     marker: "SETCFG".to_string(),
///     ..Default::default()
/// };
/// assert!(listener.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Launch the listener after the first publishing cycle
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Network address the listener binds to
    #[serde(default = "default_address")]
    pub address: String,

    /// TCP port of the listener
    #[serde(default = "default_port")]
    pub port: u16,

    /// Token every message must start with
    #[serde(default = "default_marker")]
    pub marker: String,

    /// File rewritten with the two payload fields.
    ///
    /// Defaults to `sources.param_file` when not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_file: Option<PathBuf>,

    /// Persist updates through a temporary file and a rename.
    ///
    /// Leave off while the channel producer keeps the settings file open:
    /// the rename detaches its handle from the path.
    #[serde(default)]
    pub atomic_rename: bool,

    /// Size of the single read performed per session, in bytes
    #[serde(default = "default_read_buffer")]
    pub read_buffer: usize,

    /// Maximum wait for the client payload, in milliseconds
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Behaviour when the listener task exits unexpectedly
    #[serde(default)]
    pub restart: RestartPolicy,

    /// Delay before a relaunch under [`RestartPolicy::Always`], in milliseconds
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_marker() -> String {
    crate::listener::DEFAULT_MARKER.to_string()
}

fn default_read_buffer() -> usize {
    crate::listener::DEFAULT_READ_BUFFER
}

fn default_session_timeout_ms() -> u64 {
    5000
}

fn default_restart_delay_ms() -> u64 {
    1000
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            address: default_address(),
            port: default_port(),
            marker: default_marker(),
            settings_file: None,
            atomic_rename: false,
            read_buffer: default_read_buffer(),
            session_timeout_ms: default_session_timeout_ms(),
            restart: RestartPolicy::default(),
            restart_delay_ms: default_restart_delay_ms(),
        }
    }
}
