// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Channel file configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::publisher::SourceKind;

/// Location of the channel files and the polling cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// File holding the 18 spot channel values, one per line
    #[serde(default = "default_spot_file")]
    pub spot_file: PathBuf,

    /// File holding the 29 parameter channel values, one per line
    #[serde(default = "default_param_file")]
    pub param_file: PathBuf,

    /// Delay between two publishing cycles in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_spot_file() -> PathBuf {
    PathBuf::from(SourceKind::Spot.default_file_name())
}

fn default_param_file() -> PathBuf {
    PathBuf::from(SourceKind::Param.default_file_name())
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            spot_file: default_spot_file(),
            param_file: default_param_file(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}
