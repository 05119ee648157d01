// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Utility module for common utilities used throughout the project

pub mod text_file;

// Re-exports for use in other modules
pub use text_file::{is_accessible, read_lines, replace_lines, write_lines, FileError};
