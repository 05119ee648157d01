// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust Modbus bridge library
//!
//! Publishes the SPOT and PARAM channel files of an inverter data logger as
//! Modbus input registers, and accepts configuration updates over a raw TCP
//! socket which are written back to the parameter file.

pub mod codec;
pub mod config;
pub mod daemon;
pub mod listener;
pub mod logging;
pub mod modbus;
pub mod publisher;
pub mod utility;
