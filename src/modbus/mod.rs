// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! This module provides the Modbus TCP server of the bridge, allowing
//! external systems to read the channel values published from the
//! channel files.
//!
//! ## Key Components
//!
//! - [`RegisterBank`]: the 47 input registers, split into the SPOT and
//!   PARAM ranges
//! - [`InputRegisterService`]: answers Read Input Registers requests
//! - [`ModbusStore`]: starts and stops the TCP server in front of the bank
//!
//! ## Register Map
//!
//! ### Input Registers (Read-Only)
//!
//! - Registers 0-17: spot channels (value × 100)
//! - Registers 18-46: parameter channels (value × 100)

pub mod modbus_server;
pub mod register_bank;
pub mod store;

pub use modbus_server::InputRegisterService;
pub use register_bank::{
    RegisterBank, RegisterError, BANK_CAPACITY, PARAM_RANGE, REGISTER_MAP, SPOT_RANGE,
};
pub use store::{ModbusStore, StoreError};
