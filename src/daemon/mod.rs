// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! Lifecycle of the bridge process.
//!
//! ## Components
//!
//! * **Supervisor**: starts the register store, runs the publishing loop,
//!   launches the configuration listener and performs the shutdown sequence
//! * **Signals**: resolves when the operator asks the process to stop

pub mod signals;
pub mod supervisor;

pub use signals::wait_for_shutdown_signal;
pub use supervisor::{FatalServerError, Supervisor, LISTENER_JOIN_TIMEOUT};
