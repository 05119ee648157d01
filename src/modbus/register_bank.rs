// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Input-register bank shared between the publisher and the Modbus server
//!
//! ## Register Map
//!
//! | Register Address | Range | Content | Scaling |
//! |------------------|-------|---------|---------|
//! | 0-17 | SPOT | Spot channel values | ×100 (0.01 resolution) |
//! | 18-46 | PARAM | Parameter channel values | ×100 (0.01 resolution) |
//!
//! Each register holds the value of one SMA channel, see [`REGISTER_MAP`]
//! for the channel handle behind every address.

use std::ops::Range;
use std::sync::{Arc, Mutex};

use log::debug;
use thiserror::Error;

/// Number of input registers exposed by the bridge
pub const BANK_CAPACITY: usize = 47;

/// Addresses written from the spot channel file
pub const SPOT_RANGE: Range<u16> = 0..18;

/// Addresses written from the parameter channel file
pub const PARAM_RANGE: Range<u16> = 18..47;

/// SMA channel handles published in the SPOT range, in register order
pub const SPOT_CHANNELS: [u16; 18] = [
    192, 193, 194, 202, 206, 210, 214, 215, 219, 236, 237, 238, 275, 190, 232, 196, 197, 223,
];

/// SMA channel handles published in the PARAM range, in register order
pub const PARAM_CHANNELS: [u16; 29] = [
    22, 23, 24, 25, 26, 9, 10, 17, 18, 19, 20, 31, 32, 33, 34, 35, 36, 48, 49, 50, 51, 52, 53, 64,
    65, 66, 67, 75, 76,
];

/// One entry of the register map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMapEntry {
    pub address: u16,
    pub range: &'static str,
    pub channel: u16,
}

/// Register address to SMA channel handle, for all 47 registers
pub const REGISTER_MAP: [RegisterMapEntry; BANK_CAPACITY] = build_register_map();

const fn build_register_map() -> [RegisterMapEntry; BANK_CAPACITY] {
    let mut map = [RegisterMapEntry {
        address: 0,
        range: "",
        channel: 0,
    }; BANK_CAPACITY];
    let mut i = 0;
    while i < SPOT_CHANNELS.len() {
        map[i] = RegisterMapEntry {
            address: SPOT_RANGE.start + i as u16,
            range: "SPOT",
            channel: SPOT_CHANNELS[i],
        };
        i += 1;
    }
    let mut j = 0;
    while j < PARAM_CHANNELS.len() {
        map[SPOT_CHANNELS.len() + j] = RegisterMapEntry {
            address: PARAM_RANGE.start + j as u16,
            range: "PARAM",
            channel: PARAM_CHANNELS[j],
        };
        j += 1;
    }
    map
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error("writing {len} registers at {base} exceeds bank capacity {capacity}")]
    OutOfBounds {
        base: u16,
        len: usize,
        capacity: usize,
    },
}

/// Fixed-size bank of input registers.
///
/// Cloning is cheap and every clone refers to the same storage. Writes
/// replace a contiguous range under a single lock, so a Modbus client never
/// sees a half-updated range.
#[derive(Debug, Clone)]
pub struct RegisterBank {
    words: Arc<Mutex<Vec<u16>>>,
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBank {
    /// Create a bank of [`BANK_CAPACITY`] registers, all zero
    pub fn new() -> Self {
        Self::with_capacity(BANK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: Arc::new(Mutex::new(vec![0; capacity])),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().len()
    }

    /// Replace `values.len()` registers starting at `base`.
    ///
    /// Fails without modifying the bank when the write would run past the
    /// end of the bank.
    pub fn set_input_registers(&self, base: u16, values: &[u16]) -> Result<(), RegisterError> {
        let mut words = self.lock();
        let start = usize::from(base);
        let end = start + values.len();
        if end > words.len() {
            return Err(RegisterError::OutOfBounds {
                base,
                len: values.len(),
                capacity: words.len(),
            });
        }
        words[start..end].copy_from_slice(values);
        debug!("Updated {} input registers at {}", values.len(), base);
        Ok(())
    }

    /// Read `count` registers from `addr`, `None` when out of range
    pub fn get_input_registers(&self, addr: u16, count: u16) -> Option<Vec<u16>> {
        let words = self.lock();
        let start = usize::from(addr);
        let end = start + usize::from(count);
        words.get(start..end).map(<[u16]>::to_vec)
    }

    /// Copy of the whole bank
    pub fn snapshot(&self) -> Vec<u16> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u16>> {
        // Writes are a single copy after the bounds check, poisoning is harmless
        self.words
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
