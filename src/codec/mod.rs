// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Value Codec
//!
//! Converts the decimal text values written by the channel producer into
//! fixed-point register words and back.
//!
//! The pipeline applied to every source record is:
//!
//! 1. [`parse_record`] - text lines to `f64` values, failing on the first
//!    malformed field
//! 2. [`fit_to_slots`] - truncate or zero-pad to the target range size
//! 3. [`scale`] - `trunc(value * 100)`, two implied decimal digits
//! 4. [`recode`] - "great-data" coding of each scaled value into a 16-bit word
//!
//! ## Example
//!
//! ```
//! use rust_modbus_bridge::codec::{parse_record, recode, scale};
//!
//! let values = parse_record(&["1.23", "4.5"]).unwrap();
//! let scaled = scale(&values).unwrap();
//! assert_eq!(scaled, vec![123, 450]);
//!
//! let coded = recode(&scaled).unwrap();
//! assert_eq!(coded.words, vec![123, 450]);
//! ```

pub mod great_data;

pub use great_data::{recode, CodedRecord};

use thiserror::Error;

/// Multiplier applied by [`scale`]: two implied decimal digits.
pub const SCALE_FACTOR: f64 = 100.0;

/// Errors raised while decoding a source record.
///
/// Every variant carries the zero-based index of the offending field
/// within the record so the operator can find the bad line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("field {field}: '{text}' is not a decimal number")]
    InvalidNumber { field: usize, text: String },

    #[error("field {field}: value is not finite")]
    NotFinite { field: usize },

    #[error("field {field}: scaled value {value} does not fit a 16-bit register")]
    OutOfRange { field: usize, value: i64 },
}

impl DecodeError {
    /// Index of the field that failed to decode
    pub fn field(&self) -> usize {
        match self {
            DecodeError::InvalidNumber { field, .. }
            | DecodeError::NotFinite { field }
            | DecodeError::OutOfRange { field, .. } => *field,
        }
    }
}

/// Parse the lines of a source file into decimal values.
///
/// Leading and trailing whitespace is ignored and blank lines are skipped,
/// since the producer terminates every value with a newline. Field indices
/// in errors count only the non-blank lines.
pub fn parse_record<S: AsRef<str>>(lines: &[S]) -> Result<Vec<f64>, DecodeError> {
    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(field, text)| {
            text.parse::<f64>()
                .map_err(|_| DecodeError::InvalidNumber {
                    field,
                    text: text.to_string(),
                })
        })
        .collect()
}

/// Truncate or zero-pad a record to exactly `slots` values.
///
/// Registers beyond the end of a short file are published as `0` so that
/// every write replaces the whole range.
pub fn fit_to_slots(mut values: Vec<f64>, slots: usize) -> Vec<f64> {
    values.resize(slots, 0.0);
    values
}

/// Scale decimal values to fixed-point integers.
///
/// Each value becomes `trunc(value * 100.0)` computed in double precision,
/// so representation error is kept exactly as the channel consumers expect
/// it: `0.29` scales to `28`.
pub fn scale(values: &[f64]) -> Result<Vec<i64>, DecodeError> {
    values
        .iter()
        .enumerate()
        .map(|(field, value)| scale_value(field, *value))
        .collect()
}

fn scale_value(field: usize, value: f64) -> Result<i64, DecodeError> {
    let scaled = (value * SCALE_FACTOR).trunc();
    if !scaled.is_finite() {
        return Err(DecodeError::NotFinite { field });
    }
    // Anything beyond i64 is also far beyond a register word.
    if scaled >= i64::MAX as f64 || scaled <= i64::MIN as f64 {
        return Err(DecodeError::OutOfRange {
            field,
            value: if scaled > 0.0 { i64::MAX } else { i64::MIN },
        });
    }
    Ok(scaled as i64)
}

/// Run the complete decode pipeline for one source record.
///
/// Returns the register words ready to be written at the range base.
pub fn decode_record<S: AsRef<str>>(lines: &[S], slots: usize) -> Result<CodedRecord, DecodeError> {
    let values = fit_to_slots(parse_record(lines)?, slots);
    let scaled = scale(&values)?;
    recode(&scaled)
}
