// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! "Great-data" positional coding
//!
//! Maps scaled integers onto 16-bit Modbus register words.
//!
//! | Scaled value | Register word |
//! |--------------|---------------|
//! | `0..=65535` | stored as-is |
//! | `-32768..=-1` | 16-bit two's complement |
//! | anything else | [`DecodeError::OutOfRange`] |
//!
//! The coding keeps source order. [`CodedRecord::positions`] maps every word
//! back to the index it came from, and [`CodedRecord::signed_positions`]
//! lists the words a client must read as signed.

use super::DecodeError;

/// Result of [`recode`]: register words plus their position indices.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodedRecord {
    /// Register words, in write order
    pub words: Vec<u16>,
    /// `positions[i]` is the source index of `words[i]`
    pub positions: Vec<usize>,
    /// Indices into `words` holding a two's-complement negative value
    pub signed_positions: Vec<usize>,
}

impl CodedRecord {
    /// Number of register words
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Recover the scaled values in source order.
    pub fn decode(&self) -> Vec<i64> {
        let mut values = vec![0i64; self.words.len()];
        for (index, (word, source)) in self.words.iter().zip(&self.positions).enumerate() {
            values[*source] = if self.signed_positions.binary_search(&index).is_ok() {
                i64::from(*word as i16)
            } else {
                i64::from(*word)
            };
        }
        values
    }
}

/// Code scaled values into register words.
pub fn recode(values: &[i64]) -> Result<CodedRecord, DecodeError> {
    let mut record = CodedRecord {
        words: Vec::with_capacity(values.len()),
        positions: Vec::with_capacity(values.len()),
        signed_positions: Vec::new(),
    };

    for (field, value) in values.iter().copied().enumerate() {
        let word = if let Ok(word) = u16::try_from(value) {
            word
        } else if let Ok(signed) = i16::try_from(value) {
            record.signed_positions.push(record.words.len());
            signed as u16
        } else {
            return Err(DecodeError::OutOfRange { field, value });
        };
        record.words.push(word);
        record.positions.push(field);
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recode_passes_unsigned_words_through() {
        let coded = recode(&[0, 123, 65535]).unwrap();
        assert_eq!(coded.words, vec![0, 123, 65535]);
        assert_eq!(coded.positions, vec![0, 1, 2]);
        assert!(coded.signed_positions.is_empty());
    }

    #[test]
    fn test_recode_negative_values_use_twos_complement() {
        let coded = recode(&[5, -1, -32768]).unwrap();
        assert_eq!(coded.words, vec![5, 0xFFFF, 0x8000]);
        assert_eq!(coded.signed_positions, vec![1, 2]);
    }

    #[test]
    fn test_recode_rejects_values_outside_a_word() {
        assert_eq!(
            recode(&[1, 65536]).unwrap_err(),
            DecodeError::OutOfRange {
                field: 1,
                value: 65536
            }
        );
        assert!(matches!(
            recode(&[-32769]),
            Err(DecodeError::OutOfRange { field: 0, .. })
        ));
    }

    #[test]
    fn test_recode_loses_no_value() {
        let values = vec![42, -7, 0, 42, 30000, -32768, 65535];
        let coded = recode(&values).unwrap();
        assert_eq!(coded.len(), values.len());

        let mut decoded = coded.decode();
        let mut expected = values.clone();
        decoded.sort_unstable();
        expected.sort_unstable();
        assert_eq!(decoded, expected);

        assert_eq!(coded.decode(), values);
    }

    #[test]
    fn test_recode_empty() {
        let coded = recode(&[]).unwrap();
        assert!(coded.is_empty());
    }
}
