// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration message wire format
//!
//! A message is UTF-8 text of the form `<MARKER>;<field2>;<field3>`. It is
//! accepted when the payload starts with the marker and splits on `;` into
//! exactly three fields. There is no length prefix and no terminator: the
//! message must arrive in a single read.

use thiserror::Error;

/// Field separator of the configuration message
pub const FIELD_SEPARATOR: char = ';';

/// Number of `;`-separated fields in a valid message
pub const FIELD_COUNT: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("connection closed before any data was received")]
    Empty,

    #[error("payload is not valid UTF-8")]
    InvalidEncoding,

    #[error("payload does not start with the expected marker")]
    MissingMarker,

    #[error("expected 3 fields, found {found}")]
    FieldCount { found: usize },
}

/// A validated configuration update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMessage {
    /// Channel handle to set, as sent by the client
    pub channel: String,
    /// Value to set, as sent by the client
    pub value: String,
}

impl ConfigMessage {
    /// Decode and validate a raw payload
    pub fn from_bytes(payload: &[u8], marker: &str) -> Result<Self, ProtocolError> {
        if payload.is_empty() {
            return Err(ProtocolError::Empty);
        }
        let text = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidEncoding)?;
        Self::parse(text, marker)
    }

    /// Validate a decoded payload
    pub fn parse(text: &str, marker: &str) -> Result<Self, ProtocolError> {
        if !text.starts_with(marker) {
            return Err(ProtocolError::MissingMarker);
        }
        let fields: Vec<&str> = text.split(FIELD_SEPARATOR).collect();
        match fields.as_slice() {
            [_, channel, value] => Ok(Self {
                channel: channel.to_string(),
                value: value.to_string(),
            }),
            _ => Err(ProtocolError::FieldCount {
                found: fields.len(),
            }),
        }
    }

    /// Lines persisted to the settings file
    pub fn lines(&self) -> [&str; 2] {
        [self.channel.as_str(), self.value.as_str()]
    }

    /// Encode as a wire payload
    pub fn to_payload(&self, marker: &str) -> String {
        format!(
            "{marker}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
            self.channel, self.value
        )
    }
}
