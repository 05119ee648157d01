// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Register Publisher
//!
//! Copies the two channel files into the input-register bank.
//!
//! Every call to [`RegisterPublisher::poll_once`] reads each source file
//! afresh, runs it through the [`codec`](crate::codec) pipeline and writes
//! the resulting words over the source's full register range.
//!
//! Sources are processed independently: a missing, unreadable or malformed
//! file is skipped for this cycle and logged, and the other source is still
//! published. Only a failure of the register bank itself is fatal.
//!
//! ```no_run
//! use rust_modbus_bridge::modbus::RegisterBank;
//! use rust_modbus_bridge::publisher::{RegisterPublisher, SourceSpec};
//!
//! let bank = RegisterBank::new();
//! let publisher = RegisterPublisher::new(
//!     bank.clone(),
//!     vec![SourceSpec::spot("SPOTCHANNELS.txt"), SourceSpec::param("PARAMCHANNELS.txt")],
//! )
//! .unwrap();
//! let report = publisher.poll_once().unwrap();
//! println!("{} sources published", report.published());
//! ```

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use crate::codec::{self, DecodeError};
use crate::modbus::register_bank::{RegisterBank, RegisterError, PARAM_RANGE, SPOT_RANGE};
use crate::utility::text_file::{self, FileError};

/// Which register range a source feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Spot,
    Param,
}

impl SourceKind {
    /// File name the channel producer writes for this source
    pub fn default_file_name(self) -> &'static str {
        match self {
            SourceKind::Spot => "SPOTCHANNELS.txt",
            SourceKind::Param => "PARAMCHANNELS.txt",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Spot => write!(f, "SPOT"),
            SourceKind::Param => write!(f, "PARAM"),
        }
    }
}

/// A channel file and the register range it is published to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub kind: SourceKind,
    pub path: PathBuf,
    pub base: u16,
    pub slots: u16,
}

impl SourceSpec {
    /// Spot channels, registers 0..18
    pub fn spot<P: Into<PathBuf>>(path: P) -> Self {
        Self::with_range(SourceKind::Spot, path, SPOT_RANGE)
    }

    /// Parameter channels, registers 18..47
    pub fn param<P: Into<PathBuf>>(path: P) -> Self {
        Self::with_range(SourceKind::Param, path, PARAM_RANGE)
    }

    pub fn with_range<P: Into<PathBuf>>(kind: SourceKind, path: P, range: Range<u16>) -> Self {
        Self {
            kind,
            path: path.into(),
            base: range.start,
            slots: range.end.saturating_sub(range.start),
        }
    }

    /// Register addresses written by this source
    pub fn range(&self) -> Range<u16> {
        self.base..self.base.saturating_add(self.slots)
    }
}

/// Errors in one source for one cycle; never fatal
#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error("{path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublisherError {
    #[error("{kind} range {start}..{end} does not fit a bank of {capacity} registers")]
    RangeOutsideBank {
        kind: SourceKind,
        start: u16,
        end: u16,
        capacity: usize,
    },

    #[error("{first} and {second} register ranges overlap")]
    OverlappingRanges {
        first: SourceKind,
        second: SourceKind,
    },

    #[error("register bank rejected the {kind} write: {source}")]
    Store {
        kind: SourceKind,
        #[source]
        source: RegisterError,
    },
}

/// What happened to one source during a cycle
#[derive(Debug)]
pub enum SourceOutcome {
    /// The full range was rewritten with these words
    Published(Vec<u16>),
    /// The file was not accessible or held no value; nothing was written
    Skipped,
    /// The file could not be read or decoded; nothing was written
    Failed(SourceError),
}

/// Result of one [`RegisterPublisher::poll_once`] cycle
#[derive(Debug, Default)]
pub struct PollReport {
    pub outcomes: Vec<(SourceKind, SourceOutcome)>,
}

impl PollReport {
    /// Outcome for the given source
    pub fn outcome(&self, kind: SourceKind) -> Option<&SourceOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| outcome)
    }

    /// Number of sources written during the cycle
    pub fn published(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, SourceOutcome::Published(_)))
            .count()
    }
}

/// Periodic synchronisation between the channel files and the register bank
#[derive(Debug, Clone)]
pub struct RegisterPublisher {
    bank: RegisterBank,
    sources: Vec<SourceSpec>,
}

impl RegisterPublisher {
    /// Create a publisher, checking that every source range fits the bank
    /// and that no two ranges overlap.
    pub fn new(bank: RegisterBank, sources: Vec<SourceSpec>) -> Result<Self, PublisherError> {
        let capacity = bank.capacity();
        for source in &sources {
            let range = source.range();
            if usize::from(source.base) + usize::from(source.slots) > capacity {
                return Err(PublisherError::RangeOutsideBank {
                    kind: source.kind,
                    start: range.start,
                    end: range.end,
                    capacity,
                });
            }
        }
        for (i, first) in sources.iter().enumerate() {
            for second in &sources[i + 1..] {
                let (a, b) = (first.range(), second.range());
                if a.start < b.end && b.start < a.end {
                    return Err(PublisherError::OverlappingRanges {
                        first: first.kind,
                        second: second.kind,
                    });
                }
            }
        }
        Ok(Self { bank, sources })
    }

    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }

    /// Run one synchronisation cycle over every source.
    ///
    /// Per-source read and decode failures are reported in the returned
    /// [`PollReport`]. Only a rejected bank write returns an error.
    pub fn poll_once(&self) -> Result<PollReport, PublisherError> {
        let mut report = PollReport::default();

        for source in &self.sources {
            let outcome = match Self::load(source) {
                Ok(None) => {
                    debug!("{} source {:?} not accessible or empty, skipped", source.kind, source.path);
                    SourceOutcome::Skipped
                }
                Ok(Some(words)) => {
                    self.bank
                        .set_input_registers(source.base, &words)
                        .map_err(|e| PublisherError::Store {
                            kind: source.kind,
                            source: e,
                        })?;
                    SourceOutcome::Published(words)
                }
                Err(e) => {
                    warn!("{} source skipped this cycle: {}", source.kind, e);
                    SourceOutcome::Failed(e)
                }
            };
            report.outcomes.push((source.kind, outcome));
        }

        Ok(report)
    }

    /// Read and decode one source, `None` when the file is not accessible
    /// or holds no value
    fn load(source: &SourceSpec) -> Result<Option<Vec<u16>>, SourceError> {
        if !text_file::is_accessible(&source.path) {
            return Ok(None);
        }
        let lines = text_file::read_lines(&source.path)?;
        // An in-place rewrite is briefly empty between truncate and write
        if lines.iter().all(|line| line.trim().is_empty()) {
            return Ok(None);
        }
        let coded = codec::decode_record(&lines, usize::from(source.slots)).map_err(|source_err| {
            SourceError::Decode {
                path: source.path.clone(),
                source: source_err,
            }
        })?;
        debug!(
            "{} source decoded, positions {:?}, signed {:?}",
            source.kind, coded.positions, coded.signed_positions
        );
        Ok(Some(coded.words))
    }
}

/// Default location of a source file inside `dir`
pub fn default_source_path(dir: &Path, kind: SourceKind) -> PathBuf {
    dir.join(kind.default_file_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::register_bank::BANK_CAPACITY;
    use crate::utility::text_file::write_lines;
    use tempfile::tempdir;

    fn publisher(dir: &Path) -> (RegisterBank, RegisterPublisher) {
        let bank = RegisterBank::new();
        let publisher = RegisterPublisher::new(
            bank.clone(),
            vec![
                SourceSpec::spot(default_source_path(dir, SourceKind::Spot)),
                SourceSpec::param(default_source_path(dir, SourceKind::Param)),
            ],
        )
        .unwrap();
        (bank, publisher)
    }

    #[test]
    fn test_source_ranges() {
        assert_eq!(SourceSpec::spot("a").range(), 0..18);
        assert_eq!(SourceSpec::param("b").range(), 18..47);
    }

    #[test]
    fn test_overlapping_ranges_rejected() {
        let err = RegisterPublisher::new(
            RegisterBank::new(),
            vec![
                SourceSpec::spot("a"),
                SourceSpec::with_range(SourceKind::Param, "b", 10..20),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            PublisherError::OverlappingRanges {
                first: SourceKind::Spot,
                second: SourceKind::Param
            }
        );
    }

    #[test]
    fn test_range_outside_bank_rejected() {
        let err = RegisterPublisher::new(
            RegisterBank::new(),
            vec![SourceSpec::with_range(SourceKind::Param, "b", 40..50)],
        )
        .unwrap_err();
        assert!(matches!(err, PublisherError::RangeOutsideBank { .. }));
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let dir = tempdir().unwrap();
        let (bank, publisher) = publisher(dir.path());

        let report = publisher.poll_once().unwrap();
        assert!(matches!(
            report.outcome(SourceKind::Spot),
            Some(SourceOutcome::Skipped)
        ));
        assert!(matches!(
            report.outcome(SourceKind::Param),
            Some(SourceOutcome::Skipped)
        ));
        assert_eq!(bank.snapshot(), vec![0; BANK_CAPACITY]);
    }

    #[test]
    fn test_spot_write_stays_in_spot_range() {
        let dir = tempdir().unwrap();
        let (bank, publisher) = publisher(dir.path());
        let spot: Vec<String> = (0..25).map(|i| format!("{}.5", i + 1)).collect();
        write_lines(default_source_path(dir.path(), SourceKind::Spot), &spot).unwrap();

        let report = publisher.poll_once().unwrap();
        assert_eq!(report.published(), 1);

        let words = bank.snapshot();
        assert_eq!(words[0], 150);
        assert_eq!(words[17], 1850);
        assert!(words[18..].iter().all(|w| *w == 0));
    }

    #[test]
    fn test_short_param_file_is_zero_padded() {
        let dir = tempdir().unwrap();
        let (bank, publisher) = publisher(dir.path());
        let param_path = default_source_path(dir.path(), SourceKind::Param);

        write_lines(&param_path, &["1"; 29]).unwrap();
        publisher.poll_once().unwrap();
        assert!(bank.snapshot()[18..].iter().all(|w| *w == 100));

        write_lines(&param_path, &["7", "2.5"]).unwrap();
        publisher.poll_once().unwrap();
        let words = bank.snapshot();
        assert_eq!(&words[18..20], &[700, 250]);
        assert!(words[20..].iter().all(|w| *w == 0));
        assert!(words[..18].iter().all(|w| *w == 0));
    }

    #[test]
    fn test_bad_spot_does_not_block_param() {
        let dir = tempdir().unwrap();
        let (bank, publisher) = publisher(dir.path());
        let spot_path = default_source_path(dir.path(), SourceKind::Spot);
        let param_path = default_source_path(dir.path(), SourceKind::Param);

        write_lines(&spot_path, &["1.0", "oops"]).unwrap();
        write_lines(&param_path, &["3.21"]).unwrap();

        let report = publisher.poll_once().unwrap();
        match report.outcome(SourceKind::Spot) {
            Some(SourceOutcome::Failed(SourceError::Decode { source, .. })) => {
                assert_eq!(source.field(), 1);
            }
            other => panic!("unexpected SPOT outcome: {:?}", other),
        }
        assert!(matches!(
            report.outcome(SourceKind::Param),
            Some(SourceOutcome::Published(_))
        ));
        assert_eq!(bank.snapshot()[18], 321);
        assert_eq!(bank.snapshot()[0], 0);

        write_lines(&spot_path, &["1.0", "2.0"]).unwrap();
        let report = publisher.poll_once().unwrap();
        assert_eq!(report.published(), 2);
        assert_eq!(&bank.snapshot()[0..2], &[100, 200]);
    }

    #[test]
    fn test_unreadable_spot_recovers_next_cycle() {
        let dir = tempdir().unwrap();
        let (bank, publisher) = publisher(dir.path());
        let spot_path = default_source_path(dir.path(), SourceKind::Spot);
        let param_path = default_source_path(dir.path(), SourceKind::Param);

        // Stat succeeds, read fails
        std::fs::create_dir(&spot_path).unwrap();
        write_lines(&param_path, &["1.5"]).unwrap();

        let report = publisher.poll_once().unwrap();
        assert!(matches!(
            report.outcome(SourceKind::Spot),
            Some(SourceOutcome::Failed(SourceError::File(FileError::Read { .. })))
        ));
        assert!(matches!(
            report.outcome(SourceKind::Param),
            Some(SourceOutcome::Published(_))
        ));
        assert_eq!(bank.snapshot()[18], 150);
        assert!(bank.snapshot()[..18].iter().all(|w| *w == 0));

        std::fs::remove_dir(&spot_path).unwrap();
        write_lines(&spot_path, &["4.25", "5"]).unwrap();

        let report = publisher.poll_once().unwrap();
        assert_eq!(report.published(), 2);
        assert_eq!(&bank.snapshot()[0..3], &[425, 500, 0]);
        assert_eq!(bank.snapshot()[18], 150);
    }

    #[test]
    fn test_empty_file_keeps_previous_registers() {
        let dir = tempdir().unwrap();
        let (bank, publisher) = publisher(dir.path());
        let param_path = default_source_path(dir.path(), SourceKind::Param);

        write_lines(&param_path, &["2", "3"]).unwrap();
        publisher.poll_once().unwrap();

        std::fs::write(&param_path, "").unwrap();
        let report = publisher.poll_once().unwrap();
        assert!(matches!(
            report.outcome(SourceKind::Param),
            Some(SourceOutcome::Skipped)
        ));
        assert_eq!(&bank.snapshot()[18..20], &[200, 300]);
    }
}
