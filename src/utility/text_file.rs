// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Line-oriented text files
//!
//! The channel producer and the bridge exchange plain text files holding one
//! value per line. Reads take the whole file; writes replace the whole file.
//!
//! [`write_lines`] rewrites the existing file in place. The producer keeps
//! its channel files open for its whole lifetime, so the inode must survive
//! the rewrite. The new content goes out in a single write right after the
//! truncation; a concurrent [`read_lines`] may still see an empty file.
//!
//! [`replace_lines`] writes into a temporary file in the target directory
//! and renames it over the target, so a concurrent reader sees either the
//! previous content or the new content. It swaps the inode and is only
//! safe for files nobody holds open.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;
use thiserror::Error;

/// I/O failure on a channel or settings file
#[derive(Error, Debug)]
pub enum FileError {
    #[error("cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Whether `path` can currently be stat'ed
pub fn is_accessible<P: AsRef<Path>>(path: P) -> bool {
    fs::metadata(path.as_ref()).is_ok()
}

/// Read a file and split it into lines.
///
/// Line terminators are stripped; empty lines are preserved so callers can
/// decide how to treat them.
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>, FileError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| FileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(contents.lines().map(str::to_string).collect())
}

fn render<S: AsRef<str>>(lines: &[S]) -> String {
    let mut contents = String::new();
    for line in lines {
        contents.push_str(line.as_ref());
        contents.push('\n');
    }
    contents
}

/// Replace the content of `path` with `lines`, one per line, keeping the
/// file's inode. The file is created when missing.
pub fn write_lines<P, S>(path: P, lines: &[S]) -> Result<(), FileError>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let write_err = |source: std::io::Error| FileError::Write {
        path: path.to_path_buf(),
        source,
    };

    let contents = render(lines);
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(write_err)?;
    file.write_all(contents.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;

    debug!("Rewrote {:?} in place with {} lines", path, lines.len());
    Ok(())
}

/// Replace `path` with a new file holding `lines`, one per line, through a
/// temporary file and an atomic rename.
pub fn replace_lines<P, S>(path: P, lines: &[S]) -> Result<(), FileError>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let write_err = |source: std::io::Error| FileError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(render(lines).as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Replaced {:?} with {} lines", path, lines.len());
    Ok(())
}
