//! Crash-safe file replacement
//!
//! Contents are written to a temp file in the target's directory, flushed and
//! synced, then renamed over the target. A reader (or a crash) observes
//! either the old file or the new one, never a mix.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

/// Prefix of staged temp files
pub const TEMP_PREFIX: &str = ".dotyaml-";
/// Suffix of staged temp files
pub const TEMP_SUFFIX: &str = ".tmp";

/// Errors replacing a file
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Temp file could not be created next to the target
    #[error("failed to create temp file in {dir}: {source}")]
    CreateTemp {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing or syncing the temp file failed
    #[error("failed to write temp file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Rename over the target failed
    #[error("failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fully written temp file waiting to replace its target
///
/// Dropping it without [`StagedWrite::commit`] deletes the temp file and
/// leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// Write `contents` to a temp file beside `target`
    ///
    /// The temp file takes over the target's permissions when the target
    /// already exists.
    ///
    /// # Errors
    /// Returns [`WriteError::CreateTemp`] or [`WriteError::Write`]; the temp
    /// file is removed on failure.
    pub fn stage(target: &Path, contents: &[u8]) -> Result<Self, WriteError> {
        let dir = parent_dir(target);
        let mut temp = Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&dir)
            .map_err(|source| WriteError::CreateTemp { dir, source })?;

        if let Err(source) = fill(&mut temp, contents) {
            return Err(WriteError::Write {
                path: temp.path().to_path_buf(),
                source,
            });
        }

        if let Ok(metadata) = fs::metadata(target) {
            if let Err(e) = fs::set_permissions(temp.path(), metadata.permissions()) {
                tracing::debug!("Could not copy permissions of {}: {}", target.display(), e);
            }
        }

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    /// Temp file location
    #[inline]
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Target file location
    #[inline]
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temp file over the target
    ///
    /// # Errors
    /// Returns [`WriteError::Persist`]; the temp file is removed and the
    /// target keeps its previous contents.
    pub fn commit(self) -> Result<(), WriteError> {
        let Self { temp, target } = self;
        temp.persist(&target).map_err(|e| WriteError::Persist {
            path: target.clone(),
            source: e.error,
        })?;
        sync_dir(&target);
        tracing::debug!("Persisted {}", target.display());
        Ok(())
    }
}

/// Atomically replace `target` with `contents`
///
/// # Errors
/// See [`StagedWrite::stage`] and [`StagedWrite::commit`].
pub fn write_atomic(target: &Path, contents: &[u8]) -> Result<(), WriteError> {
    StagedWrite::stage(target, contents)?.commit()
}

fn fill(temp: &mut NamedTempFile, contents: &[u8]) -> io::Result<()> {
    temp.write_all(contents)?;
    temp.flush()?;
    temp.as_file().sync_all()
}

fn parent_dir(target: &Path) -> PathBuf {
    match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Make the rename itself durable
#[cfg(unix)]
fn sync_dir(target: &Path) {
    let dir = parent_dir(target);
    if let Err(e) = fs::File::open(&dir).and_then(|d| d.sync_all()) {
        tracing::debug!("Could not sync directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_target: &Path) {}
