//! Advisory cross-process file locking
//!
//! Locks are taken on a sidecar `<target>.lock` file rather than the target
//! itself, because the target is replaced by rename on every write and a lock
//! on the old inode would not exclude the next writer. The sidecar is never
//! deleted.

use fs2::FileExt;
use std::fmt::{self, Display, Formatter};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const INITIAL_BACKOFF: Duration = Duration::from_millis(5);
const MAX_BACKOFF: Duration = Duration::from_millis(100);

/// Lock mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Many readers, no writer
    Shared,
    /// One writer, no readers
    Exclusive,
}

impl Display for LockMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shared => "shared",
            Self::Exclusive => "exclusive",
        })
    }
}

/// Errors acquiring a lock
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Sidecar could not be opened or created
    #[error("failed to open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// OS refused the lock
    #[error("failed to acquire {mode} lock on {path}: {source}")]
    Acquire {
        path: PathBuf,
        mode: LockMode,
        #[source]
        source: io::Error,
    },

    /// Lock still held by someone else when the timeout ran out
    #[error("timed out after {waited:?} waiting for {mode} lock on {path}")]
    Timeout {
        path: PathBuf,
        mode: LockMode,
        waited: Duration,
    },
}

/// Held advisory lock, released on drop
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl FileLock {
    /// Sidecar lock path for a target file
    #[must_use]
    pub fn lock_path(target: &Path) -> PathBuf {
        let mut os = target.as_os_str().to_owned();
        os.push(".lock");
        PathBuf::from(os)
    }

    /// Acquire a lock guarding `target`
    ///
    /// With `timeout = None` this blocks until the lock is granted. With a
    /// timeout the lock is polled with exponential backoff.
    ///
    /// # Errors
    /// Returns [`LockError::Open`] if the sidecar cannot be created,
    /// [`LockError::Timeout`] if the timeout elapses, and
    /// [`LockError::Acquire`] for any other OS failure.
    pub fn acquire(target: &Path, mode: LockMode, timeout: Option<Duration>) -> Result<Self, LockError> {
        let path = Self::lock_path(target);
        let file = open_sidecar(&path)?;

        match timeout {
            None => lock_blocking(&file, mode).map_err(|source| LockError::Acquire {
                path: path.clone(),
                mode,
                source,
            })?,
            Some(limit) => poll(&file, mode, limit, &path)?,
        }

        tracing::debug!("Acquired {} lock on {}", mode, path.display());
        Ok(Self { file, path, mode })
    }

    /// Try once without waiting
    ///
    /// Returns `Ok(None)` if another holder conflicts.
    ///
    /// # Errors
    /// Returns [`LockError::Open`] or [`LockError::Acquire`] on OS failure.
    pub fn try_acquire(target: &Path, mode: LockMode) -> Result<Option<Self>, LockError> {
        let path = Self::lock_path(target);
        let file = open_sidecar(&path)?;
        match lock_nonblocking(&file, mode) {
            Ok(()) => Ok(Some(Self { file, path, mode })),
            Err(err) if is_contended(&err) => Ok(None),
            Err(source) => Err(LockError::Acquire { path, mode, source }),
        }
    }

    /// Sidecar path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode held
    #[inline]
    #[must_use]
    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        match FileExt::unlock(&self.file) {
            Ok(()) => tracing::debug!("Released {} lock on {}", self.mode, self.path.display()),
            Err(e) => tracing::warn!("Failed to release lock on {}: {}", self.path.display(), e),
        }
    }
}

fn open_sidecar(path: &Path) -> Result<File, LockError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|source| LockError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn lock_blocking(file: &File, mode: LockMode) -> io::Result<()> {
    match mode {
        LockMode::Shared => FileExt::lock_shared(file),
        LockMode::Exclusive => FileExt::lock_exclusive(file),
    }
}

fn lock_nonblocking(file: &File, mode: LockMode) -> io::Result<()> {
    match mode {
        LockMode::Shared => FileExt::try_lock_shared(file),
        LockMode::Exclusive => FileExt::try_lock_exclusive(file),
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn poll(file: &File, mode: LockMode, limit: Duration, path: &Path) -> Result<(), LockError> {
    let started = Instant::now();
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match lock_nonblocking(file, mode) {
            Ok(()) => return Ok(()),
            Err(err) if is_contended(&err) => {
                let waited = started.elapsed();
                if waited >= limit {
                    return Err(LockError::Timeout {
                        path: path.to_path_buf(),
                        mode,
                        waited,
                    });
                }
                thread::sleep(backoff.min(limit - waited));
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(source) => {
                return Err(LockError::Acquire {
                    path: path.to_path_buf(),
                    mode,
                    source,
                })
            }
        }
    }
}
