//! Required-keys list files
//!
//! One key path per line. `#` starts a comment, surrounding whitespace is
//! ignored and blank lines are skipped.

use crate::error::{StoreError, StoreResult};
use indexmap::IndexSet;
use std::fs;
use std::path::Path;

/// Read a required-keys file
///
/// # Errors
/// Returns [`StoreError::RequiredKeysFile`] for symlinks and non-regular
/// files, and [`StoreError::Io`] if the file cannot be read.
pub fn parse_file(path: &Path) -> StoreResult<Vec<String>> {
    let metadata = fs::symlink_metadata(path).map_err(|e| StoreError::io(path, e))?;
    if metadata.file_type().is_symlink() {
        return Err(rejected(path, "symlinks are not allowed"));
    }
    if !metadata.is_file() {
        return Err(rejected(path, "not a regular file"));
    }
    let contents = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    Ok(parse_keys(&contents))
}

/// Extract keys from required-keys text
#[must_use]
pub fn parse_keys(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| line.find('#').map_or(line, |hash| &line[..hash]).trim())
        .filter(|key| !key.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Drop repeated keys, keeping first occurrences in order
#[must_use]
pub fn dedupe<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter()
        .map(|key| key.as_ref().trim().to_owned())
        .filter(|key| !key.is_empty())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

fn rejected(path: &Path, reason: &str) -> StoreError {
    StoreError::RequiredKeysFile {
        path: path.to_path_buf(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn strips_comments_and_blanks() {
        let keys = parse_keys("# required\nproject.name\n\n  testing.runner  # inline\n   \n#x\n");
        assert_eq!(keys, vec!["project.name", "testing.runner"]);
    }

    #[test]
    fn dedupe_keeps_first_order() {
        let keys = dedupe(["b", "a", "b", " a ", "", "c"]);
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn reads_regular_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("required.txt");
        fs::write(&path, "a\nb.c\n").unwrap();
        assert_eq!(parse_file(&path).unwrap(), vec!["a", "b.c"]);
    }

    #[test]
    fn rejects_directory() {
        let dir = TempDir::new().unwrap();
        let err = parse_file(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::RequiredKeysFile { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("real.txt");
        fs::write(&real, "a\n").unwrap();
        let link = dir.path().join("link.txt");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let err = parse_file(&link).unwrap_err();
        assert!(matches!(err, StoreError::RequiredKeysFile { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = parse_file(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
