//! Testing utilities for the dotyaml workspace
//!
//! Temp config files, store constructors and on-disk assertions.

#![allow(missing_docs)]

use dotyaml_core::{codec, Document};
use dotyaml_store::durable::TEMP_PREFIX;
use dotyaml_store::{ConfigStore, FileLock, StoreOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

/// Config file inside its own temp directory
#[derive(Debug)]
pub struct TempConfig {
    dir: TempDir,
    path: PathBuf,
}

impl TempConfig {
    /// Directory holding `config.yaml` with `contents`
    pub fn new(contents: &str) -> Self {
        let config = Self::missing();
        fs::write(&config.path, contents).unwrap();
        config
    }

    /// Directory where `config.yaml` does not exist yet
    pub fn missing() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        Self { dir, path }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn read(&self) -> String {
        fs::read_to_string(&self.path).unwrap()
    }

    pub fn document(&self) -> Document {
        doc(&self.read())
    }

    pub fn modified(&self) -> SystemTime {
        fs::metadata(&self.path).unwrap().modified().unwrap()
    }

    pub fn store(&self) -> ConfigStore {
        ConfigStore::new(&self.path)
    }

    pub fn store_with(&self, options: StoreOptions) -> ConfigStore {
        ConfigStore::with_options(&self.path, options)
    }

    /// Staged temp files left in the directory
    pub fn leftover_temp_files(&self) -> Vec<PathBuf> {
        fs::read_dir(self.dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(TEMP_PREFIX))
            })
            .collect()
    }

    pub fn lock_file_exists(&self) -> bool {
        FileLock::lock_path(&self.path).exists()
    }
}

/// Decode YAML text, panicking on error
pub fn doc(yaml: &str) -> Document {
    codec::decode(yaml).unwrap()
}
