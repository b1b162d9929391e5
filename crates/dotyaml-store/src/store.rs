//! File-backed configuration store
//!
//! Every operation reads the file fresh, applies one tree operation and (for
//! mutations) writes the result back atomically while holding the sidecar
//! lock. Nothing is cached between calls.

use crate::config::{InitOptions, StoreOptions};
use crate::durable::write_atomic;
use crate::error::{Operation, StoreError, StoreResult};
use crate::lock::{FileLock, LockMode};
use crate::mutate::{self, MutateError};
use crate::required_keys::dedupe;
use crate::templates::Template;
use dotyaml_core::{codec, coerce, escape_key, flatten, Document, Mapping, Path, PathError, Value};
use indexmap::IndexMap;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path as FsPath, PathBuf};

/// Before/after record of one key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    /// Key path as given
    pub key: String,
    /// Value before the change (`None` if absent)
    pub old_value: Option<Value>,
    /// Value after the change
    pub new_value: Value,
}

/// Result of [`ConfigStore::list`]
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// Mapping under `prefix` (the whole document when `None`)
    Tree {
        /// Requested prefix
        prefix: Option<String>,
        /// Entries of the mapping
        entries: Mapping,
    },
    /// Prefix names a scalar or sequence
    Leaf {
        /// Requested prefix
        key: String,
        /// Value stored there
        value: Value,
    },
}

impl Listing {
    /// Sorted dotted keys of every leaf
    #[must_use]
    pub fn flat_keys(&self) -> Vec<String> {
        self.flat_entries().into_iter().map(|(key, _)| key).collect()
    }

    /// Sorted `(dotted key, displayed value)` pairs of every leaf
    #[must_use]
    pub fn flat_entries(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = match self {
            Self::Tree { prefix, entries } => entries
                .iter()
                .flat_map(|(key, value)| {
                    let key = match prefix {
                        Some(prefix) => format!("{prefix}.{}", escape_key(key)),
                        None => escape_key(key),
                    };
                    flatten(value, &key)
                        .into_iter()
                        .map(|(key, leaf)| (key, leaf.to_string()))
                        .collect::<Vec<_>>()
                })
                .collect(),
            Self::Leaf { key, value } => vec![(key.clone(), value.to_string())],
        };
        out.sort();
        out
    }
}

/// Result of [`ConfigStore::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Number of leaf values
    pub key_count: usize,
    /// Top-level keys, sorted
    pub sections: Vec<String>,
}

/// Outcome of [`ConfigStore::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InitStatus {
    /// File was written from the template
    Created,
    /// File already existed and was left alone
    Exists,
}

/// Result of [`ConfigStore::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InitReport {
    /// What happened
    pub status: InitStatus,
    /// Number of leaf values in the resulting file
    pub key_count: usize,
}

/// Configuration file handle
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    options: StoreOptions,
}

impl ConfigStore {
    /// Store with default options
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_options(path, StoreOptions::default())
    }

    /// Store with explicit options
    #[inline]
    #[must_use]
    pub fn with_options(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &FsPath {
        &self.path
    }

    /// Options in effect
    #[inline]
    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Decode the whole file under a shared lock
    ///
    /// # Errors
    /// [`StoreError::FileNotFound`], [`StoreError::Codec`], lock and IO
    /// errors.
    pub fn read(&self) -> StoreResult<Document> {
        self.load()?.ok_or_else(|| self.missing_file(false))
    }

    /// Value at `key`
    ///
    /// # Errors
    /// [`StoreError::NotFound`] when nothing is stored there, plus the
    /// errors of [`ConfigStore::read`].
    pub fn get(&self, key: &str) -> StoreResult<Value> {
        let doc = self.read()?;
        lookup(&doc, key)
    }

    /// Value at `key`, or `default` when the key is absent
    ///
    /// # Errors
    /// As [`ConfigStore::get`], except [`StoreError::NotFound`].
    pub fn get_or(&self, key: &str, default: Value) -> StoreResult<Value> {
        match self.get(key) {
            Err(err) if err.is_not_found() => Ok(default),
            other => other,
        }
    }

    /// Values of several keys from one read
    ///
    /// Repeated keys are reported once, in first-seen order. A key absent
    /// from the file falls back to `defaults`.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for the first key with neither a value nor a
    /// default, plus the errors of [`ConfigStore::read`].
    pub fn multiget<S: AsRef<str>>(
        &self,
        keys: &[S],
        defaults: &IndexMap<String, Value>,
    ) -> StoreResult<Vec<(String, Value)>> {
        let doc = self.read()?;
        dedupe(keys)
            .into_iter()
            .map(|key| {
                let value = match lookup(&doc, &key) {
                    Err(err) if err.is_not_found() => defaults.get(&key).cloned().ok_or(err)?,
                    other => other?,
                };
                Ok((key, value))
            })
            .collect()
    }

    /// Set `key` to `value`, keeping comments where the layout allows
    ///
    /// In dry-run mode this reports the change without locking or writing;
    /// a missing file still fails unless `create` is set.
    ///
    /// # Errors
    /// [`StoreError::FileNotFound`] without `create`, [`StoreError::Path`]
    /// when the key cannot be set, plus codec, lock and write errors.
    pub fn set(&self, key: &str, value: Value) -> StoreResult<Change> {
        let path = Path::parse(key);
        self.ensure_writable()?;
        if self.options.dry_run {
            let mut doc = self.peek()?;
            let old_value = doc.get(&path).cloned();
            doc.set(&path, value.clone())
                .map_err(|e| StoreError::path(Operation::Set, key, e))?;
            return Ok(Change {
                key: key.to_owned(),
                old_value,
                new_value: value,
            });
        }

        let _guard = self.lock(LockMode::Exclusive)?;
        let source = self.read_for_write()?;
        let mutation = mutate::set_preserving_comments(&source, &path, value.clone())
            .map_err(|e| self.mutate_error(key, e))?;
        if mutation.text != source {
            self.persist(&mutation.text)?;
        }
        tracing::info!(
            "Set {} in {} (comments preserved: {})",
            key,
            self.path.display(),
            mutation.preserved_comments
        );
        Ok(Change {
            key: key.to_owned(),
            old_value: mutation.old_value,
            new_value: value,
        })
    }

    /// Set `key` from a raw string, coercing numbers
    ///
    /// # Errors
    /// As [`ConfigStore::set`].
    pub fn set_raw(&self, key: &str, raw: &str) -> StoreResult<Change> {
        self.set(key, coerce(raw))
    }

    /// Remove the mapping entry at `key`
    ///
    /// Removing an absent key succeeds with `None` and leaves the file
    /// untouched.
    ///
    /// # Errors
    /// [`StoreError::Path`] for index targets and scalar parents, plus
    /// file, codec, lock and write errors.
    pub fn delete(&self, key: &str) -> StoreResult<Option<Value>> {
        let path = Path::parse(key);
        let removed = self.modify(|doc| {
            doc.delete(&path)
                .map_err(|e| StoreError::path(Operation::Delete, key, e))
        })?;
        if removed.is_some() {
            tracing::info!("Deleted {} from {}", key, self.path.display());
        }
        Ok(removed)
    }

    /// Append `value` to the sequence at `key`, creating it if absent
    ///
    /// # Errors
    /// [`StoreError::Path`] when `key` holds a non-sequence, plus file,
    /// codec, lock and write errors.
    pub fn push(&self, key: &str, value: Value) -> StoreResult<Change> {
        let path = Path::parse(key);
        let change = self.modify(|doc| {
            let old_value = doc.get(&path).cloned();
            doc.push(&path, value)
                .map_err(|e| StoreError::path(Operation::Push, key, e))?;
            Ok(Change {
                key: key.to_owned(),
                old_value,
                new_value: doc.get(&path).cloned().unwrap_or_else(Value::null),
            })
        })?;
        tracing::info!("Pushed to {} in {}", key, self.path.display());
        Ok(change)
    }

    /// Remove and return the last element of the sequence at `key`
    ///
    /// # Errors
    /// [`StoreError::Path`] when `key` is missing, not a sequence or empty,
    /// plus file, codec, lock and write errors.
    pub fn pop(&self, key: &str) -> StoreResult<Value> {
        let path = Path::parse(key);
        let popped = self.modify(|doc| {
            doc.pop(&path)
                .map_err(|e| StoreError::path(Operation::Pop, key, e))
        })?;
        tracing::info!("Popped from {} in {}", key, self.path.display());
        Ok(popped)
    }

    /// Set several keys from raw strings in one atomic write
    ///
    /// Entries are applied in order to one in-memory copy; if any fails the
    /// file is not touched. In dry-run mode this behaves like
    /// [`ConfigStore::preview`] but still requires the file to exist unless
    /// `create` is set.
    ///
    /// # Errors
    /// [`StoreError::Batch`] naming the first failing entry, plus file,
    /// codec, lock and write errors.
    pub fn multiset<K, V>(&self, entries: &[(K, V)]) -> StoreResult<Vec<Change>>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let entries = coerce_entries(entries);
        self.ensure_writable()?;
        if self.options.dry_run {
            let mut doc = self.peek()?;
            return apply_batch(&mut doc, &entries);
        }
        let changes = self.modify(|doc| apply_batch(doc, &entries))?;
        tracing::info!("Set {} keys in {}", changes.len(), self.path.display());
        Ok(changes)
    }

    /// Report what [`ConfigStore::multiset`] would change
    ///
    /// Reads the file without locking (an absent file reads as empty) and
    /// never writes anything, regardless of options.
    ///
    /// # Errors
    /// [`StoreError::Batch`] for an entry that would fail, plus codec and IO
    /// errors.
    pub fn preview<K, V>(&self, entries: &[(K, V)]) -> StoreResult<Vec<Change>>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut doc = self.peek()?;
        apply_batch(&mut doc, &coerce_entries(entries))
    }

    /// Subtree or leaf under `prefix` (whole document for `None` or `""`)
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for an absent prefix, plus the errors of
    /// [`ConfigStore::read`].
    pub fn list(&self, prefix: Option<&str>) -> StoreResult<Listing> {
        let doc = self.read()?;
        match prefix.filter(|p| !p.is_empty()) {
            None => Ok(Listing::Tree {
                prefix: None,
                entries: doc.entries().map(|(k, v)| (k.clone(), v.clone())).collect(),
            }),
            Some(prefix) => match lookup(&doc, prefix)? {
                Value::Mapping(entries) => Ok(Listing::Tree {
                    prefix: Some(prefix.to_owned()),
                    entries,
                }),
                value => Ok(Listing::Leaf {
                    key: prefix.to_owned(),
                    value,
                }),
            },
        }
    }

    /// Check that the file decodes and holds every `required` key
    ///
    /// # Errors
    /// [`StoreError::MissingKeys`] listing every absent key, plus the errors
    /// of [`ConfigStore::read`].
    pub fn validate<S: AsRef<str>>(&self, required: &[S]) -> StoreResult<ValidationReport> {
        let doc = self.read()?;
        let missing: Vec<String> = dedupe(required)
            .into_iter()
            .filter(|key| !doc.contains(&Path::parse(key)))
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::MissingKeys { keys: missing });
        }
        let mut sections = doc.sections();
        sections.sort();
        Ok(ValidationReport {
            key_count: doc.count_leaves(),
            sections,
        })
    }

    /// Write a template to the file unless it already exists
    ///
    /// Missing parent directories are created. With `force` an existing
    /// file is replaced.
    ///
    /// # Errors
    /// [`StoreError::Template`] / [`StoreError::Codec`] for unreadable or
    /// invalid templates, plus IO, lock and write errors.
    pub fn init(&self, options: &InitOptions) -> StoreResult<InitReport> {
        if self.options.dry_run {
            if self.path.exists() && !options.force {
                return Ok(exists(&self.peek()?));
            }
            let (_, doc) = self.load_template(&options.template)?;
            return Ok(created(&doc));
        }

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        let _guard = self.lock(LockMode::Exclusive)?;
        if !options.force {
            if let Some(source) = self.read_source()? {
                tracing::debug!("{} already exists, leaving it alone", self.path.display());
                return Ok(exists(&self.decode(&source)?));
            }
        }

        let (contents, doc) = self.load_template(&options.template)?;
        self.persist(&contents)?;
        tracing::info!("Initialized {} from {:?} template", self.path.display(), options.template);
        Ok(created(&doc))
    }

    fn load_template(&self, template: &Template) -> StoreResult<(String, Document)> {
        let contents = template.contents()?.into_owned();
        let origin = match template {
            Template::File(path) => path.as_path(),
            Template::Planning | Template::Minimal => self.path.as_path(),
        };
        let doc = codec::decode(&contents).map_err(|e| StoreError::codec(origin, e))?;
        Ok((contents, doc))
    }

    /// Lock, read, apply, and write back if the document changed
    fn modify<T>(&self, apply: impl FnOnce(&mut Document) -> StoreResult<T>) -> StoreResult<T> {
        self.ensure_writable()?;
        if self.options.dry_run {
            let mut doc = self.peek()?;
            return apply(&mut doc);
        }

        let _guard = self.lock(LockMode::Exclusive)?;
        let source = self.read_for_write()?;
        let mut doc = self.decode(&source)?;
        let before = doc.clone();
        let result = apply(&mut doc)?;
        if doc == before {
            tracing::debug!("{} unchanged, skipping write", self.path.display());
        } else {
            let text = codec::encode(&doc).map_err(|e| StoreError::codec(&self.path, e))?;
            self.persist(&text)?;
        }
        Ok(result)
    }

    /// Read under a shared lock; `None` if the file is absent
    fn load(&self) -> StoreResult<Option<Document>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let _guard = if self.options.dry_run {
            None
        } else {
            Some(self.lock(LockMode::Shared)?)
        };
        self.read_source()?
            .map(|source| self.decode(&source))
            .transpose()
    }

    /// Read without locking; an absent file is an empty document
    fn peek(&self) -> StoreResult<Document> {
        match self.read_source()? {
            Some(source) => self.decode(&source),
            None => Ok(Document::new()),
        }
    }

    fn read_source(&self) -> StoreResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(source) => Ok(Some(source)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    fn read_for_write(&self) -> StoreResult<String> {
        match self.read_source()? {
            Some(source) => Ok(source),
            None if self.options.create => Ok(String::new()),
            None => Err(self.missing_file(true)),
        }
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        if self.options.create || self.path.exists() {
            Ok(())
        } else {
            Err(self.missing_file(true))
        }
    }

    fn decode(&self, source: &str) -> StoreResult<Document> {
        codec::decode(source).map_err(|e| StoreError::codec(&self.path, e))
    }

    fn persist(&self, text: &str) -> StoreResult<()> {
        write_atomic(&self.path, text.as_bytes())?;
        tracing::debug!("Wrote {} bytes to {}", text.len(), self.path.display());
        Ok(())
    }

    fn lock(&self, mode: LockMode) -> StoreResult<FileLock> {
        Ok(FileLock::acquire(&self.path, mode, self.options.lock_timeout)?)
    }

    fn missing_file(&self, create_hint: bool) -> StoreError {
        StoreError::FileNotFound {
            path: self.path.clone(),
            create_hint,
        }
    }

    fn mutate_error(&self, key: &str, err: MutateError) -> StoreError {
        match err {
            MutateError::Codec(e) => StoreError::codec(&self.path, e),
            MutateError::Path(e) => StoreError::path(Operation::Set, key, e),
        }
    }
}

fn lookup(doc: &Document, key: &str) -> StoreResult<Value> {
    doc.get(&Path::parse(key))
        .cloned()
        .ok_or_else(|| StoreError::NotFound { key: key.to_owned() })
}

fn coerce_entries<K: AsRef<str>, V: AsRef<str>>(entries: &[(K, V)]) -> Vec<(String, Value)> {
    entries
        .iter()
        .map(|(key, raw)| (key.as_ref().to_owned(), coerce(raw.as_ref())))
        .collect()
}

fn apply_batch(doc: &mut Document, entries: &[(String, Value)]) -> StoreResult<Vec<Change>> {
    entries
        .iter()
        .enumerate()
        .map(|(index, (key, value))| {
            let path = Path::parse(key);
            let old_value = doc.get(&path).cloned();
            doc.set(&path, value.clone())
                .map_err(|e| batch_error(index, key, e))?;
            Ok(Change {
                key: key.clone(),
                old_value,
                new_value: value.clone(),
            })
        })
        .collect()
}

fn batch_error(index: usize, key: &str, source: PathError) -> StoreError {
    StoreError::Batch {
        index,
        key: key.to_owned(),
        source: Box::new(StoreError::path(Operation::Set, key, source)),
    }
}

fn exists(doc: &Document) -> InitReport {
    InitReport {
        status: InitStatus::Exists,
        key_count: doc.count_leaves(),
    }
}

fn created(doc: &Document) -> InitReport {
    InitReport {
        status: InitStatus::Created,
        key_count: doc.count_leaves(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_with(contents: &str) -> (TempDir, ConfigStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, contents).unwrap();
        (dir, ConfigStore::new(path))
    }

    #[test]
    fn get_distinguishes_null_from_missing() {
        let (_dir, store) = store_with("a: null\n");
        assert_eq!(store.get("a").unwrap(), Value::null());
        assert!(store.get("b").unwrap_err().is_not_found());
    }

    #[test]
    fn get_or_falls_back() {
        let (_dir, store) = store_with("a: 1\n");
        assert_eq!(store.get_or("a", Value::from(9)).unwrap(), Value::from(1));
        assert_eq!(store.get_or("b", Value::from(9)).unwrap(), Value::from(9));
    }

    #[test]
    fn set_raw_coerces() {
        let (_dir, store) = store_with("a: x\n");
        let change = store.set_raw("a", "42").unwrap();
        assert_eq!(change.old_value, Some(Value::from("x")));
        assert_eq!(change.new_value, Value::from(42));
        assert_eq!(store.get("a").unwrap(), Value::from(42));
    }

    #[test]
    fn delete_missing_key_does_not_rewrite() {
        let (_dir, store) = store_with("# keep\na: 1\n");
        assert_eq!(store.delete("nope").unwrap(), None);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "# keep\na: 1\n");
    }

    #[test]
    fn push_reports_whole_sequence() {
        let (_dir, store) = store_with("tags: [a]\n");
        let change = store.push("tags", Value::from("b")).unwrap();
        assert_eq!(change.old_value, Some(Value::from(vec![Value::from("a")])));
        assert_eq!(
            change.new_value,
            Value::from(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn multiset_reports_sequential_old_values() {
        let (_dir, store) = store_with("a: 1\n");
        let changes = store.multiset(&[("a", "2"), ("a", "3")]).unwrap();
        assert_eq!(changes[0].old_value, Some(Value::from(1)));
        assert_eq!(changes[1].old_value, Some(Value::from(2)));
        assert_eq!(store.get("a").unwrap(), Value::from(3));
    }

    #[test]
    fn missing_file_without_create() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("absent.yaml"));
        let err = store.set_raw("a", "1").unwrap_err();
        assert!(err.is_file_not_found());
        assert!(err.hint().is_some());
        assert!(store.get("a").unwrap_err().is_file_not_found());
        assert!(!FileLock::lock_path(store.path()).exists());
    }

    #[test]
    fn listing_flattens_sorted() {
        let (_dir, store) = store_with("b:\n  y: 2\n  x: 1\na: [1, 2]\n");
        let listing = store.list(None).unwrap();
        assert_eq!(listing.flat_keys(), vec!["a", "b.x", "b.y"]);

        let listing = store.list(Some("b")).unwrap();
        assert_eq!(
            listing.flat_entries(),
            vec![("b.x".to_owned(), "1".to_owned()), ("b.y".to_owned(), "2".to_owned())]
        );

        let listing = store.list(Some("b.x")).unwrap();
        assert_eq!(
            listing,
            Listing::Leaf {
                key: "b.x".into(),
                value: Value::from(1)
            }
        );
        assert!(store.list(Some("c")).unwrap_err().is_not_found());
    }

    #[test]
    fn validate_sorts_sections() {
        let (_dir, store) = store_with("zeta: 1\nalpha:\n  x: 1\n  y: 2\n");
        let report = store.validate::<&str>(&[]).unwrap();
        assert_eq!(report.sections, vec!["alpha", "zeta"]);
        assert_eq!(report.key_count, 3);
    }
}
