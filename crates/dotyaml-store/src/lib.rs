//! dotyaml store
//!
//! File-backed configuration store built on [`dotyaml_core`].
//!
//! # Guarantees
//!
//! - Mutations run under an exclusive advisory lock on `<file>.lock`
//!   ([`FileLock`]); reads take a shared lock.
//! - Files are replaced atomically through a temp file in the same directory
//!   ([`durable`]), so readers see either the old or the new contents.
//! - Single-key `set` edits the source text in place when it can, keeping
//!   comments and formatting ([`mutate`]).
//! - Batches ([`ConfigStore::multiset`]) are all-or-nothing.
//!
//! # Example
//!
//! ```rust,ignore
//! use dotyaml_store::{ConfigStore, StoreOptions};
//!
//! let store = ConfigStore::with_options("config.yaml", StoreOptions::new().with_create(true));
//! store.set_raw("server.port", "8080")?;
//! assert_eq!(store.get("server.port")?.to_string(), "8080");
//! ```

#![warn(unreachable_pub)]

mod config;
pub mod durable;
mod error;
pub mod lock;
pub mod mutate;
pub mod required_keys;
mod store;
pub mod templates;

pub use config::{InitOptions, StoreOptions};
pub use durable::{write_atomic, StagedWrite, WriteError};
pub use error::{Operation, StoreError, StoreResult};
pub use lock::{FileLock, LockError, LockMode};
pub use store::{Change, ConfigStore, InitReport, InitStatus, Listing, ValidationReport};
pub use templates::Template;

pub use dotyaml_core::{coerce, Document, Path, Value};
