//! dotyaml core
//!
//! Path-addressed access to YAML configuration documents.
//!
//! # Core Concepts
//!
//! - [`Path`]: Parsed dot/bracket key expression (`a.b[0].c`, `list[-1]`)
//! - [`Document`]: Decoded configuration tree with get/set/delete/push/pop
//! - [`resolve`]: Rewrites negative indices against a live document
//! - [`codec`]: Text <-> [`Document`] conversion
//! - [`SourceTree`]: Lossless syntax tree over the raw text for comment-preserving patches
//!
//! # Example
//!
//! ```rust,ignore
//! use dotyaml_core::{codec, Path, Value};
//!
//! let mut doc = codec::decode("server:\n  port: 80\n")?;
//! doc.set(&Path::parse("server.port"), Value::from(8080))?;
//! assert_eq!(doc.get(&Path::parse("server.port")), Some(&Value::from(8080)));
//! ```

#![warn(unreachable_pub)]

pub mod codec;
mod document;
mod error;
pub mod patch;
mod path;
mod resolve;
mod value;

pub use codec::CodecError;
pub use document::{flatten, Document};
pub use error::PathError;
pub use patch::{SourceTree, Span};
pub use path::{escape_key, Path, ResolvedPath, Segment, Step};
pub use resolve::resolve;
pub use value::{coerce, Mapping, Scalar, Value};
