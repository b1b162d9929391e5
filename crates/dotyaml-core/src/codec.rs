//! YAML text <-> [`Document`] conversion
//!
//! Decoding goes through `serde_yaml` and keeps mapping order. Encoding is
//! block style with two-space indentation; comments are not carried through
//! a decode/encode cycle (see [`crate::patch`] for that).

use crate::document::Document;
use crate::value::{Scalar, Value};

/// Errors converting between text and documents
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Input is not well-formed YAML
    #[error("invalid YAML: {0}")]
    Parse(#[source] serde_yaml::Error),

    /// Top-level node is a scalar or sequence
    #[error("document root must be a mapping, found {found}")]
    RootNotMapping { found: &'static str },

    /// Serializer failure
    #[error("failed to serialize YAML: {0}")]
    Encode(#[source] serde_yaml::Error),
}

/// Parse YAML text into a document
///
/// Empty and comment-only input decodes to an empty document.
///
/// # Errors
/// Returns [`CodecError::Parse`] for malformed YAML and
/// [`CodecError::RootNotMapping`] when the root is not a mapping.
pub fn decode(src: &str) -> Result<Document, CodecError> {
    if src.trim().is_empty() {
        return Ok(Document::new());
    }
    let raw: serde_yaml::Value = serde_yaml::from_str(src).map_err(CodecError::Parse)?;
    match Value::from(raw) {
        Value::Mapping(root) => Ok(Document::from_mapping(root)),
        Value::Scalar(Scalar::Null) => Ok(Document::new()),
        other => Err(CodecError::RootNotMapping {
            found: other.kind(),
        }),
    }
}

/// Serialize a document to YAML text
///
/// # Errors
/// Returns [`CodecError::Encode`] if the serializer fails.
pub fn encode(doc: &Document) -> Result<String, CodecError> {
    serde_yaml::to_string(doc.as_value()).map_err(CodecError::Encode)
}
