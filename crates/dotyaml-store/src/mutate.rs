//! Comment-preserving single-key updates
//!
//! [`set_preserving_comments`] first tries to splice the new value into the
//! source text at the node's exact location (or append a new entry to the
//! deepest existing parent mapping). The patched text is accepted only if it
//! decodes to exactly the tree a plain [`Document::set`] would produce;
//! otherwise the document is re-serialized and comments are lost.

use dotyaml_core::{codec, patch, resolve, CodecError, Document, Path, PathError, Value};

/// Errors computing a mutation
#[derive(Debug, thiserror::Error)]
pub enum MutateError {
    /// Source text could not be decoded or the result encoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Path does not fit the document
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Result of [`set_preserving_comments`]
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// New file contents
    pub text: String,
    /// Value previously stored at the path
    pub old_value: Option<Value>,
    /// Whether the source text was edited in place
    pub preserved_comments: bool,
}

/// Compute the file contents after setting `path` to `value`
///
/// # Errors
/// Returns [`MutateError::Codec`] for unparseable source and
/// [`MutateError::Path`] when the path cannot be set.
pub fn set_preserving_comments(source: &str, path: &Path, value: Value) -> Result<Mutation, MutateError> {
    let doc = codec::decode(source)?;
    let resolved = resolve(&doc, path)?;
    let old_value = doc.get(path).cloned();

    let mut expected = doc;
    expected.set(path, value.clone())?;

    if let Some(text) = patch::patch(source, &resolved, &value) {
        if verified(&text, &expected) {
            return Ok(Mutation {
                text,
                old_value,
                preserved_comments: true,
            });
        }
        tracing::debug!("In-place edit of {} did not round-trip, re-serializing", path);
    } else {
        tracing::debug!("No in-place edit available for {}, re-serializing", path);
    }

    Ok(Mutation {
        text: codec::encode(&expected)?,
        old_value,
        preserved_comments: false,
    })
}

fn verified(text: &str, expected: &Document) -> bool {
    codec::decode(text).is_ok_and(|doc| &doc == expected)
}
