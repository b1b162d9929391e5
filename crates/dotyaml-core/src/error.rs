//! Tree access errors

use crate::path::Path;

/// Errors from addressing or modifying a [`crate::Document`]
///
/// Every variant names the path (or path prefix) where the problem was found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Operation requires at least one segment
    #[error("empty path")]
    EmptyPath,

    /// Bracket text is not an integer
    #[error("invalid array index '{index}' at {path}")]
    InvalidIndex { path: Path, index: String },

    /// Index outside `-len..len`
    #[error("array index {index} out of bounds at {path} (length: {len})")]
    OutOfBounds { path: Path, index: i64, len: usize },

    /// Index step or push/pop on something that is not a sequence
    #[error("path {path} is not an array")]
    NotAnArray { path: Path },

    /// Pop from an empty sequence
    #[error("array at {path} is empty")]
    EmptyArray { path: Path },

    /// Nothing stored at the path
    #[error("path {path} not found")]
    Missing { path: Path },

    /// Key step into a scalar or sequence
    #[error("path {path} is not traversable")]
    NotTraversable { path: Path },

    /// Negative index where no sequence exists to count from
    #[error("negative index {index} used on non-array at {path}")]
    NegativeIndexOnNonArray { path: Path, index: i64 },

    /// Sequence elements are not removed in place
    #[error("cannot delete array element at {path}; use pop")]
    UnsupportedDelete { path: Path },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_path() {
        let err = PathError::NotAnArray {
            path: Path::parse("a.b"),
        };
        assert_eq!(err.to_string(), "path a.b is not an array");

        let err = PathError::OutOfBounds {
            path: Path::parse("list"),
            index: 5,
            len: 2,
        };
        assert_eq!(
            err.to_string(),
            "array index 5 out of bounds at list (length: 2)"
        );
    }

    #[test]
    fn empty_array_message() {
        let err = PathError::EmptyArray {
            path: Path::parse("queue"),
        };
        assert_eq!(err.to_string(), "array at queue is empty");
    }
}
