//! Negative index resolution

use crate::document::Document;
use crate::error::PathError;
use crate::path::{normalize_index, Path, ResolvedPath, Segment, Step};
use crate::value::Value;

/// Rewrite every negative index of `path` against the sequences in `doc`
///
/// Key segments and non-negative indices pass through unchanged, even when
/// nothing exists at that position yet. A negative index needs a live
/// sequence to count from.
///
/// # Errors
/// - [`PathError::InvalidIndex`] for non-integer bracket text
/// - [`PathError::NegativeIndexOnNonArray`] when the prefix is missing or
///   not a sequence
/// - [`PathError::OutOfBounds`] when `-index > len`
pub fn resolve(doc: &Document, path: &Path) -> Result<ResolvedPath, PathError> {
    let mut current = Some(doc.as_value());
    let mut steps = Vec::with_capacity(path.len());

    for (depth, segment) in path.iter().enumerate() {
        let step = match segment {
            Segment::Key(key) => {
                current = current.and_then(Value::as_mapping).and_then(|map| map.get(key));
                Step::Key(key.clone())
            }
            Segment::Index(index) if *index < 0 => {
                let items = current.and_then(Value::as_sequence).ok_or_else(|| {
                    PathError::NegativeIndexOnNonArray {
                        path: path.prefix(depth),
                        index: *index,
                    }
                })?;
                let slot = normalize_index(*index, items.len()).ok_or_else(|| {
                    PathError::OutOfBounds {
                        path: path.prefix(depth),
                        index: *index,
                        len: items.len(),
                    }
                })?;
                current = items.get(slot);
                Step::Index(slot)
            }
            Segment::Index(index) => {
                let slot = usize::try_from(*index).map_err(|_| PathError::OutOfBounds {
                    path: path.prefix(depth),
                    index: *index,
                    len: current.and_then(Value::as_sequence).map_or(0, <[Value]>::len),
                })?;
                current = current
                    .and_then(Value::as_sequence)
                    .and_then(|items| items.get(slot));
                Step::Index(slot)
            }
            Segment::InvalidIndex(text) => {
                return Err(PathError::InvalidIndex {
                    path: path.prefix(depth),
                    index: text.clone(),
                });
            }
        };
        steps.push(step);
    }

    Ok(ResolvedPath::new(steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use pretty_assertions::assert_eq;

    fn steps(resolved: &ResolvedPath) -> Vec<Step> {
        resolved.steps().to_vec()
    }

    #[test]
    fn resolves_negative_index() {
        let doc = decode("list: [a, b, c]\n").unwrap();
        let resolved = resolve(&doc, &Path::parse("list[-1]")).unwrap();
        assert_eq!(
            steps(&resolved),
            vec![Step::Key("list".into()), Step::Index(2)]
        );
    }

    #[test]
    fn resolves_nested_negative_indices() {
        let doc = decode("grid:\n  - [1, 2]\n  - [3, 4, 5]\n").unwrap();
        let resolved = resolve(&doc, &Path::parse("grid[-1][-3]")).unwrap();
        assert_eq!(resolved.to_path(), Path::parse("grid[1][0]"));
    }

    #[test]
    fn keys_and_positive_indices_pass_through() {
        let doc = decode("a: 1\n").unwrap();
        let resolved = resolve(&doc, &Path::parse("new.branch[3].leaf")).unwrap();
        assert_eq!(resolved.to_path(), Path::parse("new.branch[3].leaf"));
    }

    #[test]
    fn negative_index_on_missing() {
        let doc = decode("a: 1\n").unwrap();
        let err = resolve(&doc, &Path::parse("nope[-1]")).unwrap_err();
        assert_eq!(
            err,
            PathError::NegativeIndexOnNonArray {
                path: Path::parse("nope"),
                index: -1
            }
        );
    }

    #[test]
    fn negative_index_on_scalar() {
        let doc = decode("a: 1\n").unwrap();
        let err = resolve(&doc, &Path::parse("a[-1]")).unwrap_err();
        assert!(matches!(err, PathError::NegativeIndexOnNonArray { .. }));
    }

    #[test]
    fn negative_index_out_of_bounds() {
        let doc = decode("list: [a]\n").unwrap();
        let err = resolve(&doc, &Path::parse("list[-2]")).unwrap_err();
        assert_eq!(
            err,
            PathError::OutOfBounds {
                path: Path::parse("list"),
                index: -2,
                len: 1
            }
        );
    }

    #[test]
    fn negative_index_on_empty_sequence() {
        let doc = decode("list: []\n").unwrap();
        let err = resolve(&doc, &Path::parse("list[-1]")).unwrap_err();
        assert!(matches!(err, PathError::OutOfBounds { len: 0, .. }));
    }

    #[test]
    fn invalid_index_rejected() {
        let doc = decode("list: [a]\n").unwrap();
        let err = resolve(&doc, &Path::parse("list[x]")).unwrap_err();
        assert!(matches!(err, PathError::InvalidIndex { .. }));
    }
}
