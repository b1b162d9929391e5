//! Configuration document tree
//!
//! [`Document`] owns a mapping-rooted [`Value`] tree and implements the five
//! path operations (get, set, delete, push, pop) on it. Paths may use
//! negative indices directly; they are normalized against the live sequence
//! at each step.

use crate::error::PathError;
use crate::path::{escape_key, normalize_index, Path, Segment};
use crate::value::{Mapping, Value};

/// Decoded configuration document
///
/// The root is always a mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Value,
}

impl Document {
    /// Empty document
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Value::mapping(),
        }
    }

    /// Wrap a root mapping
    #[inline]
    #[must_use]
    pub fn from_mapping(root: Mapping) -> Self {
        Self {
            root: Value::Mapping(root),
        }
    }

    /// Root as a value
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Top-level entries in document order
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.root.as_mapping().into_iter().flatten()
    }

    /// Unwrap into the root value
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        self.root
    }

    /// Check if the document has no keys
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// Get value at path
    ///
    /// Returns `None` when any segment is missing or does not match the
    /// node kind it lands on. The empty path yields the root.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&Value> {
        path.iter().try_fold(&self.root, child)
    }

    /// Mutable variant of [`Document::get`]
    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Value> {
        path.iter().try_fold(&mut self.root, child_mut)
    }

    /// Check if a value exists at path
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    /// Set value at path
    ///
    /// Missing intermediate keys are created as mappings. An existing
    /// intermediate that is not a mapping is replaced by an empty one when
    /// the next segment is a key. Index segments only address existing
    /// sequences and never extend them. The whole path is checked before
    /// the first write, so a failed set leaves the document unchanged.
    ///
    /// # Errors
    /// - [`PathError::EmptyPath`] for the root path
    /// - [`PathError::NotAnArray`] when an index lands on a missing or
    ///   non-sequence node
    /// - [`PathError::OutOfBounds`] / [`PathError::InvalidIndex`] for bad
    ///   indices
    pub fn set(&mut self, path: &Path, value: Value) -> Result<(), PathError> {
        if path.is_empty() {
            return Err(PathError::EmptyPath);
        }
        check_set(&self.root, path)?;
        set_in(&mut self.root, path, value)
    }

    /// Delete the mapping entry at path
    ///
    /// Deleting something that is not there is a no-op and returns
    /// `Ok(None)`; this includes paths whose intermediates are missing.
    ///
    /// # Errors
    /// - [`PathError::EmptyPath`] for the root path
    /// - [`PathError::UnsupportedDelete`] when the last segment is an index
    /// - [`PathError::NotTraversable`] when the parent is a scalar
    pub fn delete(&mut self, path: &Path) -> Result<Option<Value>, PathError> {
        let Some(parent_path) = path.parent() else {
            return Err(PathError::EmptyPath);
        };
        let Some(last) = path.last() else {
            return Err(PathError::EmptyPath);
        };
        let Some(parent) = self.get_mut(&parent_path) else {
            return Ok(None);
        };

        match (parent, last) {
            (_, Segment::Index(_) | Segment::InvalidIndex(_)) => {
                Err(PathError::UnsupportedDelete { path: path.clone() })
            }
            (Value::Mapping(map), Segment::Key(key)) => Ok(map.shift_remove(key)),
            (_, Segment::Key(_)) => Err(PathError::NotTraversable { path: parent_path }),
        }
    }

    /// Append to the sequence at path
    ///
    /// A missing path is created as a one-element sequence.
    ///
    /// # Errors
    /// - [`PathError::NotAnArray`] when the path holds a non-sequence
    /// - any error of [`Document::set`] when creating the sequence
    pub fn push(&mut self, path: &Path, value: Value) -> Result<(), PathError> {
        match self.get_mut(path) {
            None => self.set(path, Value::Sequence(vec![value])),
            Some(Value::Sequence(items)) => {
                items.push(value);
                Ok(())
            }
            Some(_) => Err(PathError::NotAnArray { path: path.clone() }),
        }
    }

    /// Remove and return the last element of the sequence at path
    ///
    /// # Errors
    /// - [`PathError::Missing`] when nothing is stored at path
    /// - [`PathError::NotAnArray`] when the path holds a non-sequence
    /// - [`PathError::EmptyArray`] when the sequence is empty
    pub fn pop(&mut self, path: &Path) -> Result<Value, PathError> {
        match self.get_mut(path) {
            None => Err(PathError::Missing { path: path.clone() }),
            Some(Value::Sequence(items)) => items
                .pop()
                .ok_or_else(|| PathError::EmptyArray { path: path.clone() }),
            Some(_) => Err(PathError::NotAnArray { path: path.clone() }),
        }
    }

    /// Top-level keys in document order
    #[must_use]
    pub fn sections(&self) -> Vec<String> {
        self.entries().map(|(key, _)| key.clone()).collect()
    }

    /// Number of leaves (scalars and sequences) under the root
    #[must_use]
    pub fn count_leaves(&self) -> usize {
        flatten(&self.root, "").len()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten a tree into `(dotted key, leaf)` pairs in document order
///
/// Mappings are descended; sequences and scalars are leaves. Keys containing
/// `.` are escaped so each flattened key parses back to its own path. An
/// empty mapping contributes nothing.
#[must_use]
pub fn flatten<'a>(value: &'a Value, prefix: &str) -> Vec<(String, &'a Value)> {
    let mut out = Vec::new();
    flatten_into(value, prefix, &mut out);
    out
}

fn flatten_into<'a>(value: &'a Value, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let key = escape_key(key);
                let full = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, &full, out);
            }
        }
        leaf => out.push((prefix.to_owned(), leaf)),
    }
}

fn child<'a>(current: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (current, segment) {
        (Value::Mapping(map), Segment::Key(key)) => map.get(key),
        (Value::Sequence(items), Segment::Index(index)) => {
            normalize_index(*index, items.len()).and_then(|slot| items.get(slot))
        }
        _ => None,
    }
}

fn child_mut<'a>(current: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match (current, segment) {
        (Value::Mapping(map), Segment::Key(key)) => map.get_mut(key),
        (Value::Sequence(items), Segment::Index(index)) => {
            normalize_index(*index, items.len()).and_then(move |slot| items.get_mut(slot))
        }
        _ => None,
    }
}

fn set_in(root: &mut Value, path: &Path, value: Value) -> Result<(), PathError> {
    let segments = path.segments();
    let Some((last, parents)) = segments.split_last() else {
        return Err(PathError::EmptyPath);
    };

    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        let next = &segments[depth + 1];
        current = descend(current, segment, next, path, depth)?;
    }

    match (current, last) {
        (Value::Mapping(map), Segment::Key(key)) => {
            map.insert(key.clone(), value);
            Ok(())
        }
        (Value::Sequence(items), Segment::Index(index)) => {
            let slot = sequence_slot(items.len(), *index, path, parents.len())?;
            items[slot] = value;
            Ok(())
        }
        (Value::Sequence(_), Segment::InvalidIndex(text)) => Err(PathError::InvalidIndex {
            path: path.prefix(parents.len()),
            index: text.clone(),
        }),
        (_, Segment::Key(_)) => Err(PathError::NotTraversable {
            path: path.prefix(parents.len()),
        }),
        (_, _) => Err(PathError::NotAnArray {
            path: path.prefix(parents.len()),
        }),
    }
}

/// Walk path without writing and report the error [`set_in`] would hit
fn check_set(root: &Value, path: &Path) -> Result<(), PathError> {
    let segments = path.segments();
    let Some((last, parents)) = segments.split_last() else {
        return Err(PathError::EmptyPath);
    };

    // `None` is an empty mapping the write would create
    let mut current = Some(root);
    for (depth, segment) in parents.iter().enumerate() {
        let next = &segments[depth + 1];
        let child = match (current, segment) {
            (None, Segment::Key(_)) => None,
            (Some(Value::Mapping(map)), Segment::Key(key)) => map.get(key),
            (Some(Value::Sequence(items)), Segment::Index(index)) => {
                Some(&items[sequence_slot(items.len(), *index, path, depth)?])
            }
            (Some(Value::Sequence(_)), Segment::InvalidIndex(text)) => {
                return Err(PathError::InvalidIndex {
                    path: path.prefix(depth),
                    index: text.clone(),
                });
            }
            (Some(_), Segment::Key(_)) => {
                return Err(PathError::NotTraversable {
                    path: path.prefix(depth),
                });
            }
            (_, _) => {
                return Err(PathError::NotAnArray {
                    path: path.prefix(depth),
                });
            }
        };
        current = if next.is_index() {
            match child {
                Some(value) if value.is_sequence() => Some(value),
                _ => {
                    return Err(PathError::NotAnArray {
                        path: path.prefix(depth + 1),
                    })
                }
            }
        } else {
            child.filter(|value| value.is_mapping())
        };
    }

    let depth = parents.len();
    match (current, last) {
        (None | Some(Value::Mapping(_)), Segment::Key(_)) => Ok(()),
        (Some(Value::Sequence(items)), Segment::Index(index)) => {
            sequence_slot(items.len(), *index, path, depth).map(|_| ())
        }
        (Some(Value::Sequence(_)), Segment::InvalidIndex(text)) => Err(PathError::InvalidIndex {
            path: path.prefix(depth),
            index: text.clone(),
        }),
        (Some(_), Segment::Key(_)) => Err(PathError::NotTraversable {
            path: path.prefix(depth),
        }),
        (_, _) => Err(PathError::NotAnArray {
            path: path.prefix(depth),
        }),
    }
}

/// Step one segment down for a write, shaping the child for `next`
fn descend<'a>(
    current: &'a mut Value,
    segment: &Segment,
    next: &Segment,
    path: &Path,
    depth: usize,
) -> Result<&'a mut Value, PathError> {
    let here = || path.prefix(depth + 1);
    let child = match (current, segment) {
        (Value::Mapping(map), Segment::Key(key)) => {
            if next.is_index() && !map.contains_key(key) {
                return Err(PathError::NotAnArray { path: here() });
            }
            map.entry(key.clone()).or_insert_with(Value::mapping)
        }
        (Value::Sequence(items), Segment::Index(index)) => {
            let slot = sequence_slot(items.len(), *index, path, depth)?;
            &mut items[slot]
        }
        (Value::Sequence(_), Segment::InvalidIndex(text)) => {
            return Err(PathError::InvalidIndex {
                path: path.prefix(depth),
                index: text.clone(),
            });
        }
        (_, Segment::Key(_)) => {
            return Err(PathError::NotTraversable {
                path: path.prefix(depth),
            });
        }
        (_, _) => {
            return Err(PathError::NotAnArray {
                path: path.prefix(depth),
            });
        }
    };

    if next.is_index() {
        if !child.is_sequence() {
            return Err(PathError::NotAnArray { path: here() });
        }
    } else if !child.is_mapping() {
        tracing::warn!("Replacing {} at {} with an empty mapping", child.kind(), here());
        *child = Value::mapping();
    }
    Ok(child)
}

fn sequence_slot(len: usize, index: i64, path: &Path, depth: usize) -> Result<usize, PathError> {
    normalize_index(index, len).ok_or_else(|| PathError::OutOfBounds {
        path: path.prefix(depth),
        index,
        len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use pretty_assertions::assert_eq;

    fn doc(yaml: &str) -> Document {
        decode(yaml).unwrap()
    }

    fn p(expr: &str) -> Path {
        Path::parse(expr)
    }

    #[test]
    fn get_nested_key() {
        let d = doc("helper:\n  llm: claude\n");
        assert_eq!(d.get(&p("helper.llm")), Some(&Value::from("claude")));
    }

    #[test]
    fn get_indices() {
        let d = doc("items: [a, b, c]\n");
        assert_eq!(d.get(&p("items[0]")), Some(&Value::from("a")));
        assert_eq!(d.get(&p("items[-1]")), Some(&Value::from("c")));
        assert_eq!(d.get(&p("items[3]")), None);
        assert_eq!(d.get(&p("items[-4]")), None);
    }

    #[test]
    fn get_kind_mismatch_is_none() {
        let d = doc("a: 1\nlist: [x]\n");
        assert_eq!(d.get(&p("a.b")), None);
        assert_eq!(d.get(&p("a[0]")), None);
        assert_eq!(d.get(&p("list.key")), None);
        assert_eq!(d.get(&p("list[nope]")), None);
    }

    #[test]
    fn get_root() {
        let d = doc("a: 1\n");
        assert_eq!(d.get(&Path::root()), Some(d.as_value()));
    }

    #[test]
    fn set_creates_intermediate_mappings() {
        let mut d = Document::new();
        d.set(&p("a.b.c"), Value::from(1)).unwrap();
        assert_eq!(d, doc("a:\n  b:\n    c: 1\n"));
    }

    #[test]
    fn set_replaces_scalar_intermediate() {
        let mut d = doc("a: 5\n");
        d.set(&p("a.b"), Value::from("x")).unwrap();
        assert_eq!(d, doc("a:\n  b: x\n"));
    }

    #[test]
    fn set_keeps_key_position() {
        let mut d = doc("first: 1\nsecond: 2\nthird: 3\n");
        d.set(&p("second"), Value::from(20)).unwrap();
        assert_eq!(d.sections(), vec!["first", "second", "third"]);
    }

    #[test]
    fn set_sequence_element() {
        let mut d = doc("list: [a, b, c]\n");
        d.set(&p("list[1]"), Value::from("B")).unwrap();
        d.set(&p("list[-1]"), Value::from("C")).unwrap();
        assert_eq!(d, doc("list: [a, B, C]\n"));
    }

    #[test]
    fn set_through_sequence_element() {
        let mut d = doc("servers:\n  - name: a\n  - name: b\n");
        d.set(&p("servers[-1].port"), Value::from(80)).unwrap();
        assert_eq!(
            d,
            doc("servers:\n  - name: a\n  - name: b\n    port: 80\n")
        );
    }

    #[test]
    fn set_index_on_missing_is_not_an_array() {
        let mut d = doc("x: 1\n");
        let err = d.set(&p("y[5]"), Value::from(2)).unwrap_err();
        assert_eq!(err, PathError::NotAnArray { path: p("y") });
        assert_eq!(d, doc("x: 1\n"));
    }

    #[test]
    fn set_out_of_bounds() {
        let mut d = doc("list: [a]\n");
        let err = d.set(&p("list[1]"), Value::from("b")).unwrap_err();
        assert_eq!(
            err,
            PathError::OutOfBounds {
                path: p("list"),
                index: 1,
                len: 1
            }
        );
    }

    #[test]
    fn set_invalid_index() {
        let mut d = doc("list: [a]\n");
        let err = d.set(&p("list[x]"), Value::from("b")).unwrap_err();
        assert!(matches!(err, PathError::InvalidIndex { .. }));
    }

    #[test]
    fn failed_set_creates_no_keys() {
        let mut d = doc("keep: true\n");
        let err = d.set(&p("new.branch[0]"), Value::from(1)).unwrap_err();
        assert_eq!(err, PathError::NotAnArray { path: p("new.branch") });
        assert_eq!(d, doc("keep: true\n"));
    }

    #[test]
    fn failed_set_keeps_scalar_intermediate() {
        let mut d = doc("a: 1\nlist: [x]\n");
        let err = d.set(&p("a.b.c[0]"), Value::from(1)).unwrap_err();
        assert_eq!(err, PathError::NotAnArray { path: p("a.b.c") });

        let err = d.set(&p("a.list[3]"), Value::from(1)).unwrap_err();
        assert_eq!(err, PathError::NotAnArray { path: p("a.list") });

        let err = d.set(&p("list[0].deep[2]"), Value::from(1)).unwrap_err();
        assert_eq!(err, PathError::NotAnArray { path: p("list[0].deep") });
        assert_eq!(d, doc("a: 1\nlist: [x]\n"));
    }

    #[test]
    fn set_root_is_empty_path() {
        let mut d = Document::new();
        assert_eq!(d.set(&Path::root(), Value::from(1)), Err(PathError::EmptyPath));
    }

    #[test]
    fn delete_removes_key_preserving_order() {
        let mut d = doc("a: 1\nb: 2\nc: 3\n");
        assert_eq!(d.delete(&p("b")).unwrap(), Some(Value::from(2)));
        assert_eq!(d.sections(), vec!["a", "c"]);
    }

    #[test]
    fn delete_missing_is_noop() {
        let mut d = doc("a: 1\n");
        assert_eq!(d.delete(&p("zzz")).unwrap(), None);
        assert_eq!(d.delete(&p("x.y.z")).unwrap(), None);
        assert_eq!(d, doc("a: 1\n"));
    }

    #[test]
    fn delete_is_idempotent() {
        let mut d = doc("a:\n  b: 1\n  c: 2\n");
        d.delete(&p("a.b")).unwrap();
        let once = d.clone();
        d.delete(&p("a.b")).unwrap();
        assert_eq!(d, once);
    }

    #[test]
    fn delete_array_element_unsupported() {
        let mut d = doc("list: [a, b]\n");
        let err = d.delete(&p("list[0]")).unwrap_err();
        assert_eq!(err, PathError::UnsupportedDelete { path: p("list[0]") });
    }

    #[test]
    fn delete_under_scalar_not_traversable() {
        let mut d = doc("a: 1\n");
        let err = d.delete(&p("a.b")).unwrap_err();
        assert_eq!(err, PathError::NotTraversable { path: p("a") });
    }

    #[test]
    fn push_creates_and_appends() {
        let mut d = Document::new();
        d.push(&p("tags"), Value::from("x")).unwrap();
        d.push(&p("tags"), Value::from("y")).unwrap();
        assert_eq!(d, doc("tags: [x, y]\n"));
    }

    #[test]
    fn push_onto_scalar_fails() {
        let mut d = doc("name: x\n");
        let err = d.push(&p("name"), Value::from("y")).unwrap_err();
        assert_eq!(err, PathError::NotAnArray { path: p("name") });
    }

    #[test]
    fn pop_returns_last() {
        let mut d = doc("queue: [1, 2, 3]\n");
        assert_eq!(d.pop(&p("queue")).unwrap(), Value::from(3));
        assert_eq!(d, doc("queue: [1, 2]\n"));
    }

    #[test]
    fn pop_errors() {
        let mut d = doc("empty: []\nname: x\n");
        assert_eq!(
            d.pop(&p("empty")),
            Err(PathError::EmptyArray { path: p("empty") })
        );
        assert_eq!(
            d.pop(&p("name")),
            Err(PathError::NotAnArray { path: p("name") })
        );
        assert_eq!(
            d.pop(&p("missing")),
            Err(PathError::Missing { path: p("missing") })
        );
    }

    #[test]
    fn flatten_leaves() {
        let d = doc("a:\n  b: 1\n  c: [x]\nd: ok\ne: {}\n\"dotted.key\": v\n");
        let keys: Vec<String> = flatten(d.as_value(), "").into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a.b", "a.c", "d", r"dotted\.key"]);
        assert_eq!(d.count_leaves(), 4);
    }

    #[test]
    fn flatten_with_prefix() {
        let d = doc("a:\n  b: 1\n");
        let sub = d.get(&p("a")).unwrap();
        let flat = flatten(sub, "a");
        assert_eq!(flat, vec![("a.b".to_owned(), &Value::from(1))]);
    }
}
