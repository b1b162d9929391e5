//! Configuration values
//!
//! [`Value`] is a closed union over the three YAML node kinds. Mapping keys
//! are strings and keep their insertion order, so a decode/encode cycle does
//! not reshuffle a hand-written file.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_yaml::Number;
use std::fmt::{self, Display, Formatter};

/// Ordered string-keyed mapping
pub type Mapping = IndexMap<String, Value>;

/// Leaf value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// `null` / `~` / empty
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Integer or float
    Number(Number),
    /// Any other text
    String(String),
}

/// Node of a configuration tree
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Key/value pairs in document order
    Mapping(Mapping),
    /// Ordered items
    Sequence(Vec<Value>),
    /// Leaf
    Scalar(Scalar),
}

impl Value {
    /// `null`
    #[inline]
    #[must_use]
    pub fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }

    /// Empty mapping
    #[inline]
    #[must_use]
    pub fn mapping() -> Self {
        Self::Mapping(Mapping::new())
    }

    /// Short name of the node kind, for messages
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mapping(_) => "mapping",
            Self::Sequence(_) => "sequence",
            Self::Scalar(Scalar::Null) => "null",
            Self::Scalar(Scalar::Bool(_)) => "bool",
            Self::Scalar(Scalar::Number(_)) => "number",
            Self::Scalar(Scalar::String(_)) => "string",
        }
    }

    /// Check if this is a mapping
    #[inline]
    #[must_use]
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }

    /// Check if this is a sequence
    #[inline]
    #[must_use]
    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence(_))
    }

    /// Check if this is `null`
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::Null))
    }

    /// Borrow as mapping
    #[inline]
    #[must_use]
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Mutably borrow as mapping
    #[inline]
    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow as sequence
    #[inline]
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Mutably borrow as sequence
    #[inline]
    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow string contents
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Single-line YAML rendering
    ///
    /// Scalars come out plain when they read back as the same value and
    /// double-quoted otherwise; collections use flow style (`{a: 1}`,
    /// `[x, y]`). The result is safe to splice after `key: ` or `- `.
    #[must_use]
    pub fn to_inline_yaml(&self) -> String {
        let mut out = String::new();
        write_inline(self, &mut out, false);
        out
    }
}

fn write_inline(value: &Value, out: &mut String, in_flow: bool) {
    match value {
        Value::Scalar(scalar) => out.push_str(&scalar_text(scalar, in_flow)),
        Value::Sequence(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_inline(item, out, true);
            }
            out.push(']');
        }
        Value::Mapping(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&string_text(key, true));
                out.push_str(": ");
                write_inline(item, out, true);
            }
            out.push('}');
        }
    }
}

fn scalar_text(scalar: &Scalar, in_flow: bool) -> String {
    match scalar {
        Scalar::Null => "null".to_owned(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Number(n) => n.to_string(),
        Scalar::String(s) => string_text(s, in_flow),
    }
}

fn string_text(s: &str, in_flow: bool) -> String {
    if plain_safe(s, in_flow) {
        s.to_owned()
    } else {
        double_quoted(s)
    }
}

/// A string may be written plain only if parsing it back yields the same string
fn plain_safe(s: &str, in_flow: bool) -> bool {
    if s.is_empty() || s.contains(|c: char| c.is_control()) {
        return false;
    }
    if in_flow && s.contains([',', '[', ']', '{', '}', ':', '#', '"', '\'']) {
        return false;
    }
    matches!(
        serde_yaml::from_str::<serde_yaml::Value>(s),
        Ok(serde_yaml::Value::String(ref parsed)) if parsed == s
    )
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Interpret command-line text as a typed value
///
/// Integers are accepted only when they format back to the exact input
/// (`"007"` is not the integer 7). Otherwise finite floats are tried, and
/// anything else stays a string.
#[must_use]
pub fn coerce(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        if int.to_string() == raw {
            return Value::from(int);
        }
    }
    match raw.parse::<f64>() {
        Ok(float) if float.is_finite() => Value::from(float),
        _ => Value::from(raw),
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(Scalar::Null) => Ok(()),
            Self::Scalar(Scalar::String(s)) => f.write_str(s),
            Self::Scalar(scalar) => f.write_str(&scalar_text(scalar, false)),
            _ => f.write_str(&self.to_inline_yaml()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Mapping(map) => map.serialize(serializer),
            Self::Sequence(items) => items.serialize(serializer),
            Self::Scalar(scalar) => scalar.serialize(serializer),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
        }
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Self::null(),
            serde_yaml::Value::Bool(b) => Self::Scalar(Scalar::Bool(b)),
            serde_yaml::Value::Number(n) => Self::Scalar(Scalar::Number(n)),
            serde_yaml::Value::String(s) => Self::Scalar(Scalar::String(s)),
            serde_yaml::Value::Sequence(items) => {
                Self::Sequence(items.into_iter().map(Self::from).collect())
            }
            serde_yaml::Value::Mapping(map) => Self::Mapping(
                map.into_iter()
                    .map(|(key, value)| (key_text(key), Self::from(value)))
                    .collect(),
            ),
            // Tags carry no meaning for configuration lookups
            serde_yaml::Value::Tagged(tagged) => Self::from(tagged.value),
        }
    }
}

fn key_text(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => "null".to_owned(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => Value::from(other).to_inline_yaml(),
    }
}

impl From<&Value> for serde_yaml::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Scalar(Scalar::Null) => Self::Null,
            Value::Scalar(Scalar::Bool(b)) => Self::Bool(*b),
            Value::Scalar(Scalar::Number(n)) => Self::Number(n.clone()),
            Value::Scalar(Scalar::String(s)) => Self::String(s.clone()),
            Value::Sequence(items) => Self::Sequence(items.iter().map(Self::from).collect()),
            Value::Mapping(map) => Self::Mapping(
                map.iter()
                    .map(|(key, value)| (Self::String(key.clone()), Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Scalar(Scalar::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Scalar(Scalar::Number(Number::from(n)))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::from(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Scalar(Scalar::Number(Number::from(n)))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Scalar(Scalar::String(s.to_owned()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Scalar(Scalar::String(s))
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Self::Mapping(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Sequence(items)
    }
}
