//! Key paths for addressing within configuration documents
//!
//! Provides [`Path`] (parsed key expression) and [`ResolvedPath`] (the same
//! address with every index made non-negative against a live document).

use std::convert::Infallible;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One step of a key expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Mapping key (may contain `.` when escaped as `\.`)
    Key(String),
    /// Sequence index; negative values count from the end
    Index(i64),
    /// Bracket text that is not a valid integer
    InvalidIndex(String),
}

impl Segment {
    /// Classify bracket contents
    #[must_use]
    pub fn index(text: &str) -> Self {
        text.trim()
            .parse::<i64>()
            .map_or_else(|_| Self::InvalidIndex(text.to_owned()), Self::Index)
    }

    /// Check if this segment addresses a sequence slot
    #[inline]
    #[must_use]
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_) | Self::InvalidIndex(_))
    }
}

/// Parsed key expression
///
/// # Examples
/// - `server.port` → `[Key(server), Key(port)]`
/// - `items[-1].name` → `[Key(items), Index(-1), Key(name)]`
/// - `a\.b.c` → `[Key(a.b), Key(c)]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path(Vec<Segment>);

impl Path {
    /// Parse a key expression
    ///
    /// Parsing never fails. Empty keys are dropped, so `""` and `"."` are the
    /// root path; bracket text that is not an integer becomes
    /// [`Segment::InvalidIndex`] and is rejected later by the accessor. A `[`
    /// without a closing `]` is kept as part of the key.
    #[must_use]
    pub fn parse(expr: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = expr.char_indices().peekable();

        while let Some((i, ch)) = chars.next() {
            match ch {
                '\\' if expr[i + 1..].starts_with('.') => {
                    current.push('.');
                    chars.next();
                }
                '.' => flush(&mut segments, &mut current),
                '[' => {
                    flush(&mut segments, &mut current);
                    let open = i + 1;
                    match expr[open..].find(']') {
                        Some(len) => {
                            segments.push(Segment::index(&expr[open..open + len]));
                            let close = open + len;
                            while chars.next_if(|&(j, _)| j <= close).is_some() {}
                        }
                        None => current.push('['),
                    }
                }
                _ => current.push(ch),
            }
        }
        flush(&mut segments, &mut current);

        Self(segments)
    }

    /// Create path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Empty path (document root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is the root
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0.split_last().map(|(_, rest)| Self(rest.to_vec()))
    }

    /// First `len` segments
    #[inline]
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut new = self.clone();
        new.0.push(segment);
        new
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.0.iter()
    }
}

fn flush(segments: &mut Vec<Segment>, current: &mut String) {
    if !current.is_empty() {
        segments.push(Segment::Key(std::mem::take(current)));
    }
}

/// Escape a mapping key so that [`Path::parse`] reads it back as one segment
#[must_use]
pub fn escape_key(key: &str) -> String {
    key.replace('.', "\\.")
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(".");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => f.write_str(&escape_key(key))?,
                Segment::Key(key) => write!(f, ".{}", escape_key(key))?,
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::InvalidIndex(text) => write!(f, "[{text}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

/// Step of a [`ResolvedPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// Mapping key
    Key(String),
    /// Absolute sequence index
    Index(usize),
}

/// Path whose indices are all non-negative
///
/// Produced by [`crate::resolve`]; only valid against the document it was
/// resolved on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ResolvedPath(Vec<Step>);

impl ResolvedPath {
    /// Create resolved path from steps
    #[inline]
    #[must_use]
    pub fn new(steps: Vec<Step>) -> Self {
        Self(steps)
    }

    /// Get steps
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    /// Check if path is the root
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert back into a [`Path`]
    #[must_use]
    pub fn to_path(&self) -> Path {
        Path(
            self.0
                .iter()
                .map(|step| match step {
                    Step::Key(key) => Segment::Key(key.clone()),
                    // Indices come from `usize` slots of an in-memory Vec
                    Step::Index(index) => {
                        Segment::Index(i64::try_from(*index).unwrap_or(i64::MAX))
                    }
                })
                .collect(),
        )
    }
}

impl Display for ResolvedPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_path())
    }
}

/// Map a possibly negative index onto `0..len`
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let absolute = if index < 0 { len + index } else { index };
    if (0..len).contains(&absolute) {
        usize::try_from(absolute).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(s: &str) -> Segment {
        Segment::Key(s.to_owned())
    }

    #[test]
    fn parse_dotted_keys() {
        let path = Path::parse("helper.llm");
        assert_eq!(path.segments(), &[key("helper"), key("llm")]);
    }

    #[test]
    fn parse_indices() {
        let path = Path::parse("a.b[0].c");
        assert_eq!(
            path.segments(),
            &[key("a"), key("b"), Segment::Index(0), key("c")]
        );
    }

    #[test]
    fn parse_negative_index() {
        let path = Path::parse("items[-1]");
        assert_eq!(path.segments(), &[key("items"), Segment::Index(-1)]);
    }

    #[test]
    fn parse_consecutive_indices() {
        let path = Path::parse("grid[1][-2]");
        assert_eq!(
            path.segments(),
            &[key("grid"), Segment::Index(1), Segment::Index(-2)]
        );
    }

    #[test]
    fn parse_escaped_dot() {
        let path = Path::parse(r"hosts.example\.com.port");
        assert_eq!(
            path.segments(),
            &[key("hosts"), key("example.com"), key("port")]
        );
    }

    #[test]
    fn parse_lone_backslash_is_literal() {
        let path = Path::parse(r"a\b");
        assert_eq!(path.segments(), &[key(r"a\b")]);
    }

    #[test]
    fn parse_invalid_index() {
        let path = Path::parse("list[abc]");
        assert_eq!(
            path.segments(),
            &[key("list"), Segment::InvalidIndex("abc".into())]
        );
    }

    #[test]
    fn parse_unclosed_bracket_is_literal() {
        let path = Path::parse("a[b");
        assert_eq!(path.segments(), &[key("a"), key("[b")]);
    }

    #[test]
    fn parse_skips_empty_keys() {
        assert!(Path::parse("").is_empty());
        assert!(Path::parse(".").is_empty());
        assert_eq!(Path::parse("a..b").segments(), &[key("a"), key("b")]);
    }

    #[test]
    fn parse_multibyte_keys() {
        let path = Path::parse("größe[0].名前");
        assert_eq!(
            path.segments(),
            &[key("größe"), Segment::Index(0), key("名前")]
        );
    }

    #[test]
    fn display_round_trips() {
        for expr in ["a.b[0].c", "items[-1]", r"x\.y.z", "list[abc]"] {
            let path = Path::parse(expr);
            assert_eq!(path.to_string(), expr);
            assert_eq!(Path::parse(&path.to_string()), path);
        }
    }

    #[test]
    fn display_root() {
        assert_eq!(Path::root().to_string(), ".");
    }

    #[test]
    fn parent_and_prefix() {
        let path = Path::parse("a.b[2]");
        assert_eq!(path.parent(), Some(Path::parse("a.b")));
        assert_eq!(path.prefix(1), Path::parse("a"));
        assert_eq!(path.prefix(10), path);
        assert!(Path::root().parent().is_none());
    }

    #[test]
    fn from_str_infallible() {
        let path: Path = "a.b".parse().unwrap();
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn normalize_index_bounds() {
        assert_eq!(normalize_index(0, 3), Some(0));
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(-3, 3), Some(0));
        assert_eq!(normalize_index(-4, 3), None);
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-1, 0), None);
    }

    #[test]
    fn resolved_path_to_path() {
        let resolved = ResolvedPath::new(vec![Step::Key("list".into()), Step::Index(2)]);
        assert_eq!(resolved.to_path(), Path::parse("list[2]"));
        assert_eq!(resolved.to_string(), "list[2]");
    }
}
