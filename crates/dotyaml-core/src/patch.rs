//! Comment-aware source layout and in-place patching
//!
//! [`SourceTree`] parses the source into a lossless syntax tree with
//! `yaml-edit` and maps resolved paths onto byte spans of the raw text.
//! Replacing one node (or appending one key to an existing block mapping)
//! then touches only that span, so comments, blank lines, quoting, anchors,
//! tags and key order elsewhere in the file stay byte-for-byte identical.
//!
//! Navigation does not follow aliases. Sources with syntax errors or more
//! than one document are not indexed; [`SourceTree::parse`] returns `None`
//! for them and callers fall back to re-serializing the whole document.

use yaml_edit::advanced::syntax_node_range;
use yaml_edit::{AsYaml, Document as SyntaxDocument, YamlFile, YamlNode};

use crate::path::{ResolvedPath, Step};
use crate::value::{Mapping, Value};

/// Byte range within the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First byte
    pub start: usize,
    /// One past the last byte
    pub end: usize,
}

impl Span {
    #[inline]
    fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Check if the span covers no text (implicit null)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Syntax tree over a YAML source, addressed by resolved paths
#[derive(Debug)]
pub struct SourceTree<'a> {
    src: &'a str,
    root: Option<YamlNode>,
}

impl<'a> SourceTree<'a> {
    /// Parse the source
    ///
    /// Returns `None` when the text has syntax errors or holds several
    /// documents.
    #[must_use]
    pub fn parse(src: &'a str) -> Option<Self> {
        let parsed = YamlFile::parse(src);
        if parsed.has_errors() {
            return None;
        }
        let file = parsed.tree();
        let mut documents = file.documents();
        let root = documents.next().as_ref().and_then(root_node);
        if documents.next().is_some() {
            return None;
        }
        Some(Self { src, root })
    }

    /// Check if the node at path exists in the source
    #[must_use]
    pub fn contains(&self, path: &ResolvedPath) -> bool {
        self.node(path).is_some()
    }

    /// Byte span of the value text at path, trailing whitespace excluded
    #[must_use]
    pub fn span(&self, path: &ResolvedPath) -> Option<Span> {
        self.node(path).and_then(|node| self.range(&node))
    }

    /// Replace the node at path with a single-line fragment
    ///
    /// A block collection that starts on the line after its key is pulled
    /// up behind the indicator (`key: fragment`). Returns `None` if the
    /// path is not in the source.
    #[must_use]
    pub fn replace(&self, path: &ResolvedPath, fragment: &str) -> Option<String> {
        let span = self.span(path)?;
        let head = self.src[..span.start].trim_end();
        let indicator = head.len();
        let detached = self.src[indicator..span.start].contains('\n')
            && (head.ends_with(':') || head.ends_with('-'));

        let (start, end, lead) = if span.is_empty() {
            let rest = &self.src[indicator..];
            let gap = rest.len() - rest.trim_start_matches([' ', '\t']).len();
            (indicator, indicator + gap, " ")
        } else if detached {
            (indicator, span.end, " ")
        } else {
            (span.start, span.end, "")
        };

        let mut out = String::with_capacity(self.src.len() + fragment.len() + 1);
        out.push_str(&self.src[..start]);
        out.push_str(lead);
        out.push_str(fragment);
        out.push_str(&self.src[end..]);
        Some(out)
    }

    /// Add a missing key below its deepest existing block-mapping ancestor
    ///
    /// The new entry is written as one line after the ancestor's last entry.
    /// Missing intermediate keys are folded into a flow mapping
    /// (`a: {b: value}`). Returns `None` when the path already exists, when
    /// the remaining steps contain an index, or when the ancestor is not a
    /// block mapping.
    #[must_use]
    pub fn insert(&self, path: &ResolvedPath, value: &Value) -> Option<String> {
        let steps = path.steps();
        let mut ancestor = self.root.clone();
        let mut depth = 0;
        while let Some(next) = ancestor
            .as_ref()
            .zip(steps.get(depth))
            .and_then(|(node, step)| child(node, step))
        {
            ancestor = Some(next);
            depth += 1;
        }

        let mut keys = Vec::with_capacity(steps.len() - depth);
        for step in &steps[depth..] {
            match step {
                Step::Key(key) => keys.push(key.as_str()),
                Step::Index(_) => return None,
            }
        }
        let (first, rest) = keys.split_first()?;
        let nested = rest.iter().rev().fold(value.clone(), |inner, key| {
            let mut map = Mapping::new();
            map.insert((*key).to_owned(), inner);
            Value::Mapping(map)
        });
        let line = |indent: usize| {
            format!(
                "{}{}: {}",
                " ".repeat(indent),
                Value::from(*first).to_inline_yaml(),
                nested.to_inline_yaml()
            )
        };

        if let Some(node @ YamlNode::Mapping(mapping)) = &ancestor {
            if mapping.is_flow_style() {
                return None;
            }
            if let Some(key) = mapping.keys().next() {
                let indent = self.column(self.range(&key)?.start);
                let tail = self.tail_end(node)?;
                let at = self.src[tail..]
                    .find('\n')
                    .map_or(self.src.len(), |offset| tail + offset);
                let line = line(indent);
                let mut out = String::with_capacity(self.src.len() + line.len() + 1);
                out.push_str(&self.src[..at]);
                out.push('\n');
                out.push_str(&line);
                out.push_str(&self.src[at..]);
                return Some(out);
            }
        }

        let blank_root = depth == 0 && ancestor.as_ref().map_or(true, |root| self.is_blank(root));
        if !blank_root {
            return None;
        }
        let line = line(0);
        let mut out = String::with_capacity(self.src.len() + line.len() + 2);
        out.push_str(self.src);
        if !self.src.is_empty() && !self.src.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&line);
        out.push('\n');
        Some(out)
    }

    fn node(&self, path: &ResolvedPath) -> Option<YamlNode> {
        let (first, rest) = path.steps().split_first()?;
        let mut node = child(self.root.as_ref()?, first)?;
        for step in rest {
            node = child(&node, step)?;
        }
        Some(node)
    }

    fn range(&self, node: &YamlNode) -> Option<Span> {
        let range = syntax_node_range(node.as_node()?);
        let start = usize::from(range.start());
        let end = usize::from(range.end());
        let text = self.src.get(start..end)?;
        Some(Span::new(start, start + text.trim_end().len()))
    }

    /// End of the last value nested inside node
    fn tail_end(&self, node: &YamlNode) -> Option<usize> {
        let last = match node {
            YamlNode::Mapping(mapping) if !mapping.is_flow_style() => mapping.values().last(),
            YamlNode::Sequence(sequence) if !sequence.is_flow_style() => sequence.last(),
            _ => None,
        };
        match last {
            Some(last) => self.tail_end(&last),
            None => {
                let span = self.range(node)?;
                Some(self.src[..span.end].trim_end().len())
            }
        }
    }

    fn column(&self, at: usize) -> usize {
        at - self.src[..at].rfind('\n').map_or(0, |newline| newline + 1)
    }

    fn is_blank(&self, node: &YamlNode) -> bool {
        self.range(node).map_or(true, |span| span.is_empty())
    }
}

fn root_node(document: &SyntaxDocument) -> Option<YamlNode> {
    document
        .as_mapping()
        .map(YamlNode::Mapping)
        .or_else(|| document.as_sequence().map(YamlNode::Sequence))
        .or_else(|| document.as_tagged().map(YamlNode::TaggedNode))
        .or_else(|| document.as_scalar().map(YamlNode::Scalar))
}

fn child(node: &YamlNode, step: &Step) -> Option<YamlNode> {
    match (node, step) {
        (YamlNode::Mapping(mapping), Step::Key(key)) => mapping
            .iter()
            .find(|(candidate, _)| matches!(candidate, YamlNode::Scalar(s) if s.as_string() == *key))
            .map(|(_, value)| value),
        (YamlNode::Sequence(sequence), Step::Index(index)) => sequence.get(*index),
        (YamlNode::TaggedNode(tagged), _) => {
            let inner = tagged
                .as_mapping()
                .map(YamlNode::Mapping)
                .or_else(|| tagged.as_sequence().map(YamlNode::Sequence))?;
            child(&inner, step)
        }
        _ => None,
    }
}

/// Rewrite `src` so the node at `path` holds `value`
///
/// Existing nodes are replaced in place; missing keys are appended to their
/// parent mapping. Returns `None` when the layout cannot be patched, in
/// which case the caller re-serializes. The result is not validated here.
#[must_use]
pub fn patch(src: &str, path: &ResolvedPath, value: &Value) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    let tree = SourceTree::parse(src)?;
    if tree.contains(path) {
        tree.replace(path, &value.to_inline_yaml())
    } else {
        tree.insert(path, value)
    }
}
