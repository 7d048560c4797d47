//! FullPath addressing.
//!
//! A FullPath walks from the document identifier through `Steps` / `Step[..]`
//! containers down to a `Parameter[..]` or `FormulaValue[..]` leaf. Brackets
//! delimit names, so a `/` inside a bracket belongs to the name. A `[`, `]`
//! or `\` that is part of a name is written with a leading `\`.

use crate::schema::TagKind;
use crate::xml::{NodeId, XmlDocument};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

fn segment_regex() -> Result<&'static Regex, String> {
    static SEGMENT: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    SEGMENT
        .get_or_init(|| Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_.-]*)(?:\[(.*)\])?$"))
        .as_ref()
        .map_err(|e| format!("Regex error: {}", e))
}

/// One parsed path segment: a tag with an optional bracketed name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub tag: String,
    pub name: Option<String>,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}[{}]", self.tag, escape_name(name)),
            None => f.write_str(&self.tag),
        }
    }
}

/// A validated FullPath addressing a leaf node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullPath {
    root: String,
    segments: Vec<Segment>,
}

impl FullPath {
    /// Parse and validate a leaf FullPath, normalizing whitespace in names.
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("FullPath is empty".to_string());
        }
        let mut parts = split_segments(text)?.into_iter();
        let root = parts.next().unwrap_or_default().trim().to_string();
        if root.is_empty() {
            return Err("FullPath has no document segment".to_string());
        }

        let mut segments = Vec::new();
        for part in parts {
            let part = part.trim();
            let caps = segment_regex()?
                .captures(part)
                .ok_or_else(|| format!("unparseable segment '{}'", part))?;
            let tag = caps[1].to_string();
            let name = caps.get(2).map(|m| unescape_name(m.as_str()).trim().to_string());
            if matches!(&name, Some(n) if n.is_empty()) {
                return Err(format!("segment '{}' has an empty name", part));
            }
            segments.push(Segment { tag, name });
        }

        let path = Self { root, segments };
        path.check_shape()?;
        Ok(path)
    }

    fn check_shape(&self) -> Result<(), String> {
        let (leaf, containers) = self
            .segments
            .split_last()
            .ok_or_else(|| "FullPath does not name a leaf".to_string())?;
        let kind = TagKind::leaf_from_name(&leaf.tag)
            .ok_or_else(|| format!("'{}' is not an addressable leaf kind", leaf.tag))?;
        if leaf.name.is_none() {
            return Err(format!("leaf segment '{}' has no name", leaf.tag));
        }

        if containers.len() % 2 != 0 {
            return Err("container segments must come in Steps/Step[..] pairs".to_string());
        }
        for pair in containers.chunks(2) {
            let (list, step) = (&pair[0], &pair[1]);
            if list.tag != TagKind::StepList.element_name() || list.name.is_some() {
                return Err(format!("expected 'Steps', found '{}'", list));
            }
            if step.tag != TagKind::Step.element_name() || step.name.is_none() {
                return Err(format!("expected 'Step[..]', found '{}'", step));
            }
        }

        match (kind, containers.is_empty()) {
            (TagKind::Parameter, false) => {
                Err("a Parameter must sit directly under its document".to_string())
            }
            (TagKind::FormulaValue, true) => Err("a FormulaValue must sit inside a Step".to_string()),
            _ => Ok(()),
        }
    }

    /// Document identifier (first segment).
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn leaf_kind(&self) -> TagKind {
        self.segments
            .last()
            .and_then(|s| TagKind::leaf_from_name(&s.tag))
            .unwrap_or(TagKind::Parameter)
    }

    pub fn leaf_name(&self) -> &str {
        self.segments
            .last()
            .and_then(|s| s.name.as_deref())
            .unwrap_or("")
    }

    /// Path of the container the leaf belongs to.
    pub fn parent(&self) -> String {
        let mut out = self.root.clone();
        for segment in &self.segments[..self.segments.len().saturating_sub(1)] {
            out.push('/');
            out.push_str(&segment.to_string());
        }
        out
    }
}

impl fmt::Display for FullPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// Escape the bracket characters of a node name for use inside a segment.
pub fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if matches!(ch, '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn unescape_name(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push(chars.next().unwrap_or('\\')),
            _ => out.push(ch),
        }
    }
    out
}

/// Split on `/` outside brackets. Escaped characters never count.
fn split_segments(text: &str) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unbalanced ']' at offset {}", i))?;
            }
            '/' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced '[' in FullPath".to_string());
    }
    parts.push(&text[start..]);
    Ok(parts)
}

/// Addressable node found while walking a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addressed {
    pub path: String,
    pub node: NodeId,
    pub kind: TagKind,
}

/// Name of a node: the trimmed text of its `Name` child.
pub fn node_name(xml: &XmlDocument, node: NodeId) -> Option<String> {
    let name = xml.find_child(node, "Name").map(|n| xml.text(n))?;
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Every addressable node of a document in document order.
pub fn walk(doc_id: &str, xml: &XmlDocument) -> Vec<Addressed> {
    let mut out = vec![Addressed {
        path: doc_id.to_string(),
        node: xml.root(),
        kind: TagKind::Document,
    }];
    walk_container(xml, xml.root(), doc_id, TagKind::Document, &mut out);
    out
}

fn walk_container(
    xml: &XmlDocument,
    node: NodeId,
    path: &str,
    kind: TagKind,
    out: &mut Vec<Addressed>,
) {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for child in xml.child_elements(node) {
        let tag = xml.local_name(child);
        let child_kind = match (kind, tag) {
            (TagKind::Document, "Parameter") => TagKind::Parameter,
            (TagKind::Step, "FormulaValue") => TagKind::FormulaValue,
            (TagKind::Document | TagKind::Step, "Steps") => TagKind::StepList,
            (TagKind::StepList, "Step") => TagKind::Step,
            _ => continue,
        };
        let position = positions.entry(child_kind.element_name()).or_insert(0);
        *position += 1;

        let segment = match child_kind {
            TagKind::StepList => child_kind.element_name().to_string(),
            _ => {
                let name = node_name(xml, child)
                    .map(|n| escape_name(&n))
                    .unwrap_or_else(|| format!("#{}", position));
                format!("{}[{}]", child_kind.element_name(), name)
            }
        };
        let child_path = format!("{}/{}", path, segment);
        out.push(Addressed {
            path: child_path.clone(),
            node: child,
            kind: child_kind,
        });
        if !child_kind.is_leaf() {
            walk_container(xml, child, &child_path, child_kind, out);
        }
    }
}

/// Cached FullPath lookup in both directions.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    by_path: HashMap<String, (NodeId, TagKind)>,
    by_node: HashMap<NodeId, String>,
    duplicates: Vec<String>,
}

impl PathIndex {
    pub fn build(doc_id: &str, xml: &XmlDocument) -> Self {
        let mut index = Self::default();
        for entry in walk(doc_id, xml) {
            if !index.insert(&entry.path, entry.node, entry.kind) {
                tracing::warn!(
                    "Duplicate FullPath '{}' in {}; only the first node is addressable",
                    entry.path,
                    doc_id
                );
                index.duplicates.push(entry.path);
            }
        }
        index
    }

    pub fn node_at(&self, path: &str) -> Option<NodeId> {
        self.by_path.get(path).map(|(node, _)| *node)
    }

    pub fn kind_at(&self, path: &str) -> Option<TagKind> {
        self.by_path.get(path).map(|(_, kind)| *kind)
    }

    pub fn path_of(&self, node: NodeId) -> Option<&str> {
        self.by_node.get(&node).map(String::as_str)
    }

    /// Register a node; returns `false` if the path is already taken.
    pub fn insert(&mut self, path: &str, node: NodeId, kind: TagKind) -> bool {
        if self.by_path.contains_key(path) {
            return false;
        }
        self.by_path.insert(path.to_string(), (node, kind));
        self.by_node.insert(node, path.to_string());
        true
    }

    pub fn remove(&mut self, node: NodeId) -> Option<String> {
        let path = self.by_node.remove(&node)?;
        self.by_path.remove(&path);
        Some(path)
    }

    /// Paths that were shadowed by an earlier node with the same address.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}
