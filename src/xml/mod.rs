//! Lossless XML document tree built from quick-xml events.
//!
//! Start tags, text and markup are stored in their raw (escaped) form so an
//! untouched node serializes back to the bytes it was parsed from. Nodes live
//! in an arena addressed by [`NodeId`]; removing a node detaches it but keeps
//! its slot, so ids handed out earlier never dangle.

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const DEFAULT_INDENT: &str = "  ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct XmlError {
    pub message: String,
}

impl XmlError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct Element {
    /// Raw start tag content: name followed by attributes, as written.
    start: String,
    name_len: usize,
    children: Vec<NodeId>,
    self_closing: bool,
}

impl Element {
    fn from_start(e: &BytesStart<'_>, self_closing: bool) -> Result<Self, XmlError> {
        Ok(Self {
            start: utf8(e)?,
            name_len: e.name().as_ref().len(),
            children: Vec::new(),
            self_closing,
        })
    }

    pub fn name(&self) -> &str {
        &self.start[..self.name_len]
    }

    pub fn local_name(&self) -> &str {
        let name = self.name();
        name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
    }

    fn prefix(&self) -> Option<&str> {
        self.name().split_once(':').map(|(prefix, _)| prefix)
    }

    /// Attributes as `(key, raw escaped value)` pairs.
    fn raw_attributes(&self) -> Vec<(String, String)> {
        let start = BytesStart::from_content(self.start.as_str(), self.name_len);
        start
            .attributes()
            .filter_map(Result::ok)
            .filter_map(|attr| {
                let key = std::str::from_utf8(attr.key.as_ref()).ok()?.to_string();
                let value = std::str::from_utf8(&attr.value).ok()?.to_string();
                Some((key, value))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum NodeContent {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    Decl(String),
    ProcessingInstruction(String),
    DocType(String),
}

#[derive(Debug, Clone)]
struct Slot {
    parent: Option<NodeId>,
    content: NodeContent,
}

/// Where to place a new element among its future siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    After(NodeId),
    Before(NodeId),
    End,
}

#[derive(Debug, Clone)]
pub struct XmlDocument {
    slots: Vec<Slot>,
    top_level: Vec<NodeId>,
    root: NodeId,
    bom: bool,
    indent_unit: String,
}

impl XmlDocument {
    /// Parse a UTF-8 document (an optional BOM is kept for output).
    pub fn parse(input: &[u8]) -> Result<Self, XmlError> {
        let (bom, body) = match input.strip_prefix(BOM) {
            Some(rest) => (true, rest),
            None => (false, input),
        };
        let text = std::str::from_utf8(body)
            .map_err(|e| XmlError::new(format!("document is not valid UTF-8: {}", e)))?;

        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);

        let mut slots: Vec<Slot> = Vec::new();
        let mut top_level: Vec<NodeId> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                XmlError::new(format!("at byte {}: {}", reader.buffer_position(), e))
            })?;
            let (content, opens) = match event {
                Event::Start(e) => (NodeContent::Element(Element::from_start(&e, false)?), true),
                Event::Empty(e) => (NodeContent::Element(Element::from_start(&e, true)?), false),
                Event::End(_) => {
                    if stack.pop().is_none() {
                        return Err(XmlError::new("closing tag without an open element"));
                    }
                    continue;
                }
                Event::Text(e) => (NodeContent::Text(utf8(&e)?), false),
                Event::CData(e) => (NodeContent::CData(utf8(&e)?), false),
                Event::Comment(e) => (NodeContent::Comment(utf8(&e)?), false),
                Event::Decl(e) => (NodeContent::Decl(utf8(&e)?), false),
                Event::PI(e) => (NodeContent::ProcessingInstruction(utf8(&e)?), false),
                Event::DocType(e) => (NodeContent::DocType(utf8(&e)?), false),
                Event::Eof => break,
            };

            let is_element = matches!(content, NodeContent::Element(_));
            let id = NodeId(slots.len());
            let parent = stack.last().copied();
            slots.push(Slot { parent, content });

            match parent {
                Some(parent) => {
                    if let NodeContent::Element(el) = &mut slots[parent.0].content {
                        el.children.push(id);
                    }
                }
                None => {
                    if is_element {
                        if root.is_some() {
                            return Err(XmlError::new("document has more than one root element"));
                        }
                        root = Some(id);
                    }
                    top_level.push(id);
                }
            }
            if opens {
                stack.push(id);
            }
        }

        if let Some(open) = stack.last() {
            let name = match &slots[open.0].content {
                NodeContent::Element(el) => el.name().to_string(),
                _ => String::new(),
            };
            return Err(XmlError::new(format!("element <{}> is never closed", name)));
        }
        let root = root.ok_or_else(|| XmlError::new("document has no root element"))?;

        let mut doc = Self {
            slots,
            top_level,
            root,
            bom,
            indent_unit: DEFAULT_INDENT.to_string(),
        };
        if let Some(unit) = doc.detect_indent_unit() {
            doc.indent_unit = unit;
        }
        Ok(doc)
    }

    /// Serialize back to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, XmlError> {
        let mut out = Vec::new();
        if self.bom {
            out.extend_from_slice(BOM);
        }
        let mut writer = Writer::new(out);
        for id in &self.top_level {
            self.write_node(&mut writer, *id)?;
        }
        Ok(writer.into_inner())
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<(), XmlError> {
        let event = match &self.slots[id.0].content {
            NodeContent::Element(el) => {
                let start = BytesStart::from_content(el.start.as_str(), el.name_len);
                if el.children.is_empty() && el.self_closing {
                    return write_event(writer, Event::Empty(start));
                }
                write_event(writer, Event::Start(start))?;
                for child in &el.children {
                    self.write_node(writer, *child)?;
                }
                Event::End(BytesEnd::new(el.name()))
            }
            NodeContent::Text(raw) => Event::Text(BytesText::from_escaped(raw.as_str())),
            NodeContent::CData(raw) => Event::CData(BytesCData::new(raw.as_str())),
            NodeContent::Comment(raw) => Event::Comment(BytesText::from_escaped(raw.as_str())),
            NodeContent::Decl(raw) => {
                Event::Decl(BytesDecl::from_start(BytesStart::from_content(raw.as_str(), 3)))
            }
            NodeContent::ProcessingInstruction(raw) => Event::PI(BytesPI::new(raw.as_str())),
            NodeContent::DocType(raw) => Event::DocType(BytesText::from_escaped(raw.as_str())),
        };
        write_event(writer, event)
    }

    //--------------------------------------------------------------------------
    // Navigation
    //--------------------------------------------------------------------------

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn content(&self, id: NodeId) -> &NodeContent {
        &self.slots[id.0].content
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.slots[id.0].content {
            NodeContent::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.slots[id.0].content {
            NodeContent::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Local (unprefixed) element name; empty for non-elements.
    pub fn local_name(&self, id: NodeId) -> &str {
        self.element(id).map(Element::local_name).unwrap_or("")
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.0].parent
    }

    /// Whether the node is still part of the tree.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.slots[id.0].parent.is_some()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id)
            .map(|el| el.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.element(*c).is_some())
            .collect()
    }

    /// First child element with the given local name.
    pub fn find_child(&self, id: NodeId, local_name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|c| self.local_name(*c) == local_name)
    }

    /// Unescaped text content of an element (text and CDATA children).
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            match &self.slots[child.0].content {
                NodeContent::Text(raw) => match unescape(raw) {
                    Ok(text) => out.push_str(&text),
                    Err(_) => out.push_str(raw),
                },
                NodeContent::CData(raw) => out.push_str(raw),
                _ => {}
            }
        }
        out
    }

    /// Unescaped attribute value.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let el = self.element(id)?;
        el.raw_attributes()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, raw)| match unescape(&raw) {
                Ok(value) => value.into_owned(),
                Err(_) => raw,
            })
    }

    //--------------------------------------------------------------------------
    // Mutation
    //--------------------------------------------------------------------------

    /// Create a detached element named `local_name`, using the namespace
    /// prefix of `like` so it matches its future siblings.
    pub fn create_element(&mut self, local_name: &str, like: NodeId) -> NodeId {
        let name = match self.element(like).and_then(Element::prefix) {
            Some(prefix) => format!("{}:{}", prefix, local_name),
            None => local_name.to_string(),
        };
        let name_len = name.len();
        self.push_slot(NodeContent::Element(Element {
            start: name,
            name_len,
            children: Vec::new(),
            self_closing: true,
        }))
    }

    /// Replace the text content of an element.
    ///
    /// Returns `false` without touching the node when the trimmed text is
    /// already equal, so unchanged values keep their original bytes.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> bool {
        let only_text = self.children(id).iter().all(|c| {
            matches!(
                self.slots[c.0].content,
                NodeContent::Text(_) | NodeContent::CData(_)
            )
        });
        if only_text && self.text(id).trim() == text.trim() {
            return false;
        }
        let old: Vec<NodeId> = self.children(id).to_vec();
        for child in old {
            self.slots[child.0].parent = None;
        }
        let escaped = escape(text).into_owned();
        let text_id = self.push_slot(NodeContent::Text(escaped));
        self.slots[text_id.0].parent = Some(id);
        if let Some(el) = self.element_mut(id) {
            el.children = vec![text_id];
            el.self_closing = false;
        }
        true
    }

    /// Set an attribute value; returns `false` if it already had that value.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        if self.attribute(id, name).as_deref().map(str::trim) == Some(value.trim()) {
            return false;
        }
        let Some(el) = self.element_mut(id) else {
            return false;
        };
        let escaped = escape(value).into_owned();
        let mut attrs = el.raw_attributes();
        match attrs.iter_mut().find(|(key, _)| key == name) {
            Some(attr) => attr.1 = escaped,
            None => attrs.push((name.to_string(), escaped)),
        }
        let mut start = el.name().to_string();
        for (key, raw) in &attrs {
            let quote = if raw.contains('"') { '\'' } else { '"' };
            start.push_str(&format!(" {}={}{}{}", key, quote, raw, quote));
        }
        el.start = start;
        true
    }

    /// Attach a detached element under `parent`, cloning the indentation of
    /// the anchor sibling so the output keeps the document's layout.
    pub fn insert_element(&mut self, parent: NodeId, child: NodeId, anchor: Anchor) {
        match anchor {
            Anchor::After(sibling) => {
                let Some(pos) = self.position(parent, sibling) else {
                    return self.insert_element(parent, child, Anchor::End);
                };
                let mut at = pos + 1;
                if let Some(ws) = self.leading_whitespace(sibling) {
                    let ws_id = self.push_slot(NodeContent::Text(ws));
                    self.insert_at(parent, at, ws_id);
                    at += 1;
                }
                self.insert_at(parent, at, child);
            }
            Anchor::Before(sibling) => {
                let Some(pos) = self.position(parent, sibling) else {
                    return self.insert_element(parent, child, Anchor::End);
                };
                let ws = self.leading_whitespace(sibling);
                self.insert_at(parent, pos, child);
                if let Some(ws) = ws {
                    let ws_id = self.push_slot(NodeContent::Text(ws));
                    self.insert_at(parent, pos + 1, ws_id);
                }
            }
            Anchor::End => {
                if let Some(last) = self.child_elements(parent).last().copied() {
                    return self.insert_element(parent, child, Anchor::After(last));
                }
                match self.indent_of(parent) {
                    Some(indent) => {
                        let stale: Vec<NodeId> = self.children(parent).to_vec();
                        for c in stale {
                            if self.is_whitespace_text(c) {
                                self.detach(parent, c);
                            }
                        }
                        let open = format!("\n{}{}", indent, self.indent_unit);
                        let close = format!("\n{}", indent);
                        let open_id = self.push_slot(NodeContent::Text(open));
                        let close_id = self.push_slot(NodeContent::Text(close));
                        let len = self.children(parent).len();
                        self.insert_at(parent, len, open_id);
                        self.insert_at(parent, len + 1, child);
                        self.insert_at(parent, len + 2, close_id);
                    }
                    None => {
                        let len = self.children(parent).len();
                        self.insert_at(parent, len, child);
                    }
                }
            }
        }
    }

    /// Detach a node together with the indentation preceding it.
    pub fn remove(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        let Some(pos) = self.position(parent, id) else {
            return false;
        };
        if pos > 0 {
            let prev = self.children(parent)[pos - 1];
            if self.is_whitespace_text(prev) {
                self.detach(parent, prev);
            }
        }
        self.detach(parent, id);
        true
    }

    //--------------------------------------------------------------------------
    // Internals
    //--------------------------------------------------------------------------

    fn push_slot(&mut self, content: NodeContent) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            parent: None,
            content,
        });
        id
    }

    fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.slots[child.0].parent = Some(parent);
        if let Some(el) = self.element_mut(parent) {
            let index = index.min(el.children.len());
            el.children.insert(index, child);
        }
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(el) = self.element_mut(parent) {
            el.children.retain(|c| *c != child);
        }
        self.slots[child.0].parent = None;
    }

    fn position(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    fn is_whitespace_text(&self, id: NodeId) -> bool {
        matches!(&self.slots[id.0].content, NodeContent::Text(t) if t.trim().is_empty())
    }

    /// Whitespace text node immediately before `id`, if any.
    fn leading_whitespace(&self, id: NodeId) -> Option<String> {
        let siblings = match self.parent(id) {
            Some(parent) => self.children(parent),
            None => self.top_level.as_slice(),
        };
        let pos = siblings.iter().position(|c| *c == id)?;
        let prev = *siblings.get(pos.checked_sub(1)?)?;
        match &self.slots[prev.0].content {
            NodeContent::Text(t) if t.trim().is_empty() => Some(t.clone()),
            _ => None,
        }
    }

    /// Indentation of the line `id` starts on, when the layout is indented.
    fn indent_of(&self, id: NodeId) -> Option<String> {
        let ws = self.leading_whitespace(id)?;
        let (_, indent) = ws.rsplit_once('\n')?;
        Some(indent.to_string())
    }

    fn detect_indent_unit(&self) -> Option<String> {
        let first = self.child_elements(self.root).into_iter().next()?;
        let child_indent = self.indent_of(first)?;
        let root_indent = self.indent_of(self.root).unwrap_or_default();
        let unit = child_indent.strip_prefix(root_indent.as_str())?;
        (!unit.is_empty()).then(|| unit.to_string())
    }
}

fn utf8(bytes: &[u8]) -> Result<String, XmlError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| XmlError::new(format!("invalid UTF-8 in markup: {}", e)))
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|e| XmlError::new(format!("failed to write XML: {}", e)))
}
