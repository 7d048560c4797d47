//! In-memory recipe documents.
//!
//! A [`RecipeTree`] owns every document discovered from one root file. Each
//! [`Document`] keeps its lossless XML plus a [`PathIndex`] that maps FullPaths
//! to nodes; the index is maintained by the structural operations here
//! (leaf creation and deletion) and never touched by sub-field updates.

pub mod leaf;
pub mod path;

pub use path::{Addressed, FullPath, PathIndex};

use crate::error::{BulkEditError, BulkEditResult};
use crate::schema::{Field, TagKind, STEP_RECIPE_ID};
use crate::types::{FieldValues, Row};
use crate::xml::{NodeId, XmlDocument};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Outcome of resolving one cross-document reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Resolved to the loaded document with this identifier.
    Resolved(String),
    /// The target is an ancestor of the referencing document.
    Cycle(String),
    /// No file exists at the expected location.
    Missing(PathBuf),
}

/// A `StepRecipeID` found on a Step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// FullPath of the referencing Step.
    pub step: String,
    /// Identifier named by the Step.
    pub target: String,
    pub resolution: Resolution,
}

#[derive(Debug, Clone)]
pub struct Document {
    id: String,
    path: PathBuf,
    xml: XmlDocument,
    index: PathIndex,
    references: Vec<Reference>,
}

impl Document {
    /// Parse a document; its identifier is the file stem.
    pub fn parse(path: &Path, bytes: &[u8]) -> BulkEditResult<Self> {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let xml = XmlDocument::parse(bytes).map_err(|e| BulkEditError::Xml {
            path: path.to_path_buf(),
            message: e.message,
        })?;
        Ok(Self::from_xml(id, path.to_path_buf(), xml))
    }

    pub fn from_xml(id: impl Into<String>, path: PathBuf, xml: XmlDocument) -> Self {
        let id = id.into();
        let index = PathIndex::build(&id, &xml);
        Self {
            id,
            path,
            xml,
            index,
            references: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Original file name, reused for the output file.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.id.clone())
    }

    pub fn xml(&self) -> &XmlDocument {
        &self.xml
    }

    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub(crate) fn set_references(&mut self, references: Vec<Reference>) {
        self.references = references;
    }

    pub fn node_at(&self, path: &str) -> Option<NodeId> {
        self.index.node_at(path)
    }

    pub fn path_of(&self, node: NodeId) -> Option<&str> {
        self.index.path_of(node)
    }

    /// Addressable leaves in document order, skipping shadowed duplicates.
    pub fn leaves(&self) -> Vec<Addressed> {
        path::walk(&self.id, &self.xml)
            .into_iter()
            .filter(|a| a.kind.is_leaf() && self.index.node_at(&a.path) == Some(a.node))
            .collect()
    }

    /// Leaf kinds present in the document, in schema order.
    pub fn leaf_kinds(&self) -> Vec<TagKind> {
        let leaves = self.leaves();
        TagKind::LEAVES
            .into_iter()
            .filter(|kind| leaves.iter().any(|a| a.kind == *kind))
            .collect()
    }

    /// `StepRecipeID` values of every Step, as `(step path, target)`.
    pub fn step_references(&self) -> Vec<(String, String)> {
        path::walk(&self.id, &self.xml)
            .into_iter()
            .filter(|a| a.kind == TagKind::Step)
            .filter_map(|a| {
                let child = self.xml.find_child(a.node, STEP_RECIPE_ID)?;
                let target = self.xml.text(child).trim().to_string();
                (!target.is_empty()).then_some((a.path, target))
            })
            .collect()
    }

    pub fn fields(&self, node: NodeId, kind: TagKind) -> FieldValues {
        leaf::read_fields(&self.xml, node, kind)
    }

    /// One row per addressable leaf, in document order.
    pub fn rows(&self) -> Vec<Row> {
        self.leaves()
            .into_iter()
            .map(|a| Row {
                number: None,
                fields: self.fields(a.node, a.kind),
                tag_type: a.kind.element_name().to_string(),
                full_path: a.path,
            })
            .collect()
    }

    pub fn field_text(&self, node: NodeId, field: Field) -> Option<String> {
        leaf::field_text(&self.xml, node, field)
    }

    pub fn has_expression(&self, node: NodeId) -> bool {
        leaf::has_expression(&self.xml, node)
    }

    /// Column the expression marker of `node` exports in, if it has one.
    pub fn expression_field(&self, node: NodeId) -> Option<Field> {
        leaf::marker_field(&self.xml, node)
    }

    pub fn set_field(&mut self, node: NodeId, kind: TagKind, field: Field, text: &str) -> bool {
        leaf::set_field(&mut self.xml, node, kind, field, text)
    }

    pub fn remove_field(&mut self, node: NodeId, field: Field) -> bool {
        leaf::remove_field(&mut self.xml, node, field)
    }

    pub fn ensure_marker(&mut self, node: NodeId, kind: TagKind, field: Field) -> bool {
        leaf::ensure_marker(&mut self.xml, node, kind, field)
    }

    /// Insert a new named leaf into `container` and register its FullPath.
    pub fn create_leaf(&mut self, container: NodeId, kind: TagKind, name: &str) -> Option<NodeId> {
        let container_path = self.index.path_of(container)?.to_string();
        let path = format!(
            "{}/{}[{}]",
            container_path,
            kind.element_name(),
            path::escape_name(name)
        );
        if self.index.node_at(&path).is_some() {
            return None;
        }
        let anchor = leaf::container_anchor(&self.xml, container, kind);
        let like = self
            .xml
            .child_elements(container)
            .first()
            .copied()
            .unwrap_or(container);
        let node = self.xml.create_element(kind.element_name(), like);
        self.xml.insert_element(container, node, anchor);
        leaf::set_field(&mut self.xml, node, kind, Field::Name, name);
        self.index.insert(&path, node, kind);
        Some(node)
    }

    /// Remove a leaf; containers left empty are kept.
    pub fn delete_leaf(&mut self, node: NodeId) -> bool {
        if self.index.remove(node).is_none() {
            return false;
        }
        self.xml.remove(node)
    }

    pub fn to_bytes(&self) -> BulkEditResult<Vec<u8>> {
        self.xml.to_bytes().map_err(|e| BulkEditError::Xml {
            path: self.path.clone(),
            message: e.message,
        })
    }
}

/// Every document loaded for one invocation, root first.
#[derive(Debug, Clone, Default)]
pub struct RecipeTree {
    documents: Vec<Document>,
    by_id: HashMap<String, usize>,
}

impl RecipeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document under its identifier.
    pub fn add(&mut self, document: Document) -> BulkEditResult<()> {
        if let Some(&existing) = self.by_id.get(document.id()) {
            return Err(BulkEditError::DuplicateDocument {
                id: document.id().to_string(),
                first: self.documents[existing].path().to_path_buf(),
                second: document.path().to_path_buf(),
            });
        }
        self.by_id
            .insert(document.id().to_string(), self.documents.len());
        self.documents.push(document);
        Ok(())
    }

    pub fn root(&self) -> Option<&Document> {
        self.documents.first()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> &mut [Document] {
        &mut self.documents
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.by_id.get(id).map(|&i| &self.documents[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Document> {
        match self.by_id.get(id) {
            Some(&i) => self.documents.get_mut(i),
            None => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Documents referenced by `id`, in reference order.
    pub fn children_of(&self, id: &str) -> Vec<&Document> {
        let Some(document) = self.get(id) else {
            return Vec::new();
        };
        let mut seen = Vec::new();
        for reference in document.references() {
            if let Resolution::Resolved(child) = &reference.resolution {
                if !seen.contains(&child.as_str()) {
                    seen.push(child.as_str());
                }
            }
        }
        seen.into_iter().filter_map(|child| self.get(child)).collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
