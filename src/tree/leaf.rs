//! Sub-field access on leaf nodes.
//!
//! Reads project a `Parameter` / `FormulaValue` element onto [`FieldValues`];
//! writes place each sub-element at its schema position so sibling order is
//! stable no matter which fields a row supplies.

use crate::schema::{
    Field, FieldLocation, TagKind, ValueCarrier, EXPRESSION_MARKER, LIMIT_ELEMENT, LIMIT_FIELDS,
};
use crate::types::{Cell, FieldValues};
use crate::xml::{Anchor, NodeId, XmlDocument};

/// Project a leaf element onto row fields.
///
/// An element that exists but is empty reads as [`Cell::Blank`]; a missing
/// element is left absent. A `ParamExpression` marker moves the carrier's
/// formula into the `ParamExpression` column and writes the marker literal
/// into the carrier column.
pub fn read_fields(xml: &XmlDocument, leaf: NodeId, kind: TagKind) -> FieldValues {
    let mut values = FieldValues::new();
    for field in kind.fields() {
        if let Some(child) = xml.find_child(leaf, field.tag()) {
            values.set(*field, Cell::from_text(&xml.text(child)));
        }
    }

    if kind.declares(Field::ParamExpression) && values.get(Field::ParamExpression).is_some() {
        let carrier = marker_field(xml, leaf).unwrap_or(Field::Real);
        let formula = values.get(carrier).cloned().unwrap_or(Cell::Blank);
        values.set(Field::ParamExpression, formula);
        values.set_text(carrier, EXPRESSION_MARKER);
    }

    if kind.has_limit_block() {
        if let Some(limit) = xml.find_child(leaf, LIMIT_ELEMENT) {
            for field in LIMIT_FIELDS {
                let text = match field.location() {
                    FieldLocation::LimitAttribute => xml.attribute(limit, field.tag()),
                    _ => xml.find_child(limit, field.tag()).map(|c| xml.text(c)),
                };
                if let Some(text) = text {
                    values.set(*field, Cell::from_text(&text));
                }
            }
        }
    }
    values
}

/// Carrier element holding the formula of an expression node.
pub fn expression_carrier(xml: &XmlDocument, leaf: NodeId) -> Option<Field> {
    ValueCarrier::ALL
        .iter()
        .filter_map(|c| c.expression_field())
        .find(|f| xml.find_child(leaf, f.tag()).is_some())
}

pub fn has_expression(xml: &XmlDocument, leaf: NodeId) -> bool {
    xml.find_child(leaf, Field::ParamExpression.tag()).is_some()
}

/// Carrier column an expression node shows its marker in: the formula's
/// carrier, or `Real` for a bare marker.
pub fn marker_field(xml: &XmlDocument, leaf: NodeId) -> Option<Field> {
    if !has_expression(xml, leaf) {
        return None;
    }
    Some(expression_carrier(xml, leaf).unwrap_or(Field::Real))
}

/// Current text of one field, if the node carries it.
pub fn field_text(xml: &XmlDocument, leaf: NodeId, field: Field) -> Option<String> {
    match field.location() {
        FieldLocation::Element => xml.find_child(leaf, field.tag()).map(|c| xml.text(c)),
        FieldLocation::LimitAttribute => xml
            .find_child(leaf, LIMIT_ELEMENT)
            .and_then(|limit| xml.attribute(limit, field.tag())),
        FieldLocation::LimitMember => xml
            .find_child(leaf, LIMIT_ELEMENT)
            .and_then(|limit| xml.find_child(limit, field.tag()))
            .map(|c| xml.text(c)),
    }
}

/// Set one field, creating its element (and the limit block) if needed.
/// Returns whether the document changed.
pub fn set_field(xml: &mut XmlDocument, leaf: NodeId, kind: TagKind, field: Field, text: &str) -> bool {
    match field.location() {
        FieldLocation::Element => {
            let order = kind.element_order();
            let (child, created) = ensure_child(xml, leaf, field.tag(), &order);
            xml.set_text(child, text) || created
        }
        FieldLocation::LimitAttribute => {
            let order = kind.element_order();
            let (limit, created) = ensure_child(xml, leaf, LIMIT_ELEMENT, &order);
            xml.set_attribute(limit, field.tag(), text) || created
        }
        FieldLocation::LimitMember => {
            let order = kind.element_order();
            let (limit, created) = ensure_child(xml, leaf, LIMIT_ELEMENT, &order);
            let members: Vec<&str> = LIMIT_FIELDS
                .iter()
                .filter(|f| f.location() == FieldLocation::LimitMember)
                .map(|f| f.tag())
                .collect();
            let (member, member_created) = ensure_child(xml, limit, field.tag(), &members);
            xml.set_text(member, text) || created || member_created
        }
    }
}

/// Make sure an empty marker element such as `<ParamExpression/>` exists.
pub fn ensure_marker(xml: &mut XmlDocument, leaf: NodeId, kind: TagKind, field: Field) -> bool {
    let order = kind.element_order();
    ensure_child(xml, leaf, field.tag(), &order).1
}

/// Remove a field's element; returns whether anything was removed.
pub fn remove_field(xml: &mut XmlDocument, leaf: NodeId, field: Field) -> bool {
    match xml.find_child(leaf, field.tag()) {
        Some(child) if field.location() == FieldLocation::Element => xml.remove(child),
        _ => false,
    }
}

/// Find `tag` under `parent` or create it at its schema position.
fn ensure_child(xml: &mut XmlDocument, parent: NodeId, tag: &str, order: &[&str]) -> (NodeId, bool) {
    if let Some(existing) = xml.find_child(parent, tag) {
        return (existing, false);
    }
    let anchor = ordered_anchor(xml, parent, tag, order);
    let child = xml.create_element(tag, parent);
    xml.insert_element(parent, child, anchor);
    (child, true)
}

/// Anchor for a new child: after the last known sibling that ranks at or
/// before it, else before the first known sibling that ranks after it.
/// Children outside `order` are skipped.
pub fn ordered_anchor(xml: &XmlDocument, parent: NodeId, tag: &str, order: &[&str]) -> Anchor {
    let Some(rank) = order.iter().position(|t| *t == tag) else {
        return Anchor::End;
    };
    let ranked: Vec<(NodeId, usize)> = xml
        .child_elements(parent)
        .into_iter()
        .filter_map(|c| {
            let name = xml.local_name(c);
            order.iter().position(|t| *t == name).map(|r| (c, r))
        })
        .collect();

    if let Some((node, _)) = ranked.iter().rev().find(|(_, r)| *r <= rank) {
        return Anchor::After(*node);
    }
    match ranked.iter().find(|(_, r)| *r > rank) {
        Some((node, _)) => Anchor::Before(*node),
        None => Anchor::End,
    }
}

/// Anchor for a new leaf in its container: after the last leaf of the same
/// kind, else before the first follower container, else at the end.
pub fn container_anchor(xml: &XmlDocument, container: NodeId, kind: TagKind) -> Anchor {
    let children = xml.child_elements(container);
    if let Some(last) = children
        .iter()
        .rev()
        .find(|c| xml.local_name(**c) == kind.element_name())
    {
        return Anchor::After(*last);
    }
    match children
        .iter()
        .find(|c| kind.followers().contains(&xml.local_name(**c)))
    {
        Some(follower) => Anchor::Before(*follower),
        None => Anchor::End,
    }
}
