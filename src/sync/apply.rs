use super::plan::{Action, CarrierValue, PlannedRow};
use crate::schema::{Field, TagKind, ValueCarrier, LIMIT_FIELDS};
use crate::tree::Document;
use crate::types::FieldValues;
use crate::xml::NodeId;

/// Apply an Update row. Returns whether the document changed.
pub(crate) fn update(document: &mut Document, planned: &PlannedRow<'_>) -> bool {
    match planned.action {
        Action::Update(node) => populate(
            document,
            node,
            planned.kind,
            &planned.row.fields,
            &planned.value,
        ),
        Action::Create { .. } => false,
    }
}

/// Apply a Create row; the new node only receives the fields the row supplies.
pub(crate) fn create(document: &mut Document, planned: &PlannedRow<'_>) -> Option<NodeId> {
    let Action::Create { container, name } = &planned.action else {
        return None;
    };
    let node = document.create_leaf(*container, planned.kind, name)?;
    populate(
        document,
        node,
        planned.kind,
        &planned.row.fields,
        &planned.value,
    );
    Some(node)
}

/// Write every non-blank field of a row onto a leaf in schema order.
///
/// Blank cells never remove anything. The exceptions are the ones the
/// document model imposes: a value carrier replaces the other carriers, a
/// literal replaces an expression marker, and a deferral replaces `<Value/>`.
fn populate(
    document: &mut Document,
    node: NodeId,
    kind: TagKind,
    fields: &FieldValues,
    value: &CarrierValue,
) -> bool {
    let mut changed = false;

    for field in kind.fields() {
        if *field == Field::Name || *field == Field::ParamExpression || field.carrier().is_some() {
            continue;
        }
        let Some(text) = fields.text(*field) else {
            continue;
        };
        changed |= document.set_field(node, kind, *field, text);
        if *field == Field::Defer {
            changed |= document.remove_field(node, Field::Value);
        }
    }

    let retained = match value {
        CarrierValue::Literal(carrier) => {
            if kind.declares(Field::ParamExpression) {
                changed |= document.remove_field(node, Field::ParamExpression);
            }
            for field in carrier.fields() {
                if let Some(text) = fields.text(*field) {
                    changed |= document.set_field(node, kind, *field, text);
                }
            }
            *carrier
        }
        CarrierValue::Expression { field, formula } => {
            changed |= document.ensure_marker(node, kind, Field::ParamExpression);
            if let Some(formula) = formula {
                changed |= document.set_field(node, kind, *field, formula);
            }
            field.carrier().unwrap_or(ValueCarrier::Real)
        }
    };
    for carrier in ValueCarrier::ALL.iter().filter(|c| **c != retained) {
        for field in carrier.fields() {
            changed |= document.remove_field(node, *field);
        }
    }

    if kind.has_limit_block() {
        for field in LIMIT_FIELDS {
            if let Some(text) = fields.text(*field) {
                changed |= document.set_field(node, kind, *field, text);
            }
        }
    }

    changed
}
