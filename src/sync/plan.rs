//! Row classification and validation.
//!
//! Everything that can reject a row is decided here, before the document is
//! touched, so applying a plan never fails halfway through a row.

use super::report::RowIssue;
use crate::error::ErrorKind;
use crate::schema::{Field, TagKind, ValueCarrier, EXPRESSION_MARKER};
use crate::tree::{Document, FullPath};
use crate::types::{FieldValues, Row, Sheet};
use crate::xml::NodeId;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    Update(NodeId),
    Create { container: NodeId, name: String },
}

/// How the row supplies its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CarrierValue {
    Literal(ValueCarrier),
    /// The carrier column holds the expression marker; `formula` comes from
    /// the `ParamExpression` column (absent means keep the current one).
    Expression {
        field: Field,
        formula: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct PlannedRow<'r> {
    pub row: &'r Row,
    pub path: String,
    pub kind: TagKind,
    pub action: Action,
    pub value: CarrierValue,
}

#[derive(Debug, Default)]
pub(crate) struct Plan<'r> {
    /// Leaves without a row, in document order.
    pub deletes: Vec<(String, NodeId)>,
    pub updates: Vec<PlannedRow<'r>>,
    /// New rows, in sheet order.
    pub creates: Vec<PlannedRow<'r>>,
    pub issues: Vec<RowIssue>,
    pub rejected: usize,
    pub deferrals: usize,
}

/// A row that passed path checks, before field validation.
struct Keyed<'r> {
    row: &'r Row,
    path: FullPath,
    key: String,
    existing: Option<NodeId>,
}

pub(crate) fn plan<'r>(document: &Document, sheet: &'r Sheet) -> Plan<'r> {
    let mut plan = Plan::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut keyed: Vec<Keyed<'r>> = Vec::new();
    // Existing Parameters whose rows were rejected for their TagType.
    let mut kept_parameters: HashSet<String> = HashSet::new();

    for row in &sheet.rows {
        match key_row(document, row) {
            Ok((path, key)) => {
                if !seen.insert(key.clone()) {
                    plan.reject(sheet, row, ErrorKind::DuplicateRow, "an earlier row has the same FullPath");
                    continue;
                }
                // The key is claimed even when the TagType is wrong, so the
                // node it names is left alone rather than deleted.
                if let Err(message) = check_tag_type(row, &path) {
                    if document.index().kind_at(&key) == Some(TagKind::Parameter) {
                        kept_parameters.insert(path.leaf_name().to_string());
                    }
                    plan.reject(sheet, row, ErrorKind::MalformedRow, message);
                    continue;
                }
                let existing = document
                    .node_at(&key)
                    .filter(|_| document.index().kind_at(&key) == Some(path.leaf_kind()));
                keyed.push(Keyed {
                    row,
                    path,
                    key,
                    existing,
                });
            }
            Err(message) => plan.reject(sheet, row, ErrorKind::MalformedRow, message),
        }
    }

    for leaf in document.leaves() {
        if !seen.contains(&leaf.path) {
            plan.deletes.push((leaf.path, leaf.node));
        }
    }

    // Parameter names visible to deferrals: every keyed Parameter row except
    // creates that end up rejected.
    let mut rejected_creates: HashSet<String> = HashSet::new();
    let mut planned: Vec<PlannedRow<'r>> = Vec::new();

    for entry in &keyed {
        let kind = entry.path.leaf_kind();
        let action = match entry.existing {
            Some(node) => Action::Update(node),
            None => match resolve_container(document, &entry.path) {
                Ok(container) => Action::Create {
                    container,
                    name: entry.path.leaf_name().to_string(),
                },
                Err((kind_of_issue, message)) => {
                    rejected_creates.insert(entry.key.clone());
                    plan.reject(sheet, entry.row, kind_of_issue, message);
                    continue;
                }
            },
        };

        let current_marker = match action {
            Action::Update(node) => document.expression_field(node),
            Action::Create { .. } => None,
        };
        let value = match validate_fields(kind, &entry.row.fields, current_marker) {
            Ok(value) => value,
            Err((kind_of_issue, message)) => {
                if matches!(action, Action::Create { .. }) {
                    rejected_creates.insert(entry.key.clone());
                }
                plan.reject(sheet, entry.row, kind_of_issue, message);
                continue;
            }
        };

        if let Some(column_name) = entry.row.fields.text(Field::Name) {
            if column_name != entry.path.leaf_name() {
                tracing::warn!(
                    "sheet={} path={}: Name column '{}' ignored; the FullPath names the node",
                    sheet.name,
                    entry.key,
                    column_name
                );
            }
        }

        planned.push(PlannedRow {
            row: entry.row,
            path: entry.key.clone(),
            kind,
            action,
            value,
        });
    }

    let parameters: HashSet<&str> = keyed
        .iter()
        .filter(|k| k.path.leaf_kind() == TagKind::Parameter && !rejected_creates.contains(&k.key))
        .map(|k| k.path.leaf_name())
        .chain(kept_parameters.iter().map(String::as_str))
        .collect();
    check_deferrals(document, sheet, &planned, &parameters, &mut plan);

    for row in planned {
        match row.action {
            Action::Update(_) => plan.updates.push(row),
            Action::Create { .. } => plan.creates.push(row),
        }
    }
    plan
}

impl<'r> Plan<'r> {
    fn reject(&mut self, sheet: &Sheet, row: &Row, kind: ErrorKind, message: impl Into<String>) {
        self.rejected += 1;
        self.issues.push(RowIssue::new(
            &sheet.name,
            row.number,
            Some(&row.full_path),
            kind,
            message,
        ));
    }
}

/// Parse the row's FullPath and check it is rooted in this document.
fn key_row(document: &Document, row: &Row) -> Result<(FullPath, String), String> {
    if row.full_path.trim().is_empty() {
        return Err("row has no FullPath".to_string());
    }
    let path = FullPath::parse(&row.full_path)?;
    if path.root() != document.id() {
        return Err(format!(
            "FullPath is rooted in '{}', not in this sheet's document '{}'",
            path.root(),
            document.id()
        ));
    }
    let key = path.to_string();
    Ok((path, key))
}

/// A non-blank TagType must name the leaf kind the FullPath ends in.
fn check_tag_type(row: &Row, path: &FullPath) -> Result<(), String> {
    let tag_type = row.tag_type.trim();
    if tag_type.is_empty() {
        return Ok(());
    }
    match TagKind::leaf_from_name(tag_type) {
        None => Err(format!("unknown TagType '{}'", tag_type)),
        Some(kind) if kind != path.leaf_kind() => Err(format!(
            "TagType '{}' does not match the FullPath leaf '{}'",
            tag_type,
            path.leaf_kind()
        )),
        Some(_) => Ok(()),
    }
}

fn resolve_container(document: &Document, path: &FullPath) -> Result<NodeId, (ErrorKind, String)> {
    // `#n` keys address existing unnamed nodes only.
    if path.leaf_name().starts_with('#') {
        return Err((
            ErrorKind::MalformedRow,
            format!("positional name '{}' cannot create a node", path.leaf_name()),
        ));
    }
    let parent = path.parent();
    let expected = path.leaf_kind().parent_kind();
    match document.node_at(&parent) {
        Some(node) if document.index().kind_at(&parent) == expected => Ok(node),
        _ => Err((
            ErrorKind::OrphanInsertion,
            format!("parent '{}' does not exist", parent),
        )),
    }
}

/// Check carrier exclusivity, the expression marker and typed values.
///
/// `current_marker` is the column an existing expression node exports its
/// marker in; a blank formula keeps the node's formula only there.
pub(crate) fn validate_fields(
    kind: TagKind,
    fields: &FieldValues,
    current_marker: Option<Field>,
) -> Result<CarrierValue, (ErrorKind, String)> {
    let mut carriers: Vec<ValueCarrier> = Vec::new();
    let mut marker: Option<Field> = None;
    for carrier in ValueCarrier::ALL {
        let populated: Vec<Field> = carrier
            .fields()
            .iter()
            .copied()
            .filter(|f| kind.declares(*f) && fields.text(*f).is_some())
            .collect();
        if populated.is_empty() {
            continue;
        }
        carriers.push(carrier);
        for field in populated {
            if fields.text(field) != Some(EXPRESSION_MARKER) {
                continue;
            }
            if carrier.expression_field() == Some(field) && kind.declares(Field::ParamExpression) {
                marker = Some(field);
            } else {
                return Err((
                    ErrorKind::InvalidValue,
                    format!("'{}' is not allowed in the {} column of a {}", EXPRESSION_MARKER, field, kind),
                ));
            }
        }
    }

    match carriers.len() {
        0 => {
            return Err((
                ErrorKind::MissingValueType,
                "none of the value columns Real, Integer, String, Enumeration is set".to_string(),
            ))
        }
        1 => {}
        _ => {
            let names: Vec<String> = carriers.iter().map(|c| c.to_string()).collect();
            return Err((
                ErrorKind::AmbiguousValueType,
                format!("more than one value column is set: {}", names.join(", ")),
            ));
        }
    }

    for (field, cell) in fields.iter() {
        let Some(text) = cell.text() else {
            continue;
        };
        if !kind.declares(field) {
            return Err((
                ErrorKind::InvalidValue,
                format!("column {} does not apply to a {}", field, kind),
            ));
        }
        if Some(field) == marker || field == Field::ParamExpression {
            continue;
        }
        if !field.value_type().accepts(text) {
            return Err((
                ErrorKind::InvalidValue,
                format!("{} value '{}' is not a valid {:?}", field, text, field.value_type()),
            ));
        }
    }

    let formula = fields.text(Field::ParamExpression).map(str::to_string);
    match marker {
        Some(field) => {
            if formula.is_none() {
                match current_marker {
                    Some(current) if current == field => {}
                    Some(current) => {
                        return Err((
                            ErrorKind::MissingValueType,
                            format!(
                                "marker moved from {} to {} but the ParamExpression column is blank",
                                current, field
                            ),
                        ))
                    }
                    None => {
                        return Err((
                            ErrorKind::MissingValueType,
                            format!(
                                "{} column holds '{}' but the ParamExpression column is blank",
                                field, EXPRESSION_MARKER
                            ),
                        ))
                    }
                }
            }
            Ok(CarrierValue::Expression { field, formula })
        }
        None => {
            if formula.is_some() {
                return Err((
                    ErrorKind::InvalidValue,
                    format!(
                        "the ParamExpression column needs '{}' in the value column",
                        EXPRESSION_MARKER
                    ),
                ));
            }
            Ok(CarrierValue::Literal(carriers[0]))
        }
    }
}

/// Deferral targets must be Parameter rows of the same sheet.
fn check_deferrals(
    document: &Document,
    sheet: &Sheet,
    planned: &[PlannedRow<'_>],
    parameters: &HashSet<&str>,
    plan: &mut Plan<'_>,
) {
    for row in planned.iter().filter(|r| r.kind == TagKind::FormulaValue) {
        let target = match row.row.fields.text(Field::Defer) {
            Some(text) => Some(text.to_string()),
            None => match row.action {
                Action::Update(node) => document
                    .field_text(node, Field::Defer)
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
                Action::Create { .. } => None,
            },
        };
        let Some(target) = target else {
            continue;
        };
        plan.deferrals += 1;
        if !parameters.contains(target.as_str()) {
            plan.issues.push(RowIssue::new(
                &sheet.name,
                row.row.number,
                Some(&row.path),
                ErrorKind::UnresolvedDeferral,
                format!("deferral target '{}' is not a Parameter row of this sheet", target),
            ));
        }
    }
}
