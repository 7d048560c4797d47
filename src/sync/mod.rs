//! Workbook rows back into recipe documents.
//!
//! Per document the engine compares the FullPaths of its leaves with the
//! FullPaths of the edited rows: rows only → create, leaves only → delete,
//! both → update. Updates are always attempted and are no-ops when nothing
//! changed, so importing an untouched export leaves every byte in place.
//!
//! Issues are returned in the [`SyncReport`]; rendering them is up to the
//! caller.

mod apply;
mod plan;
mod report;

pub use report::{RowIssue, SheetReport, SyncReport};

use crate::config::RunContext;
use crate::error::{BulkEditError, BulkEditResult, ErrorKind};
use crate::tree::{Document, RecipeTree};
use crate::types::Sheet;
use std::collections::HashMap;

pub struct SyncEngine<'a> {
    ctx: &'a RunContext,
}

impl<'a> SyncEngine<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Apply edited sheets to the loaded documents.
    ///
    /// Only an unmatched sheet in strict mode fails the whole call, and it
    /// does so before any document is modified.
    pub fn sync(&self, tree: &mut RecipeTree, sheets: &[Sheet]) -> BulkEditResult<SyncReport> {
        let mut report = SyncReport::default();
        let mut bound: HashMap<&str, &Sheet> = HashMap::new();
        let mut unmatched: Vec<&str> = Vec::new();

        for sheet in sheets {
            if tree.contains(&sheet.name) {
                bound.entry(sheet.name.as_str()).or_insert(sheet);
            } else {
                unmatched.push(&sheet.name);
            }
        }

        if self.ctx.config.strict_sheets {
            if let Some(name) = unmatched.first() {
                return Err(BulkEditError::UnmatchedSheet(name.to_string()));
            }
        }
        for name in unmatched {
            report.skipped_sheets.push(name.to_string());
            report.issues.push(RowIssue::new(
                name,
                None,
                None,
                ErrorKind::UnmatchedSheet,
                "sheet matches no loaded document and was ignored",
            ));
        }

        for document in tree.documents_mut() {
            let Some(sheet) = bound.get(document.id()).copied() else {
                tracing::warn!(
                    "No sheet named '{}' in the workbook; document left untouched",
                    document.id()
                );
                report.untouched_documents.push(document.id().to_string());
                continue;
            };
            if !sheet.has_full_path_column {
                report.issues.push(RowIssue::new(
                    &sheet.name,
                    None,
                    None,
                    ErrorKind::MalformedRow,
                    "sheet has no FullPath column; document left untouched",
                ));
                report.untouched_documents.push(document.id().to_string());
                continue;
            }
            let (sheet_report, issues) = sync_document(document, sheet);
            report.sheets.push(sheet_report);
            report.issues.extend(issues);
        }

        Ok(report)
    }
}

/// Classify and apply one sheet against its document.
///
/// Deletes run first, then updates, then creates in sheet order so a new
/// row lands after the rows created before it.
pub fn sync_document(document: &mut Document, sheet: &Sheet) -> (SheetReport, Vec<RowIssue>) {
    let plan = plan::plan(document, sheet);
    let mut report = SheetReport::new(&sheet.name);
    report.rows = sheet.rows.len();
    report.rejected = plan.rejected;
    report.deferrals = plan.deferrals;

    for (path, node) in &plan.deletes {
        if document.delete_leaf(*node) {
            tracing::debug!("delete {}", path);
            report.deleted += 1;
        }
    }

    for planned in &plan.updates {
        report.updated += 1;
        if apply::update(document, planned) {
            tracing::debug!("update {}", planned.path);
            report.changed += 1;
        }
    }

    let mut issues = plan.issues;
    for planned in &plan.creates {
        match apply::create(document, planned) {
            Some(_) => {
                tracing::debug!("create {}", planned.path);
                report.created += 1;
            }
            None => {
                report.rejected += 1;
                issues.push(RowIssue::new(
                    &sheet.name,
                    planned.row.number,
                    Some(&planned.path),
                    ErrorKind::OrphanInsertion,
                    "parent container could not take the new node",
                ));
            }
        }
    }

    tracing::info!(
        "{}: {} created, {} updated ({} changed), {} deleted, {} rejected",
        sheet.name,
        report.created,
        report.updated,
        report.changed,
        report.deleted,
        report.rejected
    );
    (report, issues)
}
