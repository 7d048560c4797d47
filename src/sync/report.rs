use crate::error::ErrorKind;
use serde::Serialize;
use std::fmt;

/// One row-scoped problem found during an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    pub sheet: String,
    /// 1-based spreadsheet row, when known.
    pub row: Option<u32>,
    /// FullPath as written in the row, when it had one.
    pub path: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

impl RowIssue {
    pub fn new(
        sheet: &str,
        row: Option<u32>,
        path: Option<&str>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        let path = path.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string);
        Self {
            sheet: sheet.to_string(),
            row,
            path,
            kind,
            message: message.into(),
        }
    }

    /// `sheet=<name> row=<n> path=<FullPath|-> kind=<ErrorKind> <detail>`
    pub fn log_line(&self) -> String {
        let row = self
            .row
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "sheet={} row={} path={} kind={} {}",
            self.sheet,
            row,
            self.path.as_deref().unwrap_or("-"),
            self.kind,
            self.message
        )
    }

    /// Whether the row was skipped rather than applied.
    pub fn rejects_row(&self) -> bool {
        !self.kind.is_advisory()
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.log_line())
    }
}

/// Counters for one sheet/document pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SheetReport {
    pub sheet: String,
    pub rows: usize,
    pub created: usize,
    /// Update rows applied, changed or not.
    pub updated: usize,
    /// Update rows that actually modified the document.
    pub changed: usize,
    pub deleted: usize,
    /// FormulaValue rows carrying a deferral.
    pub deferrals: usize,
    pub rejected: usize,
}

impl SheetReport {
    pub fn new(sheet: &str) -> Self {
        Self {
            sheet: sheet.to_string(),
            ..Self::default()
        }
    }
}

/// Everything an import produced besides the mutated documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub sheets: Vec<SheetReport>,
    pub issues: Vec<RowIssue>,
    /// Sheets that matched no loaded document.
    pub skipped_sheets: Vec<String>,
    /// Documents left as loaded because the workbook had no usable sheet.
    pub untouched_documents: Vec<String>,
}

impl SyncReport {
    pub fn created(&self) -> usize {
        self.sheets.iter().map(|s| s.created).sum()
    }

    pub fn updated(&self) -> usize {
        self.sheets.iter().map(|s| s.updated).sum()
    }

    pub fn changed(&self) -> usize {
        self.sheets.iter().map(|s| s.changed).sum()
    }

    pub fn deleted(&self) -> usize {
        self.sheets.iter().map(|s| s.deleted).sum()
    }

    pub fn deferrals(&self) -> usize {
        self.sheets.iter().map(|s| s.deferrals).sum()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Issues of one kind, handy for assertions and summaries.
    pub fn issues_of(&self, kind: ErrorKind) -> Vec<&RowIssue> {
        self.issues.iter().filter(|i| i.kind == kind).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetReport> {
        self.sheets.iter().find(|s| s.sheet == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_line_format() {
        let issue = RowIssue::new(
            "TEST",
            Some(4),
            Some("TEST/Parameter[A]"),
            ErrorKind::AmbiguousValueType,
            "Real and Integer are both set",
        );
        assert_eq!(
            issue.log_line(),
            "sheet=TEST row=4 path=TEST/Parameter[A] kind=AmbiguousValueType Real and Integer are both set"
        );

        let issue = RowIssue::new("X", None, Some("  "), ErrorKind::UnmatchedSheet, "ignored");
        assert_eq!(issue.log_line(), "sheet=X row=- path=- kind=UnmatchedSheet ignored");
        assert!(!issue.rejects_row());
    }

    #[test]
    fn test_totals_sum_sheets() {
        let mut report = SyncReport::default();
        let mut a = SheetReport::new("A");
        a.created = 2;
        a.deleted = 1;
        let mut b = SheetReport::new("B");
        b.created = 1;
        b.changed = 3;
        report.sheets = vec![a, b];
        assert_eq!(report.created(), 3);
        assert_eq!(report.deleted(), 1);
        assert_eq!(report.changed(), 3);
        assert!(report.sheet("B").is_some());
        assert!(!report.has_issues());
    }
}
